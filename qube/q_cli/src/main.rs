use std::{io, path::PathBuf, process::ExitCode, time::Instant};

use anyhow::{Context, Result};
use clap::Parser;
use qube_runtime::{
    ActionRegistry, QubeConfig, QubeRuntime, RunMode, RunSummary, RuntimeTelemetry,
    TokenPixelDeserializer,
};
use shared_logging::LogLevel;
use tokio::{
    fs::File,
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    runtime::Builder,
};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "q", version, about = "Agent Q: Qube-native token pixel runtime")]
struct Cli {
    /// Token pixel JSONL file; standard input when omitted.
    #[arg(long)]
    stream: Option<PathBuf>,
    /// JSON configuration overriding the stock tables and thresholds.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Append structured decision records to this JSON-lines file.
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Console verbosity (debug, info, warn, error). RUST_LOG wins when set.
    #[arg(long, default_value = "info")]
    log_level: LogLevel,
    /// Decide without executing actions.
    #[arg(long)]
    dry_run: bool,
}

/// How a run ended, short of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Input exhausted or interrupted.
    Drained,
    /// The requested stream file could not be opened.
    SourceUnavailable,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Drained => Self::SUCCESS,
            Outcome::SourceUnavailable => Self::FAILURE,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    shared_logging::init_console(cli.log_level)?;
    let runtime = Builder::new_current_thread().enable_all().build()?;
    let outcome = runtime.block_on(run(cli));
    // A pending stdin read would otherwise hold shutdown open.
    runtime.shutdown_background();
    outcome.map(ExitCode::from)
}

async fn run(cli: Cli) -> Result<Outcome> {
    let config = match &cli.config {
        Some(path) => QubeConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => QubeConfig::default(),
    };
    let mut agent = QubeRuntime::new(config, ActionRegistry::reference());
    if let Some(path) = &cli.log_file {
        let telemetry = RuntimeTelemetry::builder("q")
            .log_path(path)
            .build()
            .context("opening decision audit log")?;
        agent = agent.with_telemetry(telemetry);
    }
    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Execute
    };

    info!("Agent Q waiting for input stream...");
    let summary = if let Some(path) = &cli.stream {
        let file = match File::open(path).await {
            Ok(file) => file,
            Err(err) => {
                error!("Stream file not found: {} ({err})", path.display());
                return Ok(Outcome::SourceUnavailable);
            }
        };
        drive(&mut agent, BufReader::new(file), mode).await
    } else {
        info!("Reading from stdin (Press Ctrl+C to exit)...");
        drive(&mut agent, BufReader::new(tokio::io::stdin()), mode).await
    };
    agent.report_summary(&summary);
    Ok(Outcome::Drained)
}

/// Feeds lines to the agent one at a time until end of input or Ctrl+C.
async fn drive<R>(agent: &mut QubeRuntime, reader: R, mode: RunMode) -> RunSummary
where
    R: AsyncBufRead + Unpin,
{
    let started = Instant::now();
    let mut summary = RunSummary::default();
    let mut lines = reader.lines();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Agent Q shutting down.");
                break;
            }
            next = lines.next_line() => match next {
                Ok(Some(line)) => match TokenPixelDeserializer::try_parse(&line) {
                    Ok(Some(pixel)) => {
                        agent.handle_pixel(&pixel, mode, &mut summary);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        error!("{err}");
                        summary.skipped += 1;
                    }
                },
                Ok(None) => break,
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    error!("Skipping undecodable line: {err}");
                    summary.skipped += 1;
                }
                Err(err) => {
                    error!("Token pixel stream read failed: {err}");
                    break;
                }
            },
        }
    }
    summary.elapsed = started.elapsed();
    summary
}
