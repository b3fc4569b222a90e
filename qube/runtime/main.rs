//! Per-pixel orchestration: enrich, decide, log, and optionally execute.

use std::{
    collections::VecDeque,
    fmt,
    io::BufRead,
    sync::Arc,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use shared_logging::LogLevel;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    config::QubeConfig,
    corridor::CorridorNavigator,
    decision::{command::ActionKind, decide, Decision, DecisionContext},
    deserializer::{TokenPixel, TokenPixelDeserializer},
    drift::AutonomyDriftMonitor,
    executor::{ActionExecutor, ActionRegistry, ActionResult},
    intent::IntentMatcher,
    interpreter::{activity_level, phase_quadrant, StateVectorInterpreter},
    telemetry::RuntimeTelemetry,
    voxel::{Direction, VoxelCollisionDetector},
};

/// One decision as retained in memory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionLogEntry {
    /// Source pixel.
    pub pixel_id: String,
    /// What was decided.
    pub decision: Decision,
    /// Timestamp carried by the pixel.
    pub timestamp: f64,
}

/// In-memory decision log bounded to a fixed number of entries, oldest evicted.
#[derive(Debug, Clone)]
pub struct DecisionLog {
    entries: VecDeque<DecisionLogEntry>,
    capacity: usize,
    total: u64,
}

impl DecisionLog {
    /// Creates a log retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            total: 0,
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: DecisionLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total += 1;
    }

    /// Retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DecisionLogEntry> + '_ {
        self.entries.iter()
    }

    /// Most recent entry.
    #[must_use]
    pub fn latest(&self) -> Option<&DecisionLogEntry> {
        self.entries.back()
    }

    /// Retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ever appended, including evicted ones.
    #[must_use]
    pub const fn total_logged(&self) -> u64 {
        self.total
    }
}

/// Whether decided actions are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Decide and execute each pixel.
    #[default]
    Execute,
    /// Decide only.
    DryRun,
}

/// Counters for one pass over a pixel stream.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Pixels decided.
    pub processed: u64,
    /// Actions executed successfully.
    pub executed: u64,
    /// Actions whose execution failed.
    pub failed_actions: u64,
    /// Non-blank lines rejected by the deserializer.
    pub skipped: usize,
    /// Decisions per action.
    pub actions: IndexMap<ActionKind, u64>,
    /// Wall-clock time spent.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Pixels per second, zero when no time elapsed.
    #[must_use]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let processed = self.processed as f64;
            processed / secs
        } else {
            0.0
        }
    }

    fn record(&mut self, decision: &Decision, outcome: Option<&ActionResult>) {
        self.processed += 1;
        *self.actions.entry(decision.action()).or_insert(0) += 1;
        match outcome {
            Some(result) if result.success => self.executed += 1,
            Some(_) => self.failed_actions += 1,
            None => {}
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed {} pixels in {:.4}s ({:.1} pixels/sec)",
            self.processed,
            self.elapsed.as_secs_f64(),
            self.throughput()
        )
    }
}

/// Single-stream edge agent ("Q") wiring every component together.
#[derive(Debug)]
pub struct QubeRuntime {
    session_id: Uuid,
    interpreter: StateVectorInterpreter,
    navigator: CorridorNavigator,
    collision_detector: VoxelCollisionDetector,
    intent_matcher: IntentMatcher,
    drift_monitor: AutonomyDriftMonitor,
    executor: ActionExecutor,
    decision_log: DecisionLog,
    telemetry: Option<RuntimeTelemetry>,
}

impl QubeRuntime {
    /// Builds the runtime from a config and an action registry.
    #[must_use]
    pub fn new(config: QubeConfig, registry: ActionRegistry) -> Self {
        let runtime = Self {
            session_id: Uuid::new_v4(),
            interpreter: StateVectorInterpreter::new(config.alignment_threshold),
            navigator: CorridorNavigator::new(Arc::new(config.corridor_graph)),
            collision_detector: VoxelCollisionDetector::new(config.voxel_cache_capacity),
            intent_matcher: IntentMatcher::new(Arc::new(config.intent_database)),
            drift_monitor: AutonomyDriftMonitor::new(config.drift),
            executor: ActionExecutor::new(Arc::new(registry)),
            decision_log: DecisionLog::new(config.decision_log_capacity),
            telemetry: None,
        };
        info!("Agent Q initialized and online.");
        runtime
    }

    /// Runtime with stock tables and handlers.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::new(QubeConfig::default(), ActionRegistry::reference())
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: RuntimeTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Derives every signal the decision rule reads.
    ///
    /// Always records the autonomy index in the drift history and may
    /// memoise the voxel signature.
    pub fn enrich(&mut self, pixel: &TokenPixel) -> DecisionContext {
        let corridor = self.navigator.parse(&pixel.corridor);
        let state = pixel.state_vector;
        let quadrant = phase_quadrant(state.phi);
        let aligned = self.interpreter.is_aligned(state.psi);
        let activity = activity_level(state.omega);
        let drift_status = self.drift_monitor.check_drift(pixel.autonomy_index);
        let voxel_bits = self.collision_detector.decode(&pixel.voxel_signature);
        let collision_ahead =
            VoxelCollisionDetector::collision_ahead(voxel_bits, Direction::Forward);
        let intent_label = self
            .intent_matcher
            .lookup(&pixel.intent_hash)
            .map(str::to_string);
        DecisionContext {
            corridor,
            quadrant,
            aligned,
            activity,
            drift_status,
            collision_ahead,
            intent_label,
        }
    }

    /// Enriches, decides, and logs one pixel without executing anything.
    #[instrument(level = "debug", skip_all, fields(pixel = %pixel.token_pixel_id))]
    pub fn process_pixel(&mut self, pixel: &TokenPixel) -> Decision {
        let ctx = self.enrich(pixel);
        let decision = decide(&ctx);
        self.decision_log.push(DecisionLogEntry {
            pixel_id: pixel.token_pixel_id.clone(),
            decision: decision.clone(),
            timestamp: pixel.timestamp,
        });
        if let Some(tel) = &self.telemetry {
            let neighbors = self.navigator.neighbors(&ctx.corridor).len();
            let _ = tel.log(
                LogLevel::Info,
                "qube.pixel.decided",
                json!({
                    "session": self.session_id,
                    "pixel_id": pixel.token_pixel_id,
                    "agent_id": pixel.agent_id,
                    "corridor": ctx.corridor.key(),
                    "neighbors": neighbors,
                    "quadrant": ctx.quadrant,
                    "activity": ctx.activity,
                    "drift": ctx.drift_status,
                    "collision_ahead": ctx.collision_ahead,
                    "intent": ctx.intent_label,
                    "decision": decision,
                }),
            );
        }
        decision
    }

    /// Runs the decided action. Failures come back in the result.
    pub fn execute_decision(&self, decision: &Decision) -> ActionResult {
        info!("Executing: {} ({})", decision.action(), decision.reason());
        let result = self.executor.execute(decision.command());
        if let Some(tel) = &self.telemetry {
            let (level, message) = if result.success {
                (LogLevel::Debug, "qube.action.executed")
            } else {
                (LogLevel::Warn, "qube.action.failed")
            };
            let _ = tel.log(
                level,
                message,
                json!({
                    "session": self.session_id,
                    "action": decision.action(),
                    "result": result,
                }),
            );
        }
        result
    }

    /// Processes one pixel to completion and tallies it into `summary`.
    pub fn handle_pixel(
        &mut self,
        pixel: &TokenPixel,
        mode: RunMode,
        summary: &mut RunSummary,
    ) -> Decision {
        let decision = self.process_pixel(pixel);
        let outcome = match mode {
            RunMode::Execute => Some(self.execute_decision(&decision)),
            RunMode::DryRun => None,
        };
        summary.record(&decision, outcome.as_ref());
        decision
    }

    /// Drives a whole line source in arrival order.
    pub fn run_stream<R: BufRead>(&mut self, reader: R, mode: RunMode) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut stream = TokenPixelDeserializer::parse_stream(reader);
        for pixel in stream.by_ref() {
            self.handle_pixel(&pixel, mode, &mut summary);
        }
        summary.skipped = stream.skipped();
        summary.elapsed = started.elapsed();
        summary
    }

    /// Logs the end-of-run summary to the console and telemetry.
    pub fn report_summary(&self, summary: &RunSummary) {
        info!("{summary}");
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "qube.run.summary",
                json!({
                    "session": self.session_id,
                    "summary": summary,
                    "throughput": summary.throughput(),
                    "decisions_logged": self.decision_log.total_logged(),
                }),
            );
        }
    }

    /// Identifier of this runtime instance.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Retained decisions.
    #[must_use]
    pub const fn decision_log(&self) -> &DecisionLog {
        &self.decision_log
    }

    /// Drift monitor state.
    #[must_use]
    pub const fn drift_monitor(&self) -> &AutonomyDriftMonitor {
        &self.drift_monitor
    }

    /// Voxel detector state.
    #[must_use]
    pub const fn collision_detector(&self) -> &VoxelCollisionDetector {
        &self.collision_detector
    }

    /// Corridor navigator.
    #[must_use]
    pub const fn navigator(&self) -> &CorridorNavigator {
        &self.navigator
    }
}
