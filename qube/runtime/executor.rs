//! Dispatch of decided actions to registered handlers.

use std::{fmt, sync::Arc};

use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::decision::command::{ActionCommand, ActionError, ActionKind, ActionParams};

/// Outcome of one action. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    /// Whether the action ran successfully.
    pub success: bool,
    /// Handler output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure message otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    /// Successful result.
    #[must_use]
    pub const fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed result.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// Callable registered for an action.
pub trait ActionHandler: Send + Sync {
    /// Runs the action.
    fn invoke(&self, command: &ActionCommand) -> Result<Value, ActionError>;
}

impl<F> ActionHandler for F
where
    F: Fn(&ActionCommand) -> Result<Value, ActionError> + Send + Sync,
{
    fn invoke(&self, command: &ActionCommand) -> Result<Value, ActionError> {
        self(command)
    }
}

/// What an action name resolves to.
#[derive(Clone)]
pub enum ActionEntry {
    /// Invoked with the command.
    Handler(Arc<dyn ActionHandler>),
    /// Returned as-is without invocation.
    Static(Value),
}

impl fmt::Debug for ActionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler(..)"),
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
        }
    }
}

/// Immutable mapping from action to entry.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    entries: IndexMap<ActionKind, ActionEntry>,
}

impl ActionRegistry {
    /// Registry with the stock handler for every action.
    #[must_use]
    pub fn reference() -> Self {
        Self::default()
            .with_handler(ActionKind::Halt, |_| {
                Ok(json!({ "status": "HALTED", "timestamp": unix_seconds() }))
            })
            .with_handler(ActionKind::AvoidObstacle, |command| {
                match command {
                    ActionCommand::AvoidObstacle { direction } => {
                        Ok(json!({ "status": "AVOIDING", "direction": direction.label() }))
                    }
                    other => Err(mismatch(ActionKind::AvoidObstacle, other)),
                }
            })
            .with_handler(ActionKind::RealignIntent, |command| {
                match command {
                    ActionCommand::RealignIntent { target_psi } => {
                        Ok(json!({ "status": "REALIGNING", "target": target_psi }))
                    }
                    other => Err(mismatch(ActionKind::RealignIntent, other)),
                }
            })
            .with_handler(ActionKind::Continue, |_| {
                Ok(json!({ "status": "CONTINUING" }))
            })
            .with_handler(ActionKind::ExecuteImmediate, |_| {
                Ok(json!({ "status": "EXECUTED_IMMEDIATE" }))
            })
    }

    /// Registers a closure handler, replacing any previous entry.
    #[must_use]
    pub fn with_handler<F>(self, kind: ActionKind, handler: F) -> Self
    where
        F: Fn(&ActionCommand) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        self.with_entry(kind, ActionEntry::Handler(Arc::new(handler)))
    }

    /// Registers a static value, replacing any previous entry.
    #[must_use]
    pub fn with_static(self, kind: ActionKind, value: Value) -> Self {
        self.with_entry(kind, ActionEntry::Static(value))
    }

    /// Registers any entry, replacing any previous one.
    #[must_use]
    pub fn with_entry(mut self, kind: ActionKind, entry: ActionEntry) -> Self {
        self.entries.insert(kind, entry);
        self
    }

    /// Removes an entry.
    #[must_use]
    pub fn without(mut self, kind: ActionKind) -> Self {
        self.entries.shift_remove(&kind);
        self
    }

    /// Entry registered for `kind`.
    #[must_use]
    pub fn get(&self, kind: ActionKind) -> Option<&ActionEntry> {
        self.entries.get(&kind)
    }

    /// Registered actions in insertion order.
    pub fn kinds(&self) -> impl Iterator<Item = ActionKind> + '_ {
        self.entries.keys().copied()
    }
}

fn unix_seconds() -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let micros = Utc::now().timestamp_micros() as f64;
    micros / 1_000_000.0
}

fn mismatch(expected: ActionKind, got: &ActionCommand) -> ActionError {
    ActionError::Handler(format!("{expected} handler received {}", got.kind()))
}

/// Runs decided actions, isolating every failure.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    registry: Arc<ActionRegistry>,
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ActionRegistry::reference()))
    }
}

impl ActionExecutor {
    /// Wraps an immutable registry snapshot.
    #[must_use]
    pub fn new(registry: Arc<ActionRegistry>) -> Self {
        Self { registry }
    }

    /// Runs a typed command.
    #[must_use]
    pub fn execute(&self, command: &ActionCommand) -> ActionResult {
        let kind = command.kind();
        match self.registry.get(kind) {
            None => Self::report(ActionError::UnknownAction(kind.name().to_string())),
            Some(ActionEntry::Static(value)) => ActionResult::ok(value.clone()),
            Some(ActionEntry::Handler(handler)) => match handler.invoke(command) {
                Ok(value) => ActionResult::ok(value),
                Err(err) => Self::report(err),
            },
        }
    }

    /// Resolves `name` and runs its entry.
    ///
    /// Static entries are returned as-is; `params` are bound only for handlers.
    #[must_use]
    pub fn execute_named(&self, name: &str, params: &ActionParams) -> ActionResult {
        let kind = match name.parse::<ActionKind>() {
            Ok(kind) => kind,
            Err(err) => return Self::report(err),
        };
        match self.registry.get(kind) {
            None => Self::report(ActionError::UnknownAction(kind.name().to_string())),
            Some(ActionEntry::Static(value)) => ActionResult::ok(value.clone()),
            Some(ActionEntry::Handler(handler)) => {
                let outcome = ActionCommand::bind(kind, params)
                    .and_then(|command| handler.invoke(&command));
                match outcome {
                    Ok(value) => ActionResult::ok(value),
                    Err(err) => Self::report(err),
                }
            }
        }
    }

    fn report(err: ActionError) -> ActionResult {
        match &err {
            ActionError::UnknownAction(name) => warn!("Unknown action requested: {name}"),
            _ => error!("Action execution failed: {err}"),
        }
        ActionResult::failed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::Direction;

    #[test]
    fn reference_registry_covers_every_action() {
        let registry = ActionRegistry::reference();
        assert_eq!(registry.kinds().count(), ActionKind::ALL.len());
        let executor = ActionExecutor::default();
        let result = executor.execute(&ActionCommand::AvoidObstacle {
            direction: Direction::Left,
        });
        assert!(result.success);
        assert_eq!(
            result.result.unwrap(),
            json!({ "status": "AVOIDING", "direction": "left" })
        );
        let halted = executor.execute(&ActionCommand::Halt);
        assert_eq!(halted.result.unwrap()["status"], json!("HALTED"));
    }

    #[test]
    fn unknown_names_fail_softly() {
        let executor = ActionExecutor::default();
        let result = executor.execute_named("SELF_DESTRUCT", &ActionParams::new());
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown action: SELF_DESTRUCT"));
        assert!(result.result.is_none());
    }

    #[test]
    fn unregistered_action_reports_unknown() {
        let registry = ActionRegistry::reference().without(ActionKind::Continue);
        let executor = ActionExecutor::new(Arc::new(registry));
        let result = executor.execute(&ActionCommand::Continue);
        assert_eq!(result.error.as_deref(), Some("Unknown action: CONTINUE"));
    }

    #[test]
    fn handler_failures_are_captured() {
        let registry = ActionRegistry::reference().with_handler(
            ActionKind::Halt,
            |_| Err(ActionError::Handler("actuator offline".into())),
        );
        let executor = ActionExecutor::new(Arc::new(registry));
        let result = executor.execute(&ActionCommand::Halt);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("actuator offline"));
    }

    #[test]
    fn static_entries_are_returned_directly() {
        let registry =
            ActionRegistry::default().with_static(ActionKind::Continue, json!("steady"));
        let executor = ActionExecutor::new(Arc::new(registry));
        let result = executor.execute_named("CONTINUE", &ActionParams::new());
        assert_eq!(result, ActionResult::ok(json!("steady")));
    }

    #[test]
    fn static_entries_ignore_parameters() {
        let registry =
            ActionRegistry::default().with_static(ActionKind::AvoidObstacle, json!("canned"));
        let executor = ActionExecutor::new(Arc::new(registry));
        let bare = executor.execute_named("AVOID_OBSTACLE", &ActionParams::new());
        assert_eq!(bare, ActionResult::ok(json!("canned")));

        let mut surplus = ActionParams::new();
        surplus.insert("direction".into(), json!("sideways"));
        surplus.insert("speed".into(), json!(3));
        let noisy = executor.execute_named("AVOID_OBSTACLE", &surplus);
        assert_eq!(noisy, ActionResult::ok(json!("canned")));
    }

    #[test]
    fn named_execution_binds_parameters() {
        let executor = ActionExecutor::default();
        let mut params = ActionParams::new();
        params.insert("target_psi".into(), json!(0.8));
        let result = executor.execute_named("REALIGN_INTENT", &params);
        assert_eq!(
            result.result.unwrap(),
            json!({ "status": "REALIGNING", "target": 0.8 })
        );
        let missing = executor.execute_named("REALIGN_INTENT", &ActionParams::new());
        assert!(!missing.success);
        assert!(missing.error.unwrap().contains("target_psi"));
    }
}
