use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::voxel::Direction;

/// Named parameters as they appear on the wire and in the decision log.
pub type ActionParams = IndexMap<String, Value>;

/// Closed set of actions a decision can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Stop the agent.
    Halt,
    /// Steer away from an occupied face.
    AvoidObstacle,
    /// Pull intent alignment back toward a target.
    RealignIntent,
    /// Act on an urgent intent now.
    ExecuteImmediate,
    /// Keep going.
    Continue,
}

impl ActionKind {
    /// Every action in decision precedence order.
    pub const ALL: [Self; 5] = [
        Self::Halt,
        Self::AvoidObstacle,
        Self::RealignIntent,
        Self::ExecuteImmediate,
        Self::Continue,
    ];

    /// Wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Halt => "HALT",
            Self::AvoidObstacle => "AVOID_OBSTACLE",
            Self::RealignIntent => "REALIGN_INTENT",
            Self::ExecuteImmediate => "EXECUTE_IMMEDIATE",
            Self::Continue => "CONTINUE",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActionKind {
    type Err = ActionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == value)
            .ok_or_else(|| ActionError::UnknownAction(value.to_string()))
    }
}

/// Failures while resolving or running an action. Always reported, never raised.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// No such action, or no registry entry for it.
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    /// A required parameter was not supplied.
    #[error("{action} missing required parameter '{name}'")]
    MissingParameter {
        /// Action being bound.
        action: ActionKind,
        /// Parameter name.
        name: &'static str,
    },
    /// A parameter had the wrong type or value.
    #[error("{action} got invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Action being bound.
        action: ActionKind,
        /// Parameter name.
        name: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// A parameter the action does not accept.
    #[error("{action} got unexpected parameter '{name}'")]
    UnexpectedParameter {
        /// Action being bound.
        action: ActionKind,
        /// Parameter name.
        name: String,
    },
    /// The handler itself failed.
    #[error("{0}")]
    Handler(String),
}

/// An action together with its typed parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActionCommand {
    /// See [`ActionKind::Halt`].
    Halt,
    /// See [`ActionKind::AvoidObstacle`].
    AvoidObstacle {
        /// Escape heading.
        direction: Direction,
    },
    /// See [`ActionKind::RealignIntent`].
    RealignIntent {
        /// Alignment to steer toward.
        target_psi: f64,
    },
    /// See [`ActionKind::ExecuteImmediate`].
    ExecuteImmediate,
    /// See [`ActionKind::Continue`].
    Continue,
}

impl ActionCommand {
    /// Action this command invokes.
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Halt => ActionKind::Halt,
            Self::AvoidObstacle { .. } => ActionKind::AvoidObstacle,
            Self::RealignIntent { .. } => ActionKind::RealignIntent,
            Self::ExecuteImmediate => ActionKind::ExecuteImmediate,
            Self::Continue => ActionKind::Continue,
        }
    }

    /// Parameters as a name/value map.
    #[must_use]
    pub fn params(&self) -> ActionParams {
        let mut params = ActionParams::new();
        match self {
            Self::AvoidObstacle { direction } => {
                params.insert("direction".into(), json!(direction.label()));
            }
            Self::RealignIntent { target_psi } => {
                params.insert("target_psi".into(), json!(target_psi));
            }
            Self::Halt | Self::ExecuteImmediate | Self::Continue => {}
        }
        params
    }

    /// Binds named parameters to `kind`, rejecting missing, mistyped, and
    /// surplus entries.
    pub fn bind(kind: ActionKind, params: &ActionParams) -> Result<Self, ActionError> {
        let command = match kind {
            ActionKind::Halt => Self::Halt,
            ActionKind::ExecuteImmediate => Self::ExecuteImmediate,
            ActionKind::Continue => Self::Continue,
            ActionKind::AvoidObstacle => {
                let raw = required(kind, params, "direction")?;
                let direction = raw
                    .as_str()
                    .ok_or_else(|| invalid(kind, "direction", "expected a string"))?
                    .parse::<Direction>()
                    .map_err(|err| invalid(kind, "direction", err.to_string()))?;
                Self::AvoidObstacle { direction }
            }
            ActionKind::RealignIntent => {
                let target_psi = required(kind, params, "target_psi")?
                    .as_f64()
                    .ok_or_else(|| invalid(kind, "target_psi", "expected a number"))?;
                Self::RealignIntent { target_psi }
            }
        };
        let accepted = command.params();
        if let Some(extra) = params.keys().find(|name| !accepted.contains_key(*name)) {
            return Err(ActionError::UnexpectedParameter {
                action: kind,
                name: extra.clone(),
            });
        }
        Ok(command)
    }
}

fn required<'a>(
    action: ActionKind,
    params: &'a ActionParams,
    name: &'static str,
) -> Result<&'a Value, ActionError> {
    params
        .get(name)
        .ok_or(ActionError::MissingParameter { action, name })
}

fn invalid(action: ActionKind, name: &'static str, reason: impl Into<String>) -> ActionError {
    ActionError::InvalidParameter {
        action,
        name,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> ActionParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn names_resolve_both_ways() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.name().parse::<ActionKind>().unwrap(), kind);
        }
        assert_eq!(
            "LAUNCH".parse::<ActionKind>().unwrap_err().to_string(),
            "Unknown action: LAUNCH"
        );
    }

    #[test]
    fn binds_typed_parameters() {
        let command =
            ActionCommand::bind(ActionKind::AvoidObstacle, &params(json!({ "direction": "left" })))
                .unwrap();
        assert_eq!(
            command,
            ActionCommand::AvoidObstacle {
                direction: Direction::Left
            }
        );
        let command =
            ActionCommand::bind(ActionKind::RealignIntent, &params(json!({ "target_psi": 0.8 })))
                .unwrap();
        assert_eq!(command.params()["target_psi"], json!(0.8));
    }

    #[test]
    fn rejects_bad_bindings() {
        let missing = ActionCommand::bind(ActionKind::RealignIntent, &ActionParams::new());
        assert!(matches!(missing, Err(ActionError::MissingParameter { .. })));
        let mistyped =
            ActionCommand::bind(ActionKind::AvoidObstacle, &params(json!({ "direction": 3 })));
        assert!(matches!(mistyped, Err(ActionError::InvalidParameter { .. })));
        let surplus = ActionCommand::bind(ActionKind::Halt, &params(json!({ "force": true })));
        assert_eq!(
            surplus.unwrap_err().to_string(),
            "HALT got unexpected parameter 'force'"
        );
    }
}
