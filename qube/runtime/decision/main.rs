//! Safety-first decision rule over an enriched pixel.

/// Typed action commands and their binding errors.
pub mod command;

use command::{ActionCommand, ActionKind, ActionParams};
use serde::{Serialize, Serializer};

use crate::{
    corridor::Corridor, drift::DriftStatus, intent::URGENT_INTENT, interpreter::ActivityLevel,
    voxel::Direction,
};

/// Alignment requested by every realign decision.
pub const REALIGN_TARGET_PSI: f64 = 0.8;

/// Heading used by every avoidance decision, whichever face collided.
pub const ESCAPE_DIRECTION: Direction = Direction::Left;

/// Signals derived from one pixel, consumed by [`decide`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionContext {
    /// Parsed corridor.
    pub corridor: Corridor,
    /// Phase quadrant `0..=3`.
    pub quadrant: u8,
    /// Whether intent alignment met its threshold.
    pub aligned: bool,
    /// Activity bucket.
    pub activity: ActivityLevel,
    /// Drift classification of this pixel.
    pub drift_status: DriftStatus,
    /// Whether the forward face is occupied.
    pub collision_ahead: bool,
    /// Label of the pixel's intent fingerprint, if known.
    pub intent_label: Option<String>,
}

/// The rules of [`decide`], highest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionRule {
    /// Drift is critical.
    CriticalDrift,
    /// Forward face occupied.
    CollisionAhead,
    /// Intent alignment below threshold.
    Misaligned,
    /// Intent labelled urgent.
    UrgentIntent,
    /// Nothing else matched.
    Nominal,
}

impl DecisionRule {
    /// Evaluation order. Reordering changes outcomes on overlapping signals.
    pub const PRECEDENCE: [Self; 5] = [
        Self::CriticalDrift,
        Self::CollisionAhead,
        Self::Misaligned,
        Self::UrgentIntent,
        Self::Nominal,
    ];

    /// Whether this rule fires for `ctx`.
    #[must_use]
    pub fn matches(self, ctx: &DecisionContext) -> bool {
        match self {
            Self::CriticalDrift => ctx.drift_status == DriftStatus::Critical,
            Self::CollisionAhead => ctx.collision_ahead,
            Self::Misaligned => !ctx.aligned,
            Self::UrgentIntent => ctx.intent_label.as_deref() == Some(URGENT_INTENT),
            Self::Nominal => true,
        }
    }

    /// First matching rule for `ctx`.
    #[must_use]
    pub fn select(ctx: &DecisionContext) -> Self {
        Self::PRECEDENCE
            .into_iter()
            .find(|rule| rule.matches(ctx))
            .unwrap_or(Self::Nominal)
    }

    /// Decision this rule produces.
    #[must_use]
    pub fn decision(self) -> Decision {
        match self {
            Self::CriticalDrift => {
                Decision::new(ActionCommand::Halt, "Critical autonomy drift detected")
            }
            Self::CollisionAhead => Decision::new(
                ActionCommand::AvoidObstacle {
                    direction: ESCAPE_DIRECTION,
                },
                "Collision detected in voxel neighborhood",
            ),
            Self::Misaligned => Decision::new(
                ActionCommand::RealignIntent {
                    target_psi: REALIGN_TARGET_PSI,
                },
                "Intent alignment below threshold",
            ),
            Self::UrgentIntent => {
                Decision::new(ActionCommand::ExecuteImmediate, "Urgent intent detected")
            }
            Self::Nominal => Decision::new(ActionCommand::Continue, "Nominal operation"),
        }
    }
}

/// Applies the first matching rule in [`DecisionRule::PRECEDENCE`].
#[must_use]
pub fn decide(ctx: &DecisionContext) -> Decision {
    DecisionRule::select(ctx).decision()
}

/// Chosen action, its parameters, and a human-readable reason.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    command: ActionCommand,
    reason: String,
}

impl Decision {
    /// Creates a decision.
    #[must_use]
    pub fn new(command: ActionCommand, reason: impl Into<String>) -> Self {
        Self {
            command,
            reason: reason.into(),
        }
    }

    /// Typed command.
    #[must_use]
    pub const fn command(&self) -> &ActionCommand {
        &self.command
    }

    /// Action kind.
    #[must_use]
    pub const fn action(&self) -> ActionKind {
        self.command.kind()
    }

    /// Reason text.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Named parameters.
    #[must_use]
    pub fn params(&self) -> ActionParams {
        self.command.params()
    }
}

#[derive(Serialize)]
struct DecisionView<'a> {
    action: ActionKind,
    reason: &'a str,
    params: ActionParams,
}

impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DecisionView {
            action: self.action(),
            reason: &self.reason,
            params: self.params(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn nominal() -> DecisionContext {
        DecisionContext {
            corridor: Corridor::unknown(),
            quadrant: 0,
            aligned: true,
            activity: ActivityLevel::Active,
            drift_status: DriftStatus::Nominal,
            collision_ahead: false,
            intent_label: Some("EXECUTE_TASK".into()),
        }
    }

    #[test]
    fn nominal_context_continues() {
        let decision = decide(&nominal());
        assert_eq!(decision.action(), ActionKind::Continue);
        assert_eq!(decision.reason(), "Nominal operation");
        assert!(decision.params().is_empty());
    }

    #[test]
    fn critical_drift_outranks_collision() {
        let ctx = DecisionContext {
            drift_status: DriftStatus::Critical,
            collision_ahead: true,
            aligned: false,
            ..nominal()
        };
        assert_eq!(decide(&ctx).action(), ActionKind::Halt);
    }

    #[test]
    fn warning_drift_does_not_halt() {
        let ctx = DecisionContext {
            drift_status: DriftStatus::Warning,
            ..nominal()
        };
        assert_eq!(decide(&ctx).action(), ActionKind::Continue);
    }

    #[test]
    fn collision_outranks_misalignment() {
        let ctx = DecisionContext {
            collision_ahead: true,
            aligned: false,
            ..nominal()
        };
        let decision = decide(&ctx);
        assert_eq!(decision.action(), ActionKind::AvoidObstacle);
        assert_eq!(decision.params()["direction"], json!("left"));
    }

    #[test]
    fn misalignment_outranks_urgency() {
        let ctx = DecisionContext {
            aligned: false,
            intent_label: Some(URGENT_INTENT.into()),
            ..nominal()
        };
        let decision = decide(&ctx);
        assert_eq!(decision.action(), ActionKind::RealignIntent);
        assert_eq!(decision.params()["target_psi"], json!(0.8));
    }

    #[test]
    fn urgent_intent_executes_immediately() {
        let ctx = DecisionContext {
            intent_label: Some(URGENT_INTENT.into()),
            ..nominal()
        };
        assert_eq!(DecisionRule::select(&ctx), DecisionRule::UrgentIntent);
        assert_eq!(decide(&ctx).action(), ActionKind::ExecuteImmediate);
        let unlabelled = DecisionContext {
            intent_label: None,
            ..nominal()
        };
        assert_eq!(decide(&unlabelled).action(), ActionKind::Continue);
    }

    #[test]
    fn serializes_as_action_reason_params() {
        let decision = DecisionRule::CollisionAhead.decision();
        assert_eq!(
            serde_json::to_value(&decision).unwrap(),
            json!({
                "action": "AVOID_OBSTACLE",
                "reason": "Collision detected in voxel neighborhood",
                "params": { "direction": "left" }
            })
        );
    }
}
