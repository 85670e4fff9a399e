//! Escalation Engine: deterministic decision-making per record
//!
//! Consumes a record, the current time and (when asked for) an observation
//! of the most recent call, and produces one [`EscalationAction`]. The engine
//! never performs I/O: when it needs the provider's view of a call it returns
//! [`EscalationAction::Observe`] and the caller re-invokes `decide` with the
//! observation attached.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::call::{CallObservation, CallStatus};
use crate::escalation::gate::{self, DelayAnchor};
use crate::escalation::ladder::{CallPurpose, CallTarget, Ladder};
use crate::escalation::state::EscalationState;
use crate::record::{EscalationOutcome, EscalationRecord};

/// Whether a placement is a ladder attempt or the terminal fallback call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    /// Counted attempt; its outcome is judged on a later tick.
    Ladder,
    /// Fire-and-forget call after the last ladder attempt.
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotEmergency,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitReason {
    /// The delay gate is still closed.
    DelayPending { remaining: TimeDelta },
    /// The most recent call has not finished.
    CallLive { status: CallStatus },
}

/// What the scheduler should do with a record right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationAction {
    Skip(SkipReason),
    Wait(WaitReason),
    /// Look up the call placed for `step` and decide again.
    Observe { step: u32, call_id: String },
    PlaceCall {
        step: u32,
        target: CallTarget,
        kind: PlacementKind,
    },
    Disable(EscalationOutcome),
}

impl EscalationAction {
    /// Whether acting on this changes the record.
    pub fn mutates(&self) -> bool {
        matches!(self, Self::PlaceCall { .. } | Self::Disable(_))
    }
}

impl std::fmt::Display for EscalationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip(SkipReason::NotEmergency) => write!(f, "skip: not an emergency"),
            Self::Skip(SkipReason::Disabled) => write!(f, "skip: automation disabled"),
            Self::Wait(WaitReason::DelayPending { remaining }) => {
                write!(f, "wait: {}s until next attempt", remaining.num_seconds())
            }
            Self::Wait(WaitReason::CallLive { status }) => write!(f, "wait: call {status}"),
            Self::Observe { step, call_id } => write!(f, "observe step {step} call {call_id:?}"),
            Self::PlaceCall { step, target, kind } => write!(
                f,
                "place {kind:?} call for step {step} to {} ({})",
                target.display_name, target.purpose
            ),
            Self::Disable(outcome) => write!(f, "disable: {outcome}"),
        }
    }
}

/// Result of carrying out an action, fed back through [`EscalationEngine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Placed {
        call_id: String,
        at: DateTime<Utc>,
        kind: PlacementKind,
    },
    Disabled(EscalationOutcome),
}

/// Configuration for the Escalation Engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of counted ladder attempts (K) before the final call.
    pub max_attempts: u32,
    /// Minimum spacing between consecutive placements.
    pub min_delay: TimeDelta,
    pub delay_anchor: DelayAnchor,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: TimeDelta::minutes(5),
            delay_anchor: DelayAnchor::LastAttempt,
        }
    }
}

/// The Escalation Engine: deterministic state machine
#[derive(Debug, Clone, Default)]
pub struct EscalationEngine {
    config: EngineConfig,
    ladder: Ladder,
}

impl EscalationEngine {
    /// Create a new engine with default config and ladder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig, ladder: Ladder) -> Self {
        Self { config, ladder }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ladder(&self) -> &Ladder {
        &self.ladder
    }

    pub fn state(&self, record: &EscalationRecord) -> EscalationState {
        EscalationState::of(record, self.config.max_attempts)
    }

    /// Decide the next action for `record`.
    ///
    /// `observation` describes the call recorded for the current step; pass
    /// `None` until the engine asks for it with `Observe`.
    pub fn decide(
        &self,
        record: &EscalationRecord,
        now: DateTime<Utc>,
        observation: Option<&CallObservation>,
    ) -> EscalationAction {
        if !record.is_emergency {
            return EscalationAction::Skip(SkipReason::NotEmergency);
        }

        match self.state(record) {
            EscalationState::Terminal(_) => EscalationAction::Skip(SkipReason::Disabled),
            EscalationState::Overflow(_) => EscalationAction::Disable(EscalationOutcome::Overflow),
            EscalationState::NotStarted => {
                if let Some(wait) = self.delay_pending(record.last_attempt_at, now) {
                    return wait;
                }
                self.place(1, PlacementKind::Ladder, record)
            }
            EscalationState::AwaitingAttempt(k) => {
                if let Some(wait) = self.delay_pending(record.last_attempt_at, now) {
                    return wait;
                }
                let Some(observation) = observation else {
                    return EscalationAction::Observe {
                        step: k,
                        call_id: record.call_id_for_step(k).unwrap_or_default().to_string(),
                    };
                };
                if observation.status.is_live() {
                    return EscalationAction::Wait(WaitReason::CallLive {
                        status: observation.status.clone(),
                    });
                }
                if self.config.delay_anchor == DelayAnchor::CallEnd {
                    if let Some(wait) = self.delay_pending(observation.ended_at, now) {
                        return wait;
                    }
                }
                if observation.transfer_invoked {
                    return EscalationAction::Disable(EscalationOutcome::Accepted);
                }
                if k < self.config.max_attempts {
                    self.place(k + 1, PlacementKind::Ladder, record)
                } else {
                    self.place(k + 1, PlacementKind::Final, record)
                }
            }
        }
    }

    fn delay_pending(
        &self,
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<EscalationAction> {
        gate::remaining(since, self.config.min_delay, now)
            .map(|remaining| EscalationAction::Wait(WaitReason::DelayPending { remaining }))
    }

    fn place(&self, step: u32, kind: PlacementKind, record: &EscalationRecord) -> EscalationAction {
        match self.ladder.resolve_target(step, record) {
            Some(mut target) => {
                if kind == PlacementKind::Final {
                    target.purpose = CallPurpose::ManagerEscalationCall;
                }
                EscalationAction::PlaceCall { step, target, kind }
            }
            None => EscalationAction::Disable(EscalationOutcome::Unreachable),
        }
    }

    /// Apply the outcome of an action to the record.
    pub fn apply(&self, record: &mut EscalationRecord, effect: Effect) {
        debug!(record_id = %record.record_id, effect = ?effect, "applying effect");
        match effect {
            Effect::Placed {
                call_id,
                at,
                kind: PlacementKind::Ladder,
            } => record.record_attempt(call_id, at),
            Effect::Placed {
                call_id,
                at,
                kind: PlacementKind::Final,
            } => {
                record.fallback_call_id = Some(call_id);
                record.last_attempt_at = Some(at);
                record.disable(EscalationOutcome::Exhausted);
            }
            Effect::Disabled(outcome) => record.disable(outcome),
        }
    }
}
