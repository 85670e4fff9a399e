//! Escalation State: where a record sits on the ladder

use serde::{Deserialize, Serialize};

use crate::record::{EscalationOutcome, EscalationRecord};

/// Derived from the persisted record on every tick; never stored itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum EscalationState {
    /// No call placed yet.
    NotStarted,
    /// `k` ladder calls placed; waiting to judge the k-th.
    AwaitingAttempt(u32),
    /// Automation disabled. The outcome is `None` when someone switched
    /// the record off by hand.
    Terminal(Option<EscalationOutcome>),
    /// Counter beyond the ladder with automation still on.
    Overflow(u32),
}

impl EscalationState {
    /// Derive the state of `record` for a ladder of `max_attempts` calls.
    pub fn of(record: &EscalationRecord, max_attempts: u32) -> Self {
        if !record.automation_enabled.or_yes() {
            return Self::Terminal(record.outcome);
        }
        match record.attempt_count {
            0 => Self::NotStarted,
            k if k <= max_attempts => Self::AwaitingAttempt(k),
            k => Self::Overflow(k),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }

    /// Number of ladder calls already placed.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::NotStarted => Some(0),
            Self::AwaitingAttempt(k) | Self::Overflow(k) => Some(*k),
            Self::Terminal(_) => None,
        }
    }
}

impl std::fmt::Display for EscalationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::AwaitingAttempt(k) => write!(f, "awaiting_attempt({k})"),
            Self::Terminal(Some(outcome)) => write!(f, "terminal({outcome})"),
            Self::Terminal(None) => write!(f, "terminal"),
            Self::Overflow(k) => write!(f, "overflow({k})"),
        }
    }
}
