//! Call status as reported by the voice provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider call status. Unrecognized values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Registered,
    Ongoing,
    InProgress,
    Ended,
    Error,
    NotConnected,
    /// No answer could be obtained (empty id, provider failure).
    Unknown,
    Other(String),
}

impl CallStatus {
    /// Parse a provider status string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" | "unknown" => Self::Unknown,
            "registered" => Self::Registered,
            "ongoing" => Self::Ongoing,
            "in-progress" | "in_progress" => Self::InProgress,
            "ended" => Self::Ended,
            "error" => Self::Error,
            "not_connected" => Self::NotConnected,
            other => Self::Other(other.to_string()),
        }
    }

    /// The call is still live; the next step must wait for it.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Ongoing | Self::InProgress)
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registered => write!(f, "registered"),
            Self::Ongoing => write!(f, "ongoing"),
            Self::InProgress => write!(f, "in-progress"),
            Self::Ended => write!(f, "ended"),
            Self::Error => write!(f, "error"),
            Self::NotConnected => write!(f, "not_connected"),
            Self::Unknown => write!(f, "unknown"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// What the scheduler learned about the most recent attempt's call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallObservation {
    pub status: CallStatus,
    pub ended_at: Option<DateTime<Utc>>,
    /// The agent invoked its transfer tool during the call.
    pub transfer_invoked: bool,
}

impl CallObservation {
    /// Observation for a call that cannot be looked up.
    pub fn unknown() -> Self {
        Self {
            status: CallStatus::Unknown,
            ended_at: None,
            transfer_invoked: false,
        }
    }

    pub fn settled(transfer_invoked: bool) -> Self {
        Self {
            status: CallStatus::Ended,
            ended_at: None,
            transfer_invoked,
        }
    }

    pub fn live(status: CallStatus) -> Self {
        Self {
            status,
            ended_at: None,
            transfer_invoked: false,
        }
    }
}
