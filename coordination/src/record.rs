//! Escalation Record: the persisted state of one emergency event

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::flags::Flag;

/// Why automation was switched off for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationOutcome {
    /// A contact accepted: the agent invoked its transfer tool.
    Accepted,
    /// The final rung was called; nobody is left to try.
    Exhausted,
    /// No dialable contact could be resolved for the next step.
    Unreachable,
    /// The stored attempt counter was beyond the ladder.
    Overflow,
}

impl EscalationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Exhausted => "exhausted",
            Self::Unreachable => "unreachable",
            Self::Overflow => "overflow",
        }
    }
}

impl std::fmt::Display for EscalationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EscalationOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accepted" => Ok(Self::Accepted),
            "exhausted" => Ok(Self::Exhausted),
            "unreachable" => Ok(Self::Unreachable),
            "overflow" => Ok(Self::Overflow),
            other => Err(format!("unknown escalation outcome: {other}")),
        }
    }
}

/// One emergency event and its escalation progress.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// Originating call identifier.
    pub record_id: String,
    pub customer_name: String,
    pub service_address: String,
    pub transcript: String,
    pub call_summary: String,
    pub emergency_type: String,
    /// First-line contact (usually the on-call technician).
    pub contact_phone: Option<String>,
    pub contact_name: Option<String>,
    /// Number the agent offers to transfer the callee to.
    pub caller_return_number: String,
    pub is_emergency: bool,
    /// Record-level kill switch.
    pub automation_enabled: Flag,
    /// Call id per ladder attempt, positionally aligned with the step
    /// (`attempt_call_ids[k - 1]` belongs to step `k`).
    pub attempt_call_ids: Vec<String>,
    pub attempt_count: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Id of the terminal fire-and-forget call.
    pub fallback_call_id: Option<String>,
    pub outcome: Option<EscalationOutcome>,
}

impl EscalationRecord {
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: record_id.into(),
            ..Default::default()
        }
    }

    /// Whether the scheduler should look at this record at all.
    pub fn is_active(&self) -> bool {
        self.is_emergency && self.automation_enabled.or_yes()
    }

    /// Turn an unset kill switch into an explicit opt-in.
    ///
    /// Returns `true` if the flag changed.
    pub fn opt_in_by_default(&mut self) -> bool {
        if self.automation_enabled == Flag::Unset {
            self.automation_enabled = Flag::Yes;
            true
        } else {
            false
        }
    }

    /// Call id recorded for ladder step `step` (1-indexed), if any.
    pub fn call_id_for_step(&self, step: u32) -> Option<&str> {
        let index = usize::try_from(step.checked_sub(1)?).ok()?;
        self.attempt_call_ids
            .get(index)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Record a placed ladder call: the new id lands in the slot for the
    /// next step and the counter advances.
    pub fn record_attempt(&mut self, call_id: impl Into<String>, at: DateTime<Utc>) {
        let slot = self.attempt_count as usize;
        self.attempt_call_ids.resize(slot, String::new());
        self.attempt_call_ids.push(call_id.into());
        self.attempt_count += 1;
        self.last_attempt_at = Some(at);
    }

    /// Freeze the record. Permanent.
    pub fn disable(&mut self, outcome: EscalationOutcome) {
        self.automation_enabled = Flag::No;
        self.outcome = Some(outcome);
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        format!(
            "record={} attempts={} enabled={} outcome={}",
            self.record_id,
            self.attempt_count,
            self.automation_enabled,
            self.outcome.map(|o| o.as_str()).unwrap_or("-"),
        )
    }
}
