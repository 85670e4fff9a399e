//! Column layout: which 0-based column holds which record field.
//!
//! Defaults match the sheet the webhook writes:
//!
//! ```text
//! A  timestamp          H  from_number       O  transcript
//! B  call_id            I  customer_name     P  make_call
//! C  agent_name         J  service_address   Q..S response_call_id_1..3
//! G  call_summary       K  email             T  call_decline_counter
//!                       L  phone             U  last_call_time
//!                       M  is_emergency      X  fallback_call_id
//!                       N  emergency_type    Y  escalation_outcome
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    pub received_at: Option<usize>,
    pub record_id: usize,
    pub agent_name: Option<usize>,
    pub call_summary: usize,
    pub caller_return_number: usize,
    pub customer_name: usize,
    pub service_address: usize,
    pub contact_email: Option<usize>,
    pub contact_phone: usize,
    pub contact_name: Option<usize>,
    pub is_emergency: usize,
    pub emergency_type: usize,
    pub transcript: usize,
    pub automation_enabled: usize,
    /// One column per counted attempt, in step order.
    pub attempt_call_ids: Vec<usize>,
    pub attempt_count: usize,
    pub last_attempt_at: usize,
    pub fallback_call_id: Option<usize>,
    pub outcome: Option<usize>,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            received_at: Some(0),
            record_id: 1,
            agent_name: Some(2),
            call_summary: 6,
            caller_return_number: 7,
            customer_name: 8,
            service_address: 9,
            contact_email: Some(10),
            contact_phone: 11,
            contact_name: None,
            is_emergency: 12,
            emergency_type: 13,
            transcript: 14,
            automation_enabled: 15,
            attempt_call_ids: vec![16, 17, 18],
            attempt_count: 19,
            last_attempt_at: 20,
            fallback_call_id: Some(23),
            outcome: Some(24),
        }
    }
}

impl ColumnLayout {
    /// Every mapped column with its header name.
    pub fn columns(&self) -> Vec<(usize, String)> {
        let mut columns = vec![
            (self.record_id, "call_id".to_string()),
            (self.call_summary, "call_summary".into()),
            (self.caller_return_number, "from_number".into()),
            (self.customer_name, "customer_name".into()),
            (self.service_address, "service_address".into()),
            (self.contact_phone, "phone".into()),
            (self.is_emergency, "is_emergency".into()),
            (self.emergency_type, "emergency_type".into()),
            (self.transcript, "transcript".into()),
        ];
        let optional = [
            (self.received_at, "timestamp"),
            (self.agent_name, "agent_name"),
            (self.contact_email, "email"),
            (self.contact_name, "contact_name"),
        ];
        columns.extend(
            optional
                .into_iter()
                .filter_map(|(col, name)| col.map(|c| (c, name.to_string()))),
        );
        columns.extend(self.automation_columns());
        columns.sort_by_key(|(col, _)| *col);
        columns
    }

    /// Columns the scheduler owns, with their header names.
    pub fn automation_columns(&self) -> Vec<(usize, String)> {
        let mut columns = vec![(self.automation_enabled, "make_call".to_string())];
        columns.extend(
            self.attempt_call_ids
                .iter()
                .enumerate()
                .map(|(i, col)| (*col, format!("response_call_id_{}", i + 1))),
        );
        columns.push((self.attempt_count, "call_decline_counter".into()));
        columns.push((self.last_attempt_at, "last_call_time".into()));
        if let Some(col) = self.fallback_call_id {
            columns.push((col, "fallback_call_id".into()));
        }
        if let Some(col) = self.outcome {
            columns.push((col, "escalation_outcome".into()));
        }
        columns
    }

    /// Number of columns a full row needs.
    pub fn width(&self) -> usize {
        self.columns().iter().map(|(col, _)| col + 1).max().unwrap_or(0)
    }

    /// First column index mapped to more than one field.
    pub fn duplicate_column(&self) -> Option<usize> {
        let columns = self.columns();
        columns
            .windows(2)
            .find(|pair| pair[0].0 == pair[1].0)
            .map(|pair| pair[0].0)
    }
}
