//! Ingest: turn a `call_analyzed` webhook event into a new record row.
//!
//! Field lookup order per value:
//!
//! ```text
//! call.collected_dynamic_variables[key]
//!   └─► call.call_analysis.custom_analysis_data[key | alternate]
//!         └─► top-level fallback (call_summary, from_number)
//! ```

use std::sync::Arc;

use anyhow::Context;
use chrono::SecondsFormat;
use coordination::{Cell, Clock, EscalationRecord, Flag, SystemClock};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::store::{RowCodec, RowStore};

pub const CALL_ANALYZED: &str = "call_analyzed";

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub call: Value,
}

/// Values pulled out of one analyzed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedCall {
    pub call_id: String,
    pub agent_name: String,
    pub from_number: String,
    pub customer_name: String,
    pub service_address: String,
    pub call_summary: String,
    /// `TRUE`, `FALSE`, empty, or the raw value when unrecognized.
    pub is_emergency: String,
    pub emergency_type: String,
    pub transcript: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Appended { row: usize },
    Duplicate,
    Ignored,
}

/// Text of a JSON scalar; `None` for null, empty, or structured values.
fn scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn first(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| scalar(object.get(*key)?))
}

/// Canonicalize an emergency flag to `TRUE` / `FALSE`. Unrecognized values
/// are kept verbatim.
pub fn normalize_emergency(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.into(),
        other => {
            let raw = scalar(other).unwrap_or_default();
            match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "y" => "TRUE".into(),
                "false" | "no" | "0" | "n" => "FALSE".into(),
                _ => raw,
            }
        }
    }
}

pub fn extract_variables(call: &Value) -> ExtractedCall {
    let collected = &call["collected_dynamic_variables"];
    let analysis = &call["call_analysis"];
    let custom = &analysis["custom_analysis_data"];

    let pick = |key: &str, alternates: &[&str]| {
        first(collected, &[key])
            .or_else(|| first(custom, &[&[key][..], alternates].concat()))
            .unwrap_or_default()
    };

    let mut call_summary = pick("callSummary", &["issue_description"]);
    if call_summary.is_empty() {
        call_summary = first(analysis, &["call_summary"]).unwrap_or_default();
    }
    let mut from_number = pick("fromNumber", &["caller_phone"]);
    if from_number.is_empty() {
        from_number = first(call, &["from_number"]).unwrap_or_default();
    }

    let emergency = ["isitEmergency", "isEmergency"]
        .iter()
        .flat_map(|key| [&collected[*key], &custom[*key]])
        .find(|v| scalar(v).is_some())
        .map(normalize_emergency)
        .unwrap_or_default();

    ExtractedCall {
        call_id: first(call, &["call_id"]).unwrap_or_default(),
        agent_name: first(call, &["agent_name"]).unwrap_or_default(),
        from_number,
        customer_name: pick("customerName", &["caller_name"]),
        service_address: pick("serviceAddress", &["caller_address"]),
        call_summary,
        is_emergency: emergency,
        emergency_type: pick("emergencyType", &["emergency_type"]),
        transcript: call
            .get("transcript")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

pub struct Ingestor {
    store: Arc<dyn RowStore>,
    codec: RowCodec,
    directory: Option<Arc<dyn Directory>>,
    clock: Arc<dyn Clock>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn RowStore>, codec: RowCodec) -> Self {
        Self {
            store,
            codec,
            directory: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn ingest(&self, event: &WebhookEvent) -> anyhow::Result<IngestOutcome> {
        if event.event != CALL_ANALYZED {
            debug!(event = %event.event, "ignoring webhook event");
            return Ok(IngestOutcome::Ignored);
        }
        let extracted = extract_variables(&event.call);
        if extracted.call_id.is_empty() {
            warn!("call_analyzed event without a call id, ignoring");
            return Ok(IngestOutcome::Ignored);
        }

        let layout = self.codec.layout();
        let rows = self.store.read_rows().await.context("reading existing rows")?;
        let duplicate = rows.iter().any(|row| {
            row.get(layout.record_id)
                .is_some_and(|cell| cell.as_text().trim() == extracted.call_id)
        });
        if duplicate {
            info!(record_id = %extracted.call_id, "record already ingested");
            return Ok(IngestOutcome::Duplicate);
        }

        let mut record = EscalationRecord::new(extracted.call_id.clone());
        record.customer_name = extracted.customer_name.clone();
        record.service_address = extracted.service_address.clone();
        record.call_summary = extracted.call_summary.clone();
        record.caller_return_number = extracted.from_number.clone();
        record.emergency_type = extracted.emergency_type.clone();
        record.transcript = extracted.transcript.clone();
        record.is_emergency = extracted.is_emergency == "TRUE";
        record.automation_enabled = Flag::Yes;

        if let Some(directory) = &self.directory {
            match directory.on_call(&extracted.emergency_type).await {
                Ok(contact) => {
                    record.contact_phone = Some(contact.phone);
                    record.contact_name = (!contact.name.is_empty()).then_some(contact.name);
                }
                Err(e) => warn!(record_id = %record.record_id, error = %e, "no on-call technician for new record"),
            }
        }

        let mut cells = self
            .codec
            .encode_row(&record)
            .context("encoding new record")?;
        cells[layout.is_emergency] = Cell::text(extracted.is_emergency.clone());
        if let Some(col) = layout.received_at {
            let now = self.clock.now().to_rfc3339_opts(SecondsFormat::Secs, true);
            cells[col] = Cell::text(now);
        }
        if let Some(col) = layout.agent_name {
            cells[col] = Cell::text(extracted.agent_name.clone());
        }

        let row = self.store.append_row(cells).await.context("appending record")?;
        info!(
            row,
            record_id = %record.record_id,
            emergency = %extracted.is_emergency,
            emergency_type = %record.emergency_type,
            "record ingested"
        );
        Ok(IngestOutcome::Appended { row })
    }
}
