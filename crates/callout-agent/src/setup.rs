//! One-time sheet provisioning and read-only inspection.

use anyhow::Context;
use chrono::{DateTime, Utc};
use coordination::{Cell, EscalationEngine, EscalationState};
use serde::Serialize;
use tracing::{debug, info};

use crate::store::{ColumnLayout, RecordError, RowCodec, RowStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub headers_written: usize,
    pub rows_initialized: usize,
}

/// Write header names and initialize the automation cells of existing rows.
///
/// Automation headers are always (re)written. Other headers are only filled
/// where blank. Every data row gets `make_call = TRUE` and a zero counter
/// where those cells are empty.
pub async fn provision(store: &dyn RowStore, layout: &ColumnLayout) -> anyhow::Result<SetupReport> {
    let mut report = SetupReport::default();
    let header = store.header().await.context("reading header row")?;
    let automation: Vec<usize> = layout.automation_columns().iter().map(|(c, _)| *c).collect();

    for (column, name) in layout.columns() {
        let current = header.get(column).cloned().unwrap_or_default();
        let owned = automation.contains(&column);
        if (owned && current.as_text() != name) || (!owned && current.is_blank()) {
            store
                .set_header(column, &name)
                .await
                .with_context(|| format!("writing header {name}"))?;
            report.headers_written += 1;
        }
    }

    let rows = store.read_rows().await.context("reading rows")?;
    for (row, cells) in rows.iter().enumerate() {
        if cells.iter().all(Cell::is_blank) {
            continue;
        }
        let blank_at = |col: usize| cells.get(col).is_none_or(Cell::is_blank);
        let mut touched = false;
        if blank_at(layout.automation_enabled) {
            store
                .write_cell(row, layout.automation_enabled, Cell::Bool(true))
                .await
                .with_context(|| format!("initializing row {row}"))?;
            touched = true;
        }
        if blank_at(layout.attempt_count) {
            store
                .write_cell(row, layout.attempt_count, Cell::from(0u32))
                .await
                .with_context(|| format!("initializing row {row}"))?;
            touched = true;
        }
        if touched {
            debug!(row, "row initialized");
            report.rows_initialized += 1;
        }
    }

    info!(
        headers = report.headers_written,
        rows = report.rows_initialized,
        "sheet provisioned"
    );
    Ok(report)
}

/// Escalation progress of one stored row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowSummary {
    pub row: usize,
    pub record_id: String,
    pub emergency: bool,
    pub state: EscalationState,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub call_ids: Vec<String>,
}

impl std::fmt::Display for RowSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>4}  {:<24} {:<5} {:<20} attempts={}",
            self.row,
            self.record_id,
            if self.emergency { "yes" } else { "no" },
            self.state.to_string(),
            self.attempts,
        )?;
        if let Some(at) = self.last_attempt_at {
            write!(f, " last={}", at.format("%Y-%m-%d %H:%M:%S"))?;
        }
        Ok(())
    }
}

/// Summaries of the last `limit` non-blank rows.
pub async fn inspect(
    store: &dyn RowStore,
    codec: &RowCodec,
    engine: &EscalationEngine,
    limit: usize,
) -> anyhow::Result<Vec<RowSummary>> {
    let rows = store.read_rows().await.context("reading rows")?;
    let mut summaries = Vec::new();
    for (row, cells) in rows.iter().enumerate() {
        let record = match codec.decode(cells) {
            Ok(record) => record,
            Err(RecordError::Blank) => continue,
            Err(e) => return Err(e).with_context(|| format!("decoding row {row}")),
        };
        summaries.push(RowSummary {
            row,
            state: engine.state(&record),
            attempts: record.attempt_count,
            last_attempt_at: record.last_attempt_at,
            call_ids: record
                .attempt_call_ids
                .iter()
                .filter(|id| !id.is_empty())
                .cloned()
                .chain(record.fallback_call_id.clone())
                .collect(),
            emergency: record.is_emergency,
            record_id: record.record_id,
        });
    }
    let skip = summaries.len().saturating_sub(limit);
    Ok(summaries.split_off(skip))
}
