//! Row <-> record conversion.
//!
//! Decoding applies safe defaults to malformed cells. Encoding is a diff:
//! only scheduler-owned cells that actually changed are written back.

use coordination::flags::flag_cell;
use coordination::{parse_flag, Cell, EscalationOutcome, EscalationRecord, Flag};
use thiserror::Error;
use tracing::debug;

use super::layout::ColumnLayout;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("row is blank")]
    Blank,
    #[error("attempt {step} has no call id column (layout has {slots})")]
    NoIdSlot { step: usize, slots: usize },
}

static EMPTY: Cell = Cell::Empty;

#[derive(Debug, Clone, Default)]
pub struct RowCodec {
    layout: ColumnLayout,
}

impl RowCodec {
    pub fn new(layout: ColumnLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    pub fn decode(&self, row: &[Cell]) -> Result<EscalationRecord, RecordError> {
        if row.iter().all(Cell::is_blank) {
            return Err(RecordError::Blank);
        }
        let l = &self.layout;
        let get = |col: usize| row.get(col).unwrap_or(&EMPTY);
        let text = |col: usize| get(col).as_text().trim().to_string();

        let record_id = text(l.record_id);

        let mut attempt_call_ids: Vec<String> =
            l.attempt_call_ids.iter().map(|col| text(*col)).collect();
        while attempt_call_ids.last().is_some_and(String::is_empty) {
            attempt_call_ids.pop();
        }

        let count_cell = get(l.attempt_count);
        let attempt_count = count_cell.as_count();
        if attempt_count == 0 && !count_cell.is_blank() && count_cell.as_text().trim() != "0" {
            debug!(record_id = %record_id, value = %count_cell, "unparseable attempt counter, using 0");
        }

        let time_cell = get(l.last_attempt_at);
        let last_attempt_at = time_cell.as_timestamp();
        if last_attempt_at.is_none() && !time_cell.is_blank() {
            debug!(record_id = %record_id, value = %time_cell, "unparseable last call time, ignoring");
        }

        let outcome = l.outcome.and_then(|col| get(col).as_opt_text()).and_then(|raw| {
            raw.parse::<EscalationOutcome>()
                .map_err(|e| debug!(record_id = %record_id, error = %e, "ignoring outcome"))
                .ok()
        });

        Ok(EscalationRecord {
            customer_name: text(l.customer_name),
            service_address: text(l.service_address),
            transcript: get(l.transcript).as_text(),
            call_summary: text(l.call_summary),
            emergency_type: text(l.emergency_type),
            contact_phone: get(l.contact_phone).as_opt_text(),
            contact_name: l.contact_name.and_then(|col| get(col).as_opt_text()),
            caller_return_number: text(l.caller_return_number),
            is_emergency: parse_flag(get(l.is_emergency)).is_yes(),
            automation_enabled: parse_flag(get(l.automation_enabled)),
            attempt_call_ids,
            attempt_count,
            last_attempt_at,
            fallback_call_id: l.fallback_call_id.and_then(|col| get(col).as_opt_text()),
            outcome,
            record_id,
        })
    }

    /// Cells to write so the stored row reflects `after`, given it was
    /// decoded as `before`.
    pub fn changes(
        &self,
        before: &EscalationRecord,
        after: &EscalationRecord,
    ) -> Result<Vec<(usize, Cell)>, RecordError> {
        let l = &self.layout;
        let mut out = Vec::new();

        if before.automation_enabled != after.automation_enabled {
            out.push((l.automation_enabled, flag_cell(after.automation_enabled)));
        }

        for (index, id) in after.attempt_call_ids.iter().enumerate() {
            if before.attempt_call_ids.get(index) == Some(id) {
                continue;
            }
            let col = l.attempt_call_ids.get(index).ok_or(RecordError::NoIdSlot {
                step: index + 1,
                slots: l.attempt_call_ids.len(),
            })?;
            out.push((*col, Cell::text(id.clone())));
        }

        if before.attempt_count != after.attempt_count {
            out.push((l.attempt_count, Cell::from(after.attempt_count)));
        }

        if before.last_attempt_at != after.last_attempt_at {
            let cell = after.last_attempt_at.map(Cell::timestamp).unwrap_or_default();
            out.push((l.last_attempt_at, cell));
        }

        if let Some(col) = l.fallback_call_id {
            if before.fallback_call_id != after.fallback_call_id {
                out.push((col, Cell::text(after.fallback_call_id.clone().unwrap_or_default())));
            }
        }

        if let Some(col) = l.outcome {
            if before.outcome != after.outcome {
                let cell = after.outcome.map(|o| Cell::text(o.as_str())).unwrap_or_default();
                out.push((col, cell));
            }
        }

        Ok(out)
    }

    /// A complete row for a new record.
    pub fn encode_row(&self, record: &EscalationRecord) -> Result<Vec<Cell>, RecordError> {
        let l = &self.layout;
        let mut row = vec![Cell::Empty; l.width()];
        let mut put = |col: usize, cell: Cell| row[col] = cell;

        put(l.record_id, Cell::text(record.record_id.clone()));
        put(l.call_summary, Cell::text(record.call_summary.clone()));
        put(l.caller_return_number, Cell::text(record.caller_return_number.clone()));
        put(l.customer_name, Cell::text(record.customer_name.clone()));
        put(l.service_address, Cell::text(record.service_address.clone()));
        put(l.contact_phone, Cell::text(record.contact_phone.clone().unwrap_or_default()));
        if let Some(col) = l.contact_name {
            put(col, Cell::text(record.contact_name.clone().unwrap_or_default()));
        }
        put(l.is_emergency, Cell::Bool(record.is_emergency));
        put(l.emergency_type, Cell::text(record.emergency_type.clone()));
        put(l.transcript, Cell::text(record.transcript.clone()));
        put(l.attempt_count, Cell::from(record.attempt_count));

        let blank = EscalationRecord {
            automation_enabled: Flag::Unset,
            ..EscalationRecord::default()
        };
        for (col, cell) in self.changes(&blank, record)? {
            put(col, cell);
        }
        Ok(row)
    }
}
