//! Tick driver: one pass over every record in the sheet
//!
//! ```text
//! read rows ──► for each row (persisted order):
//!                 decode ─► filter non-emergency ─► opt in unset flag
//!                   │
//!                   ▼
//!                 decide ◄──── observe call (provider) ◄── Observe
//!                   │    ◄──── fill contact (directory) ◄─ on-call step, no contact
//!                   ▼
//!                 place call / disable / wait
//!                   │
//!                   ▼
//!                 write back changed cells (last attempt time first)
//! ```
//!
//! A failure in one row is logged and counted; the batch always continues.

use std::sync::Arc;
use std::time::Duration;

use coordination::{
    phone, CallPurpose, CallTarget, Clock, Effect, EscalationAction, EscalationEngine, EscalationOutcome,
    EscalationRecord, PlacementKind, SystemClock,
};
use serde::Serialize;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::directory::Directory;
use crate::inspector::CallInspector;
use crate::provider::{CallRequest, CallVariables, VoiceProvider};
use crate::resolver::ContactResolver;
use crate::store::{RecordError, RowCodec, RowStore, StoreError};

/// Caller id and agent used for every outbound call.
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub from_number: String,
    pub agent_id: String,
}

/// Counters for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub rows: usize,
    /// Emergency records the engine was consulted for.
    pub processed: usize,
    pub skipped: usize,
    pub waiting: usize,
    /// Calls placed, including final calls.
    pub placed: usize,
    pub accepted: usize,
    pub exhausted: usize,
    /// Disabled for any reason other than accepted / exhausted.
    pub disabled: usize,
    pub failed: usize,
    /// The batch could not be read at all.
    pub read_failed: bool,
}

impl std::fmt::Display for TickReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rows={} processed={} placed={} waiting={} accepted={} exhausted={} disabled={} skipped={} failed={}",
            self.rows,
            self.processed,
            self.placed,
            self.waiting,
            self.accepted,
            self.exhausted,
            self.disabled,
            self.skipped,
            self.failed,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Skipped,
    Waiting,
    Placed(PlacementKind),
    Disabled(EscalationOutcome),
    PlacementFailed,
}

#[derive(Debug, Error)]
enum RowError {
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Scheduler {
    store: Arc<dyn RowStore>,
    provider: Arc<dyn VoiceProvider>,
    inspector: CallInspector,
    resolver: ContactResolver,
    engine: EscalationEngine,
    codec: RowCodec,
    clock: Arc<dyn Clock>,
    call: CallSettings,
    placement_pause: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn RowStore>,
        provider: Arc<dyn VoiceProvider>,
        engine: EscalationEngine,
        codec: RowCodec,
        call: CallSettings,
    ) -> Self {
        Self {
            inspector: CallInspector::new(provider.clone()),
            resolver: ContactResolver::new(None),
            store,
            provider,
            engine,
            codec,
            clock: Arc::new(SystemClock),
            call,
            placement_pause: Duration::from_secs(2),
        }
    }

    /// Scheduler wired from configuration.
    pub fn from_config(
        config: &AgentConfig,
        store: Arc<dyn RowStore>,
        provider: Arc<dyn VoiceProvider>,
    ) -> Self {
        Self::new(
            store,
            provider,
            config.engine(),
            RowCodec::new(config.columns.clone()),
            CallSettings {
                from_number: config.provider.from_number.clone(),
                agent_id: config.provider.agent_id.clone(),
            },
        )
        .with_transfer_tool(config.provider.transfer_tool.clone())
        .with_placement_pause(config.schedule.placement_pause())
    }

    pub fn with_directory(mut self, directory: Arc<dyn Directory>) -> Self {
        self.resolver = ContactResolver::new(Some(directory));
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_placement_pause(mut self, pause: Duration) -> Self {
        self.placement_pause = pause;
        self
    }

    pub fn with_transfer_tool(mut self, tool: impl Into<String>) -> Self {
        self.inspector = CallInspector::new(self.provider.clone()).with_transfer_tool(tool);
        self
    }

    /// Process every row once.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let rows = match self.store.read_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                error!(error = %e, "failed to read rows, skipping tick");
                report.read_failed = true;
                return report;
            }
        };
        report.rows = rows.len();

        let mut placed_this_tick = 0usize;
        for (row, cells) in rows.iter().enumerate() {
            match self.process_row(row, cells, placed_this_tick).await {
                Ok(outcome) => {
                    if outcome != RowOutcome::Skipped {
                        report.processed += 1;
                    }
                    match outcome {
                        RowOutcome::Skipped => report.skipped += 1,
                        RowOutcome::Waiting => report.waiting += 1,
                        RowOutcome::Placed(kind) => {
                            placed_this_tick += 1;
                            report.placed += 1;
                            if kind == PlacementKind::Final {
                                report.exhausted += 1;
                            }
                        }
                        RowOutcome::Disabled(EscalationOutcome::Accepted) => report.accepted += 1,
                        RowOutcome::Disabled(_) => report.disabled += 1,
                        RowOutcome::PlacementFailed => report.failed += 1,
                    }
                }
                Err(e) => {
                    warn!(row, error = %e, "record failed, continuing with next row");
                    report.failed += 1;
                }
            }
        }

        info!(%report, "tick complete");
        report
    }

    async fn process_row(
        &self,
        row: usize,
        cells: &[coordination::Cell],
        placed_this_tick: usize,
    ) -> Result<RowOutcome, RowError> {
        let before = match self.codec.decode(cells) {
            Ok(record) => record,
            Err(RecordError::Blank) => return Ok(RowOutcome::Skipped),
            Err(e) => return Err(e.into()),
        };
        if !before.is_emergency {
            return Ok(RowOutcome::Skipped);
        }

        let mut record = before.clone();
        if record.opt_in_by_default() {
            debug!(row, record_id = %record.record_id, "automation flag unset, opting in");
        }

        let outcome = self.escalate(row, &mut record, placed_this_tick).await;

        let last_attempt = self.codec.layout().last_attempt_at;
        let mut changes = self.codec.changes(&before, &record)?;
        changes.sort_by_key(|(column, _)| *column != last_attempt);
        for (column, cell) in changes {
            if let Err(e) = self.store.write_cell(row, column, cell).await {
                if let RowOutcome::Placed(_) = outcome {
                    error!(
                        row,
                        record_id = %record.record_id,
                        call_id = %latest_call_id(&record),
                        column,
                        error = %e,
                        "call placed but not fully recorded"
                    );
                }
                return Err(e.into());
            }
        }
        Ok(outcome)
    }

    /// Drive the engine for one record until it settles on an action.
    async fn escalate(
        &self,
        row: usize,
        record: &mut EscalationRecord,
        placed_this_tick: usize,
    ) -> RowOutcome {
        let now = self.clock.now();
        let mut observation = None;
        let mut filled = false;

        loop {
            let action = self.engine.decide(record, now, observation.as_ref());
            debug!(row, record_id = %record.record_id, %action, "decision");
            if !filled && self.wants_contact(&action, record) {
                filled = true;
                if self.resolver.fill_on_call(self.engine.ladder(), record).await {
                    continue;
                }
            }
            match action {
                EscalationAction::Skip(_) => return RowOutcome::Skipped,
                EscalationAction::Wait(_) => return RowOutcome::Waiting,
                EscalationAction::Observe { call_id, .. } => {
                    observation = Some(self.inspector.observe(&call_id).await);
                }
                EscalationAction::Disable(outcome) => {
                    info!(row, record_id = %record.record_id, %outcome, "automation disabled");
                    self.engine.apply(record, Effect::Disabled(outcome));
                    return RowOutcome::Disabled(outcome);
                }
                EscalationAction::PlaceCall { step, target, kind } => {
                    if placed_this_tick > 0 && !self.placement_pause.is_zero() {
                        tokio::time::sleep(self.placement_pause).await;
                    }
                    let request = self.call_request(record, &target);
                    return match self.provider.create_call(&request).await {
                        Ok(call_id) => {
                            info!(
                                row,
                                record_id = %record.record_id,
                                step,
                                call_id = %call_id,
                                to = %target.phone,
                                purpose = %target.purpose,
                                "call placed"
                            );
                            let at = self.clock.now();
                            self.engine.apply(record, Effect::Placed { call_id, at, kind });
                            if kind == PlacementKind::Final {
                                info!(row, record_id = %record.record_id, "ladder exhausted, automation disabled");
                            }
                            RowOutcome::Placed(kind)
                        }
                        Err(e) => {
                            warn!(row, record_id = %record.record_id, step, error = %e, "call placement failed, retrying next tick");
                            RowOutcome::PlacementFailed
                        }
                    };
                }
            }
        }
    }

    /// Whether `action` stands in for an on-call step the directory could staff.
    fn wants_contact(&self, action: &EscalationAction, record: &EscalationRecord) -> bool {
        let ladder = self.engine.ladder();
        let on_call = match action {
            EscalationAction::PlaceCall { step, .. } => ladder.is_on_call_step(*step, record),
            EscalationAction::Disable(EscalationOutcome::Unreachable) => true,
            _ => false,
        };
        on_call && self.resolver.applies(ladder, record)
    }

    fn call_request(
        &self,
        record: &EscalationRecord,
        target: &CallTarget,
    ) -> CallRequest {
        CallRequest {
            from_number: phone::normalize(&self.call.from_number),
            to_number: target.phone.clone(),
            override_agent_id: self.call.agent_id.clone(),
            retell_llm_dynamic_variables: CallVariables {
                customer_name: record.customer_name.clone(),
                customer_address: record.service_address.clone(),
                transcript: record.transcript.clone(),
                call_summary: record.call_summary.clone(),
                transfer_number: phone::normalize(&record.caller_return_number),
                emergency_type: record.emergency_type.clone(),
                is_emergency: if record.is_emergency { "TRUE" } else { "FALSE" }.into(),
                call_purpose: target.purpose.to_string(),
                contact_name: target.display_name.clone(),
                manager_name: (target.purpose == CallPurpose::ManagerEscalationCall)
                    .then(|| target.display_name.clone()),
            },
        }
    }

    /// Tick on a fixed interval until `cancel` fires. A running tick is
    /// always finished first. Returns the number of ticks run.
    pub async fn run(&self, every: Duration, cancel: CancellationToken) -> u64 {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(ticks, "shutdown requested, stopping scheduler");
                    return ticks;
                }
                _ = interval.tick() => {
                    self.tick().await;
                    ticks += 1;
                }
            }
        }
    }
}

fn latest_call_id(record: &EscalationRecord) -> &str {
    record
        .fallback_call_id
        .as_deref()
        .or_else(|| record.attempt_call_ids.last().map(String::as_str))
        .unwrap_or_default()
}
