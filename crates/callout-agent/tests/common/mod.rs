//! Hand-written fakes shared by the agent integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use callout_agent::directory::{Directory, DirectoryError};
use callout_agent::provider::{CallDetails, CallRequest, ProviderError, TranscriptEntry, VoiceProvider};
use callout_agent::store::{MemorySheet, RowStore, StoreError};
use callout_agent::{CallSettings, RowCodec, Scheduler};
use chrono::{DateTime, TimeZone, Utc};
use coordination::escalation::{Contact, EngineConfig, EscalationEngine, KeywordRoute, Ladder};
use coordination::{Cell, FixedClock};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 2, 0, 0).unwrap()
}

/// Provider that hands out `out_1`, `out_2`, ... and reports every call as
/// ended without a transfer unless scripted otherwise.
#[derive(Default)]
pub struct FakeProvider {
    placed: Mutex<Vec<CallRequest>>,
    scripted: Mutex<HashMap<String, CallDetails>>,
    failing_lookups: Mutex<HashSet<String>>,
    next_id: AtomicUsize,
}

impl FakeProvider {
    pub fn script(&self, call_id: &str, details: CallDetails) {
        self.scripted.lock().unwrap().insert(call_id.into(), details);
    }

    pub fn fail_lookup(&self, call_id: &str) {
        self.failing_lookups.lock().unwrap().insert(call_id.into());
    }

    pub fn placed(&self) -> Vec<CallRequest> {
        self.placed.lock().unwrap().clone()
    }
}

pub fn details(status: &str, transfer: bool) -> CallDetails {
    let mut entries = vec![TranscriptEntry {
        role: Some("agent".into()),
        name: None,
    }];
    if transfer {
        entries.push(TranscriptEntry {
            role: Some("tool_call_invocation".into()),
            name: Some("transfer_call".into()),
        });
    }
    CallDetails {
        call_status: Some(status.into()),
        transcript_with_tool_calls: Some(entries),
        ..CallDetails::default()
    }
}

#[async_trait]
impl VoiceProvider for FakeProvider {
    async fn create_call(&self, request: &CallRequest) -> Result<String, ProviderError> {
        self.placed.lock().unwrap().push(request.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("out_{n}"))
    }

    async fn get_call(&self, call_id: &str) -> Result<CallDetails, ProviderError> {
        if self.failing_lookups.lock().unwrap().contains(call_id) {
            return Err(ProviderError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self
            .scripted
            .lock()
            .unwrap()
            .get(call_id)
            .cloned()
            .unwrap_or_else(|| details("ended", false)))
    }
}

/// Directory that answers with one technician until told otherwise.
pub struct FixedDirectory {
    contact: Mutex<Option<Contact>>,
    pub lookups: AtomicUsize,
}

impl FixedDirectory {
    pub fn new(contact: Option<Contact>) -> Self {
        Self {
            contact: Mutex::new(contact),
            lookups: AtomicUsize::new(0),
        }
    }

    /// `None` takes the directory down.
    pub fn set(&self, contact: Option<Contact>) {
        *self.contact.lock().unwrap() = contact;
    }
}

#[async_trait]
impl Directory for FixedDirectory {
    async fn on_call(&self, _emergency_type: &str) -> Result<Contact, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.contact.lock().unwrap().clone().ok_or(DirectoryError::NoTechnician)
    }
}

/// Store wrapper that rejects writes to one row, except to the `allow`
/// columns.
pub struct RejectingRow {
    pub inner: MemorySheet,
    pub row: usize,
    pub allow: Vec<usize>,
}

#[async_trait]
impl RowStore for RejectingRow {
    async fn header(&self) -> Result<Vec<Cell>, StoreError> {
        self.inner.header().await
    }

    async fn set_header(&self, column: usize, name: &str) -> Result<(), StoreError> {
        self.inner.set_header(column, name).await
    }

    async fn read_rows(&self) -> Result<Vec<Vec<Cell>>, StoreError> {
        self.inner.read_rows().await
    }

    async fn read_cell(&self, row: usize, column: usize) -> Result<Cell, StoreError> {
        self.inner.read_cell(row, column).await
    }

    async fn write_cell(&self, row: usize, column: usize, value: Cell) -> Result<(), StoreError> {
        if row == self.row && !self.allow.contains(&column) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "protected range",
            )));
        }
        self.inner.write_cell(row, column, value).await
    }

    async fn append_row(&self, cells: Vec<Cell>) -> Result<usize, StoreError> {
        self.inner.append_row(cells).await
    }
}

pub fn ladder() -> Ladder {
    Ladder::on_call_then_manager(
        3,
        vec![KeywordRoute {
            keyword: "hvac".into(),
            contact: Contact::new("HVAC manager", "503-555-0101"),
        }],
        Contact::new("Plumbing manager", "503-555-0102"),
    )
}

/// A fresh emergency row in the default layout.
pub fn emergency_row(record_id: &str, phone: &str) -> Vec<Cell> {
    let mut row = vec![Cell::Empty; 25];
    row[1] = Cell::text(record_id);
    row[6] = Cell::text("Water coming through the ceiling");
    row[7] = Cell::text("503-555-0000");
    row[8] = Cell::text("Pat Doe");
    row[9] = Cell::text("1 Main St");
    row[11] = Cell::text(phone);
    row[12] = Cell::text("TRUE");
    row[13] = Cell::text("Burst pipe");
    row[19] = Cell::Number(0.0);
    row
}

pub fn scheduler(
    store: Arc<dyn RowStore>,
    provider: Arc<FakeProvider>,
    clock: Arc<FixedClock>,
) -> Scheduler {
    scheduler_with_ladder(store, provider, clock, ladder())
}

pub fn scheduler_with_ladder(
    store: Arc<dyn RowStore>,
    provider: Arc<FakeProvider>,
    clock: Arc<FixedClock>,
    ladder: Ladder,
) -> Scheduler {
    Scheduler::new(
        store,
        provider,
        EscalationEngine::with_config(EngineConfig::default(), ladder),
        RowCodec::default(),
        CallSettings {
            from_number: "503-555-0199".into(),
            agent_id: "agent_test".into(),
        },
    )
    .with_clock(clock)
    .with_placement_pause(std::time::Duration::ZERO)
}
