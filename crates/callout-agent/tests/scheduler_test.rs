//! Integration tests for the tick driver
//!
//! Runs the scheduler against an in-memory sheet with a fake provider and
//! directory, tick by tick on a manual clock.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use callout_agent::store::MemorySheet;
use chrono::TimeDelta;
use coordination::escalation::{Contact, Ladder};
use coordination::{Cell, FixedClock};

use common::{
    details, emergency_row, scheduler, scheduler_with_ladder, start, FakeProvider, FixedDirectory,
    RejectingRow,
};

fn sheet(rows: Vec<Vec<Cell>>) -> Arc<MemorySheet> {
    Arc::new(MemorySheet::new(Vec::new(), rows))
}

/// Test: first call goes to the normalized on-call phone and is recorded.
#[tokio::test]
async fn test_first_call_is_placed_and_recorded() {
    let store = sheet(vec![emergency_row("call_in_1", "2063385620")]);
    let provider = Arc::new(FakeProvider::default());
    let clock = Arc::new(FixedClock::new(start()));
    let scheduler = scheduler(store.clone(), provider.clone(), clock);

    let report = scheduler.tick().await;
    assert_eq!(report.placed, 1);
    assert_eq!(report.failed, 0);

    let placed = provider.placed();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].to_number, "+12063385620");
    assert_eq!(placed[0].from_number, "+15035550199");
    assert_eq!(placed[0].override_agent_id, "agent_test");
    let vars = &placed[0].retell_llm_dynamic_variables;
    assert_eq!(vars.call_purpose, "emergency_notification");
    assert_eq!(vars.transfer_number, "+15035550000");
    assert_eq!(vars.customer_name, "Pat Doe");
    assert_eq!(vars.is_emergency, "TRUE");
    assert_eq!(vars.manager_name, None);

    let row = &store.snapshot().rows[0];
    assert_eq!(row[15], Cell::Bool(true));
    assert_eq!(row[16], Cell::text("out_1"));
    assert_eq!(row[19], Cell::Number(1.0));
    assert_eq!(row[20].as_timestamp(), Some(start()));
    assert_eq!(row[11], Cell::text("2063385620"));
}

/// Test: a live call holds the record even when the delay has passed.
#[tokio::test]
async fn test_ongoing_call_blocks_next_attempt() {
    let mut row = emergency_row("call_in_1", "2063385620");
    row[15] = Cell::Bool(true);
    row[16] = Cell::text("out_prev");
    row[19] = Cell::Number(1.0);
    row[20] = Cell::timestamp(start() - TimeDelta::minutes(10));
    let store = sheet(vec![row.clone()]);
    let provider = Arc::new(FakeProvider::default());
    provider.script("out_prev", details("in-progress", false));
    let scheduler = scheduler(store.clone(), provider.clone(), Arc::new(FixedClock::new(start())));

    let report = scheduler.tick().await;
    assert_eq!(report.waiting, 1);
    assert!(provider.placed().is_empty());
    assert_eq!(store.snapshot().rows[0], row);
}

/// Test: three declines lead to one final manager call and a frozen record.
#[tokio::test]
async fn test_decline_chain_reaches_final_call() {
    let store = sheet(vec![emergency_row("call_in_1", "2063385620")]);
    let provider = Arc::new(FakeProvider::default());
    let clock = Arc::new(FixedClock::new(start()));
    let scheduler = scheduler(store.clone(), provider.clone(), clock.clone());

    for _ in 0..4 {
        scheduler.tick().await;
        clock.advance(TimeDelta::minutes(6));
    }
    let report = scheduler.tick().await;
    assert_eq!(report.placed, 0);
    assert_eq!(report.skipped, 1);

    let placed = provider.placed();
    assert_eq!(placed.len(), 4);
    let last = &placed[3];
    assert_eq!(last.to_number, "+15035550102");
    assert_eq!(last.retell_llm_dynamic_variables.call_purpose, "manager_escalation_call");
    assert_eq!(
        last.retell_llm_dynamic_variables.manager_name.as_deref(),
        Some("Plumbing manager")
    );

    let row = &store.snapshot().rows[0];
    assert_eq!(row[16], Cell::text("out_1"));
    assert_eq!(row[17], Cell::text("out_2"));
    assert_eq!(row[18], Cell::text("out_3"));
    assert_eq!(row[19], Cell::Number(3.0));
    assert_eq!(row[23], Cell::text("out_4"));
    assert_eq!(row[24], Cell::text("exhausted"));
    assert_eq!(row[15], Cell::Bool(false));
}

/// Test: a transfer on the first call ends the escalation.
#[tokio::test]
async fn test_transfer_stops_escalation() {
    let store = sheet(vec![emergency_row("call_in_1", "2063385620")]);
    let provider = Arc::new(FakeProvider::default());
    provider.script("out_1", details("ended", true));
    let clock = Arc::new(FixedClock::new(start()));
    let scheduler = scheduler(store.clone(), provider.clone(), clock.clone());

    scheduler.tick().await;
    clock.advance(TimeDelta::minutes(6));
    let report = scheduler.tick().await;
    assert_eq!(report.accepted, 1);

    clock.advance(TimeDelta::minutes(6));
    scheduler.tick().await;
    assert_eq!(provider.placed().len(), 1);
    let row = &store.snapshot().rows[0];
    assert_eq!(row[15], Cell::Bool(false));
    assert_eq!(row[24], Cell::text("accepted"));
    assert_eq!(row[19], Cell::Number(1.0));
}

/// Test: non-emergency, disabled and blank rows are left alone.
#[tokio::test]
async fn test_inactive_rows_are_untouched() {
    let mut routine = emergency_row("call_routine", "2063385620");
    routine[12] = Cell::text("FALSE");
    let mut disabled = emergency_row("call_off", "2063385620");
    disabled[15] = Cell::Bool(false);
    let rows = vec![routine, Vec::new(), disabled];
    let store = sheet(rows.clone());
    let provider = Arc::new(FakeProvider::default());
    let scheduler = scheduler(store.clone(), provider.clone(), Arc::new(FixedClock::new(start())));

    let report = scheduler.tick().await;
    assert_eq!(report.rows, 3);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.processed, 0);
    assert!(provider.placed().is_empty());
    assert_eq!(store.snapshot().rows, rows);
}

/// Test: a failing status lookup and a rejected write stay confined to
/// their own rows.
#[tokio::test]
async fn test_row_faults_do_not_stop_siblings() {
    let mut stuck = emergency_row("call_a", "2063385620");
    stuck[15] = Cell::Bool(true);
    stuck[16] = Cell::text("out_broken");
    stuck[19] = Cell::Number(1.0);
    stuck[20] = Cell::timestamp(start() - TimeDelta::minutes(10));
    let store = Arc::new(RejectingRow {
        inner: MemorySheet::new(
            Vec::new(),
            vec![
                emergency_row("call_rejected", "2063385620"),
                stuck,
                emergency_row("call_b", "2063385621"),
            ],
        ),
        row: 0,
        allow: Vec::new(),
    });
    let provider = Arc::new(FakeProvider::default());
    provider.fail_lookup("out_broken");
    let scheduler = scheduler(store.clone(), provider.clone(), Arc::new(FixedClock::new(start())));

    let report = scheduler.tick().await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.placed, 2);
    assert_eq!(provider.placed().len(), 3);

    let snapshot = store.inner.snapshot();
    assert_eq!(snapshot.rows[0][19], Cell::Number(0.0));
    assert_eq!(snapshot.rows[1][19], Cell::Number(2.0));
    assert_eq!(snapshot.rows[2][19], Cell::Number(1.0));
}

/// Test: a record without a contact phone is dialed through the directory.
#[tokio::test]
async fn test_missing_contact_filled_from_directory() {
    let store = sheet(vec![emergency_row("call_in_1", "")]);
    let provider = Arc::new(FakeProvider::default());
    let directory = Arc::new(FixedDirectory::new(Some(Contact::new("Sam", "(503) 555-0142"))));
    let scheduler = scheduler(store.clone(), provider.clone(), Arc::new(FixedClock::new(start())))
        .with_directory(directory.clone());

    let report = scheduler.tick().await;
    assert_eq!(report.placed, 1);
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
    let placed = provider.placed();
    assert_eq!(placed[0].to_number, "+15035550142");
    assert_eq!(placed[0].retell_llm_dynamic_variables.contact_name, "Sam");

    let row = &store.snapshot().rows[0];
    assert_eq!(row[11], Cell::Empty);
    assert_eq!(row[19], Cell::Number(1.0));
}

/// Test: with no stored phone and no directory answer, every step goes to
/// the routed manager until the ladder is exhausted.
#[tokio::test]
async fn test_directory_without_answer_escalates_to_manager() {
    let store = sheet(vec![emergency_row("call_in_1", "")]);
    let provider = Arc::new(FakeProvider::default());
    let directory = Arc::new(FixedDirectory::new(None));
    let clock = Arc::new(FixedClock::new(start()));
    let scheduler = scheduler(store.clone(), provider.clone(), clock.clone())
        .with_directory(directory.clone());

    for _ in 0..4 {
        scheduler.tick().await;
        clock.advance(TimeDelta::minutes(6));
    }
    let report = scheduler.tick().await;
    assert_eq!(report.skipped, 1);

    let placed = provider.placed();
    assert_eq!(placed.len(), 4);
    for request in &placed {
        assert_eq!(request.to_number, "+15035550102");
        let vars = &request.retell_llm_dynamic_variables;
        assert_eq!(vars.call_purpose, "manager_escalation_call");
        assert_eq!(vars.manager_name.as_deref(), Some("Plumbing manager"));
    }
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 3);

    let row = &store.snapshot().rows[0];
    assert_eq!(row[19], Cell::Number(3.0));
    assert_eq!(row[23], Cell::text("out_4"));
    assert_eq!(row[24], Cell::text("exhausted"));
    assert_eq!(row[15], Cell::Bool(false));
}

/// Test: a directory outage after the first call moves the ladder on to the
/// manager instead of stopping it.
#[tokio::test]
async fn test_directory_outage_mid_ladder_reaches_manager() {
    let store = sheet(vec![emergency_row("call_in_1", "")]);
    let provider = Arc::new(FakeProvider::default());
    let directory = Arc::new(FixedDirectory::new(Some(Contact::new("Sam", "(503) 555-0142"))));
    let clock = Arc::new(FixedClock::new(start()));
    let scheduler = scheduler(store.clone(), provider.clone(), clock.clone())
        .with_directory(directory.clone());

    assert_eq!(scheduler.tick().await.placed, 1);
    directory.set(None);
    for _ in 0..4 {
        clock.advance(TimeDelta::minutes(6));
        scheduler.tick().await;
    }

    let numbers: Vec<String> = provider.placed().into_iter().map(|r| r.to_number).collect();
    assert_eq!(
        numbers,
        ["+15035550142", "+15035550102", "+15035550102", "+15035550102"]
    );
    let row = &store.snapshot().rows[0];
    assert_eq!(row[16], Cell::text("out_1"));
    assert_eq!(row[19], Cell::Number(3.0));
    assert_eq!(row[24], Cell::text("exhausted"));
}

/// Test: a ladder with nothing dialable past the on-call rungs freezes the
/// record without calling anyone.
#[tokio::test]
async fn test_undialable_ladder_disables_record() {
    let store = sheet(vec![emergency_row("call_in_1", "")]);
    let provider = Arc::new(FakeProvider::default());
    let directory = Arc::new(FixedDirectory::new(None));
    let scheduler = scheduler_with_ladder(
        store.clone(),
        provider.clone(),
        Arc::new(FixedClock::new(start())),
        Ladder::default(),
    )
    .with_directory(directory.clone());

    let report = scheduler.tick().await;
    assert_eq!(report.disabled, 1);
    assert!(provider.placed().is_empty());
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
    let row = &store.snapshot().rows[0];
    assert_eq!(row[15], Cell::Bool(false));
    assert_eq!(row[24], Cell::text("unreachable"));
}

/// Test: when write-back fails after a call went out, the attempt time is
/// already stored and holds the next call behind the delay.
#[tokio::test]
async fn test_attempt_time_is_written_first() {
    let mut opted_in = emergency_row("call_in_1", "2063385620");
    opted_in[15] = Cell::Bool(true);
    let store = Arc::new(RejectingRow {
        inner: MemorySheet::new(Vec::new(), vec![opted_in]),
        row: 0,
        allow: vec![20],
    });
    let provider = Arc::new(FakeProvider::default());
    let clock = Arc::new(FixedClock::new(start()));
    let scheduler = scheduler(store.clone(), provider.clone(), clock.clone());

    let report = scheduler.tick().await;
    assert_eq!(report.failed, 1);
    assert_eq!(provider.placed().len(), 1);
    let row = &store.inner.snapshot().rows[0];
    assert_eq!(row[20].as_timestamp(), Some(start()));
    assert_eq!(row[19], Cell::Number(0.0));

    clock.advance(TimeDelta::minutes(1));
    let report = scheduler.tick().await;
    assert_eq!(report.waiting, 1);
    assert_eq!(provider.placed().len(), 1);
}

/// Test: the run loop stops once cancelled.
#[tokio::test(start_paused = true)]
async fn test_run_stops_on_cancel() {
    let store = sheet(vec![emergency_row("call_in_1", "2063385620")]);
    let provider = Arc::new(FakeProvider::default());
    let scheduler = Arc::new(scheduler(store, provider.clone(), Arc::new(FixedClock::new(start()))));
    let cancel = tokio_util::sync::CancellationToken::new();

    let handle = {
        let scheduler = scheduler.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(std::time::Duration::from_secs(60), cancel).await })
    };
    tokio::time::sleep(std::time::Duration::from_secs(150)).await;
    cancel.cancel();
    let ticks = handle.await.unwrap();
    assert_eq!(ticks, 3);
    assert_eq!(provider.placed().len(), 1);
}
