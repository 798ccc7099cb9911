/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! End-to-end auto-fill scenarios over the public API.

use msgsched::autofill::{self, AutoFillOutcome, CancelToken, Progress};
use msgsched::config::{ApplicationParameters, DataTypeTable};
use msgsched::item::{ApplicationInfo, Item};
use msgsched::scheduler::{MessageScheduler, ScheduleLayout, SchedulerKind};
use msgsched::source::{ItemCatalog, ItemSource};

// ── Helpers ───────────────────────────────────────────────────────────────────

/// `total` messages of `capacity` bytes in a one-second cycle.
fn layout(total: usize, capacity: i64) -> ScheduleLayout {
    ScheduleLayout {
        kind: SchedulerKind::Telemetry,
        rate_name: "Rate 1".into(),
        total_messages: total,
        message_capacity: capacity,
        period_secs: 1.0,
    }
}

fn make_item(name: &str, size: u32, rate: f64) -> Item {
    let mut item = Item::telemetry(format!("Root,uint8.{name}"), rate, &DataTypeTable::primitives())
        .unwrap();
    item.size = size;
    item
}

fn catalog_at_one_hz(items: &[(&str, u32)]) -> ItemCatalog {
    let mut c = ItemCatalog::new();
    for &(name, size) in items {
        c.push("1", make_item(name, size, 1.0));
    }
    c
}

fn full(name: &str) -> String {
    format!("Root,uint8.{name}")
}

/// Every item's footprint plus the remaining room equals the capacity, for
/// every sub-message; every parent reports the minimum of its sub-messages.
fn assert_exact_accounting(s: &MessageScheduler) {
    let arena = s.messages();
    let capacity = s.layout().message_capacity;
    for &parent in arena.parents() {
        let msg = arena.get(parent).unwrap();
        let mut min_sub = i64::MAX;
        for &sub in msg.sub_messages() {
            let used: i64 = msg
                .variables()
                .iter()
                .chain(arena.get(sub).unwrap().variables())
                .map(|n| s.item(n).unwrap().footprint() as i64)
                .sum();
            let remaining = arena.bytes_remaining(sub);
            assert_eq!(used + remaining, capacity, "sub-message {}", sub.index());
            min_sub = min_sub.min(remaining);
        }
        assert_eq!(arena.bytes_remaining(parent), min_sub);
    }
}

// ── Scenario 1: three items, two messages ─────────────────────────────────────

#[test]
fn three_items_fit_two_messages() {
    let mut scheduler = MessageScheduler::new(layout(2, 100));
    let mut source = catalog_at_one_hz(&[("A", 60), ("B", 50), ("C", 40)]);

    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});

    assert_eq!(report.outcome, AutoFillOutcome::Completed);
    assert_eq!(report.unassigned, 0);
    assert_eq!(report.placed.len(), 3);
    assert_eq!(scheduler.total_bytes_remaining(), 50);
    assert_exact_accounting(&scheduler);
}

// ── Scenario 2: three large items, two messages ───────────────────────────────

#[test]
fn three_large_items_leave_smallest_unassigned() {
    // 60 + 60 + 50 exceeds what two 100-byte messages can split: whichever
    // message takes the 50 already holds a 60.
    let mut scheduler = MessageScheduler::new(layout(2, 100));
    let mut source = catalog_at_one_hz(&[("B", 50), ("C", 60), ("D", 60)]);

    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});

    assert_eq!(report.outcome, AutoFillOutcome::Completed);
    assert_eq!(report.unassigned, 1);
    assert!(scheduler.is_assigned(&full("C")));
    assert!(scheduler.is_assigned(&full("D")));
    assert!(!scheduler.is_assigned(&full("B")));
    assert_eq!(
        report.status.as_deref(),
        Some("Auto-fill unable to assign 1 variables")
    );
    assert_eq!(source.items_at_rate("1").len(), 1, "B stays available");
}

// ── Scenario 3: oversized link ────────────────────────────────────────────────

#[test]
fn linked_group_is_placed_whole_or_not_at_all() {
    let mut scheduler = MessageScheduler::new(layout(2, 50));
    let mut source = ItemCatalog::new();
    source.push("1", make_item("A", 30, 1.0).with_link("L1"));
    source.push("1", make_item("B", 30, 1.0).with_link("L1"));

    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});

    assert_eq!(report.unassigned, 2);
    assert!(!scheduler.is_assigned(&full("A")));
    assert!(!scheduler.is_assigned(&full("B")));
    assert_eq!(scheduler.total_bytes_remaining(), 100);
}

#[test]
fn fitting_link_shares_one_message() {
    let mut scheduler = MessageScheduler::new(layout(2, 100));
    let mut source = ItemCatalog::new();
    source.push("1", make_item("A", 30, 1.0).with_link("L1"));
    source.push("1", make_item("X", 45, 1.0));
    source.push("1", make_item("B", 30, 1.0).with_link("L1"));

    autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});

    let a = &scheduler.item(&full("A")).unwrap().message_indices;
    let b = &scheduler.item(&full("B")).unwrap().message_indices;
    assert_eq!(a, b);
    assert_exact_accounting(&scheduler);
}

// ── Scenario 4: cancellation after the first rate ─────────────────────────────

#[test]
fn cancel_after_first_rate_keeps_its_placements() {
    let mut scheduler = MessageScheduler::new(layout(4, 100));
    let mut source = ItemCatalog::new();
    for n in 0..5 {
        source.push("1", make_item(&format!("slow{n}"), 4, 1.0));
    }
    for n in 0..5 {
        source.push("2", make_item(&format!("fast{n}"), 4, 2.0));
    }

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let report = autofill::run(&mut scheduler, &mut source, &cancel, |event| {
        if let Progress::RateFinished { .. } = event {
            trigger.cancel();
        }
    });

    assert_eq!(report.outcome, AutoFillOutcome::Cancelled);
    assert_eq!(report.status.as_deref(), Some("Auto-fill terminated by user"));
    assert_eq!(report.total, 10);
    assert_eq!(report.placed.len(), 5);
    for n in 0..5 {
        assert!(scheduler.is_assigned(&full(&format!("slow{n}"))));
        assert!(!scheduler.is_assigned(&full(&format!("fast{n}"))));
    }
    assert!(source.items_at_rate("1").is_empty());
    assert_eq!(source.items_at_rate("2").len(), 5);
}

// ── Scenario 5: sub-message id synchronisation ────────────────────────────────

#[test]
fn default_sub_message_follows_parent_id() {
    let mut scheduler = MessageScheduler::new(layout(1, 100));
    scheduler.add_sub_message(0, "").unwrap();
    scheduler.set_message_id(0, None, "100");

    let arena = scheduler.messages();
    let parent = arena.parent_at(0).unwrap();
    let default = arena.sub_message(parent, 0).unwrap();
    let other = arena.sub_message(parent, 1).unwrap();
    assert_eq!(arena.get(default).unwrap().id(), "100");

    scheduler.set_message_id(0, None, "200");
    let arena = scheduler.messages();
    assert_eq!(arena.get(parent).unwrap().id(), "200");
    assert_eq!(arena.get(default).unwrap().id(), "200");
    assert_eq!(arena.get(other).unwrap().id(), "");
}

// ── Invariants and boundaries ─────────────────────────────────────────────────

#[test]
fn identical_inputs_give_identical_schedules() {
    let items = [("a", 30), ("b", 30), ("c", 20), ("d", 20), ("e", 70), ("f", 10)];

    let run_once = || {
        let mut scheduler = MessageScheduler::new(layout(3, 80));
        let mut source = catalog_at_one_hz(&items);
        let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});
        (scheduler.to_stored(), report.unassigned)
    };

    assert_eq!(run_once(), run_once());
}

#[test]
fn second_run_reports_already_assigned() {
    let mut scheduler = MessageScheduler::new(layout(2, 100));
    let mut source = catalog_at_one_hz(&[("a", 10)]);
    autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});
    let snapshot = scheduler.to_stored();

    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});
    assert_eq!(report.outcome, AutoFillOutcome::AlreadyAssigned);
    assert_eq!(
        report.status.as_deref(),
        Some("All variables with a rate are already assigned")
    );
    assert_eq!(scheduler.to_stored(), snapshot);
}

#[test]
fn exact_fit_fills_message() {
    let mut scheduler = MessageScheduler::new(layout(1, 100));
    let mut source = catalog_at_one_hz(&[("a", 100)]);
    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});
    assert_eq!(report.unassigned, 0);
    assert_eq!(scheduler.bytes_remaining(0), Some(0));
}

#[test]
fn oversized_item_is_skipped_and_rest_placed() {
    let mut scheduler = MessageScheduler::new(layout(2, 100));
    let mut source = catalog_at_one_hz(&[("huge", 101), ("a", 10), ("b", 10)]);
    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});
    assert_eq!(report.unassigned, 1);
    assert_eq!(report.placed.len(), 2);
}

#[test]
fn removing_everything_restores_capacity() {
    let mut scheduler = MessageScheduler::new(layout(4, 100));
    let mut source = ItemCatalog::new();
    source.push("1", make_item("a", 25, 1.0));
    source.push("2", make_item("b", 15, 2.0));
    source.push("4", make_item("c", 5, 4.0));
    let before = scheduler.to_stored();

    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});
    assert_eq!(report.unassigned, 0);
    assert_exact_accounting(&scheduler);

    let removed = scheduler.remove(&report.placed);
    assert_eq!(removed.len(), 3);
    source.include(&report.placed);
    assert_eq!(scheduler.to_stored(), before);
    assert_eq!(scheduler.total_bytes_remaining(), 400);
    assert_eq!(source.available_count(), 3);
}

#[test]
fn applications_fill_time_slots() {
    let app = ApplicationParameters {
        max_msgs_per_sec: 4,
        max_msgs_per_cycle: 4,
        slots_per_message: 2,
        commands_per_table: 128,
    };
    let mut scheduler = MessageScheduler::new(ScheduleLayout::application(&app));
    let mut source = ItemCatalog::new();
    for (n, run_time) in [100, 100, 100, 60, 60, 60, 60, 60, 60, 60].iter().enumerate() {
        source.push(
            "1",
            Item::application(format!("App{n}"), 1.0, *run_time, ApplicationInfo::default()),
        );
    }

    let report = autofill::run(&mut scheduler, &mut source, &CancelToken::new(), |_| {});

    // 4 slots of 250 ms hold at most two applications each
    assert_eq!(report.placed.len(), 8);
    assert_eq!(report.unassigned, 2);
    assert_eq!(
        report.status.as_deref(),
        Some("Auto-fill unable to assign 2 applications")
    );
    for &parent in scheduler.messages().parents() {
        assert!(scheduler.messages().get(parent).unwrap().variables().len() <= 2);
    }
}

// ── Background worker ─────────────────────────────────────────────────────────

#[tokio::test]
async fn background_run_hands_back_schedule() {
    let scheduler = MessageScheduler::new(layout(2, 100));
    let source = catalog_at_one_hz(&[("A", 60), ("B", 50), ("C", 40)]);

    let mut handle = autofill::task::spawn(scheduler, source);
    let mut advanced = 0;
    while let Some(event) = handle.next_progress().await {
        if matches!(event, Progress::Advanced { .. }) {
            advanced += 1;
        }
    }
    let result = handle.join().await.unwrap();

    assert_eq!(advanced, 3);
    assert_eq!(result.report.unassigned, 0);
    assert_eq!(result.scheduler.total_bytes_remaining(), 50);
    assert_eq!(result.source.available_count(), 0);
}
