/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Greedy batch placement.
//!
//! [`run`] places every unassigned item of every rate in use.  Per rate the
//! candidates are sorted largest-first (stable, so equal sizes keep tree
//! order); the head of the list is expanded to its associated group, the
//! group is placed into the best-fitting option or counted unassigned, and
//! the whole group leaves the working list either way.
//!
//! Cancellation is cooperative: the token is polled before each rate and
//! before each group.  Placements made before cancellation are kept.
//!
//! [`task::spawn`] runs the same loop on a blocking worker thread.

pub mod task;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::item::Item;
use crate::rate::{parse_rate, rates_match};
use crate::scheduler::{associate, MessageScheduler};
use crate::source::ItemSource;

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Shared cancellation flag.  Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ── Report ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoFillOutcome {
    /// Nothing needed placing; no mutation was made.
    AlreadyAssigned,
    Completed,
    /// Stopped by the cancellation token; earlier placements are kept.
    Cancelled,
}

/// Summary of one auto-fill run.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoFillReport {
    pub outcome: AutoFillOutcome,
    /// Unassigned items across all rates when the run started.
    pub total: usize,
    /// Items taken off a working list (placed or not).
    pub processed: usize,
    /// Names of the items placed by this run.
    pub placed: Vec<String>,
    /// Items that found no option with room.
    pub unassigned: usize,
    /// User-facing summary; `None` on a clean completion.
    pub status: Option<String>,
}

/// Progress events, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started { total: usize },
    RateStarted { rate: String, items: usize },
    Advanced { processed: usize, total: usize },
    RateFinished { rate: String, unassigned: usize },
}

// ── Driver ────────────────────────────────────────────────────────────────────

fn unassigned_at<S: ItemSource + ?Sized>(
    scheduler: &MessageScheduler,
    source: &S,
    rate: &str,
) -> Vec<Item> {
    source
        .items_at_rate(rate)
        .into_iter()
        .filter(|i| !scheduler.is_assigned(&i.full_name))
        .collect()
}

/// Parsed rates in use, first spelling kept.  Keys that fail to parse or
/// name an already listed rate are dropped.
fn distinct_rates<S: ItemSource + ?Sized>(source: &S) -> Vec<(String, f64)> {
    let mut rates: Vec<(String, f64)> = Vec::new();
    for key in source.rates_in_use() {
        match parse_rate(&key) {
            Ok(rate) if rates.iter().any(|&(_, r)| rates_match(r, rate)) => {
                debug!(rate = %key, "Auto-fill skipping duplicate rate key");
            }
            Ok(rate) => rates.push((key, rate)),
            Err(e) => warn!(rate = %key, "Auto-fill skipping rate: {e}"),
        }
    }
    rates
}

/// Place every unassigned item of `source` into `scheduler`.
///
/// Placed items are excluded from `source` when the run ends, including
/// after cancellation.
pub fn run<S, F>(
    scheduler: &mut MessageScheduler,
    source: &mut S,
    cancel: &CancelToken,
    mut progress: F,
) -> AutoFillReport
where
    S: ItemSource + ?Sized,
    F: FnMut(Progress),
{
    let plural = scheduler.kind().class().plural();
    let rates = distinct_rates(source);
    let total: usize = rates
        .iter()
        .map(|(key, _)| unassigned_at(scheduler, source, key).len())
        .sum();

    if total == 0 {
        info!(rate_name = %scheduler.rate_name(), "Auto-fill: nothing to assign");
        return AutoFillReport {
            outcome: AutoFillOutcome::AlreadyAssigned,
            total: 0,
            processed: 0,
            placed: Vec::new(),
            unassigned: 0,
            status: Some(format!("All {plural} with a rate are already assigned")),
        };
    }

    info!(
        rate_name = %scheduler.rate_name(),
        total,
        rates = rates.len(),
        "Auto-fill started"
    );
    progress(Progress::Started { total });

    let mut placed: Vec<String> = Vec::new();
    let mut processed = 0usize;
    let mut unassigned = 0usize;
    let mut cancelled = false;

    'rates: for (rate_key, rate) in &rates {
        let rate = *rate;
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let mut working = unassigned_at(scheduler, source, rate_key);
        working.sort_by(|a, b| b.size.cmp(&a.size));

        debug!(rate = %rate_key, items = working.len(), "Auto-fill rate started");
        progress(Progress::RateStarted {
            rate: rate_key.clone(),
            items: working.len(),
        });

        let mut rate_unassigned = 0usize;
        while !working.is_empty() {
            if cancel.is_cancelled() {
                unassigned += rate_unassigned;
                cancelled = true;
                break 'rates;
            }

            let Some(group) = associate::collect(&working) else { break };
            let names = group.names();
            working.retain(|i| !names.contains(&i.full_name));

            let count = group.len();
            match scheduler.best_fit(rate, group.total_size, count) {
                Some(option) => match scheduler.place(group.members, &option) {
                    Ok(done) => placed.extend(done),
                    Err(e) => {
                        warn!(option = %option, "Auto-fill placement failed: {e}");
                        rate_unassigned += count;
                    }
                },
                None => {
                    debug!(
                        rate = %rate_key,
                        size = group.total_size,
                        items = ?names,
                        "No option with room"
                    );
                    rate_unassigned += count;
                }
            }

            processed += count;
            progress(Progress::Advanced { processed, total });
        }

        unassigned += rate_unassigned;
        info!(rate = %rate_key, unassigned = rate_unassigned, "Auto-fill rate finished");
        progress(Progress::RateFinished {
            rate: rate_key.clone(),
            unassigned: rate_unassigned,
        });
    }

    source.exclude(&placed);

    let (outcome, status) = if cancelled {
        warn!(placed = placed.len(), processed, total, "Auto-fill cancelled");
        (
            AutoFillOutcome::Cancelled,
            Some("Auto-fill terminated by user".to_string()),
        )
    } else if unassigned > 0 {
        warn!(unassigned, "Auto-fill finished with unassigned {plural}");
        (
            AutoFillOutcome::Completed,
            Some(format!("Auto-fill unable to assign {unassigned} {plural}")),
        )
    } else {
        info!(placed = placed.len(), "Auto-fill finished");
        (AutoFillOutcome::Completed, None)
    };

    AutoFillReport {
        outcome,
        total,
        processed,
        placed,
        unassigned,
        status,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
