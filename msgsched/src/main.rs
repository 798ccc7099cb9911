/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};

use msgsched::autofill::{self, Progress};
use msgsched::config::{SchedulerConfigManager, DEFAULT_RATE_NAME};
use msgsched::rate::parse_rate;
use msgsched::scheduler::{MessageScheduler, ScheduleLayout};
use msgsched::source::{ItemCatalog, ItemSource};
use msgsched::store::{AssignmentStore, YamlAssignmentStore};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Auto-fill a telemetry stream or the application time slots.
///
/// Example:
///   msgsched -c params.yaml -i items.yaml -r "Rate 1" -s assignments.yaml
#[derive(Debug, Parser)]
#[command(
    name = "msgsched",
    about = "Telemetry message / application time-slot scheduler",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML rate / application parameter file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Path to the YAML item catalogue.
    #[arg(short = 'i', long = "items")]
    items: PathBuf,

    /// Telemetry stream (rate name) to schedule.
    #[arg(short = 'r', long = "stream", default_value = DEFAULT_RATE_NAME)]
    stream: String,

    /// Schedule applications into time slots instead of a telemetry stream.
    #[arg(long = "applications", default_value_t = false)]
    applications: bool,

    /// Assignment store; loaded if present and written after the run.
    #[arg(short = 's', long = "store")]
    store: Option<PathBuf>,

    /// Log the placement options of every rate in use before running.
    #[arg(long = "options", default_value_t = false)]
    options: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        config       = ?cli.config,
        items        = %cli.items.display(),
        stream       = %cli.stream,
        applications = cli.applications,
        store        = ?cli.store,
        "Configuration"
    );

    // ── Load parameters ───────────────────────────────────────────────────────
    let mut config = SchedulerConfigManager::new();
    match &cli.config {
        Some(path) => {
            if let Err(e) = config.load_from_file(path) {
                error!("Failed to load scheduler configuration: {:#}", e);
                process::exit(1);
            }
        }
        None => warn!("No configuration file provided, using default parameters"),
    }

    // ── Load items ────────────────────────────────────────────────────────────
    let catalog = if cli.applications {
        ItemCatalog::load_applications(&cli.items)
    } else {
        ItemCatalog::load_telemetry(&cli.items, config.data_types())
    };
    let mut catalog = match catalog {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load item catalogue: {:#}", e);
            process::exit(1);
        }
    };

    // ── Build the schedule ────────────────────────────────────────────────────
    let layout = if cli.applications {
        ScheduleLayout::application(config.application())
    } else {
        match config.stream(&cli.stream) {
            Some(info) => ScheduleLayout::telemetry(info, config.rate_parameters()),
            None => {
                error!("Unknown stream '{}'", cli.stream);
                process::exit(1);
            }
        }
    };

    let mut store = match cli.store.as_ref().map(|p| YamlAssignmentStore::load(p)).transpose() {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to load assignment store: {:#}", e);
            process::exit(1);
        }
    };

    let stored = store
        .as_ref()
        .and_then(|s| s.stored_data(&layout.rate_name));
    let scheduler = MessageScheduler::from_stored(layout, stored);
    catalog.exclude(&scheduler.assigned_names());

    if cli.options {
        for rate_key in catalog.rates_in_use() {
            let Ok(rate) = parse_rate(&rate_key) else { continue };
            let options = scheduler.message_availability(rate);
            info!("Rate {} has {} option(s) with room:", rate_key, options.len());
            for (option, room) in options {
                info!("  [{option}]  room={room}");
            }
        }
    }

    // ── Auto-fill ─────────────────────────────────────────────────────────────
    let mut handle = autofill::task::spawn(scheduler, catalog);
    let cancel = handle.cancel_token();

    loop {
        tokio::select! {
            event = handle.next_progress() => match event {
                Some(Progress::Advanced { processed, total }) => {
                    info!(processed, total, "Auto-fill progress");
                }
                Some(Progress::RateStarted { rate, items }) => {
                    info!(rate = %rate, items, "Auto-fill rate");
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt received, cancelling auto-fill");
                cancel.cancel();
            }
        }
    }

    let result = match handle.join().await {
        Ok(result) => result,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    // ── Summary ───────────────────────────────────────────────────────────────
    let scheduler = result.scheduler;
    if let Some(status) = &result.report.status {
        info!("{status}");
    }
    for (index, &parent) in scheduler.messages().parents().iter().enumerate() {
        let Some(msg) = scheduler.messages().get(parent) else { continue };
        info!(
            "  [{name}]  items={items}  remaining={remaining}",
            name = msg.name(),
            items = scheduler.messages().all_variables(parent).len(),
            remaining = scheduler.bytes_remaining(index).unwrap_or_default(),
        );
    }

    if let Some(store) = store.as_mut() {
        if scheduler.is_changed() {
            store.save(scheduler.rate_name(), scheduler.to_stored());
            if let Err(e) = store.save_to_file() {
                error!("Failed to save assignments: {:#}", e);
                process::exit(1);
            }
        } else {
            info!("No assignment changes to save");
        }
    }
}
