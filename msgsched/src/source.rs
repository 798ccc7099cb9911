/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Item sources.
//!
//! An [`ItemSource`] supplies the unassigned items of each rate and tracks
//! which items are excluded because they are already placed.
//! [`ItemCatalog`] is the in-memory implementation, loaded from YAML:
//!
//! ```yaml
//! telemetry:
//!   - name: "Root,hk.pkt,uint16_t.count"
//!     rate: "1"
//!   - name: "Root,hk.pkt,double.temp"
//!     rate: "1/2"
//!     link: thermal
//! applications:
//!   - name: Navigation
//!     rate: "2"
//!     run_time: 20
//!     priority: 3
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::item::{ApplicationInfo, Item, ItemError, SizeResolver};
use crate::rate::{parse_rate, rates_match};

/// Provider of schedulable items, per rate.
pub trait ItemSource {
    /// Rate keys that have at least one item, in enumeration order.
    fn rates_in_use(&self) -> Vec<String>;

    /// Items at `rate` that are not excluded, in source-tree order.
    fn items_at_rate(&self, rate: &str) -> Vec<Item>;

    /// Mark items as assigned.
    fn exclude(&mut self, names: &[String]);

    /// Mark items as available again.
    fn include(&mut self, names: &[String]);
}

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    telemetry: Vec<TelemetryEntry>,
    #[serde(default)]
    applications: Vec<ApplicationEntry>,
}

#[derive(Debug, Deserialize)]
struct TelemetryEntry {
    name: String,
    rate: String,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApplicationEntry {
    name: String,
    rate: String,
    run_time: u32,
    #[serde(flatten)]
    info: ApplicationInfo,
}

// ── ItemCatalog ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct CatalogEntry {
    rate: String,
    item: Item,
}

/// In-memory [`ItemSource`].
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    entries: Vec<CatalogEntry>,
    excluded: BTreeSet<String>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item under the rate key `rate`.  Its tree order is its
    /// position in the catalogue.
    pub fn push(&mut self, rate: impl Into<String>, item: Item) {
        let order = self.entries.len();
        self.entries.push(CatalogEntry {
            rate: rate.into(),
            item: item.with_tree_order(order),
        });
    }

    /// Load the `telemetry` section of a catalogue file.
    ///
    /// Entries with an unknown data type, a bad bit length or an
    /// unparsable rate are skipped with a warning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load_telemetry(path: &Path, resolver: &dyn SizeResolver) -> Result<Self> {
        let file = read_catalog(path)?;
        let mut catalog = Self::new();

        for entry in file.telemetry {
            let built = parse_rate(&entry.rate)
                .map_err(|source| ItemError::InvalidRate {
                    item: entry.name.clone(),
                    source,
                })
                .and_then(|rate| Item::telemetry(entry.name.as_str(), rate, resolver));
            match built {
                Ok(item) => {
                    let item = match entry.link {
                        Some(link) => item.with_link(link),
                        None => item,
                    };
                    catalog.push(entry.rate, item);
                }
                Err(e) => warn!("Skipping telemetry item: {e}"),
            }
        }

        info!(
            "Loaded {} telemetry item(s) from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Load the `applications` section of a catalogue file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load_applications(path: &Path) -> Result<Self> {
        let file = read_catalog(path)?;
        let mut catalog = Self::new();

        for entry in file.applications {
            match parse_rate(&entry.rate) {
                Ok(rate) => {
                    let item = Item::application(entry.name, rate, entry.run_time, entry.info);
                    catalog.push(entry.rate, item);
                }
                Err(e) => warn!("Skipping application '{}': {e}", entry.name),
            }
        }

        info!(
            "Loaded {} application(s) from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name)
    }

    /// Number of items not yet excluded.
    pub fn available_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !self.excluded.contains(&e.item.full_name))
            .count()
    }
}

fn read_catalog(path: &Path) -> Result<CatalogFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot open item catalogue: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse item catalogue: {}", path.display()))
}

impl ItemSource for ItemCatalog {
    fn rates_in_use(&self) -> Vec<String> {
        // Keys spelled differently ("1/2", "0.5") name one rate
        let mut seen: Vec<f64> = Vec::new();
        let mut rates: Vec<String> = Vec::new();
        for entry in &self.entries {
            if !seen.iter().any(|&r| rates_match(r, entry.item.rate)) {
                seen.push(entry.item.rate);
                rates.push(entry.rate.clone());
            }
        }
        rates
    }

    fn items_at_rate(&self, rate: &str) -> Vec<Item> {
        let Ok(wanted) = parse_rate(rate) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|e| rates_match(e.item.rate, wanted))
            .filter(|e| !self.excluded.contains(&e.item.full_name))
            .map(|e| e.item.clone())
            .collect()
    }

    fn exclude(&mut self, names: &[String]) {
        self.excluded.extend(names.iter().cloned());
    }

    fn include(&mut self, names: &[String]) {
        for name in names {
            self.excluded.remove(name);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
