/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Persisted message assignments.
//!
//! The engine reads and writes assignments through the [`AssignmentStore`]
//! trait.  Placement data (`message_indices`) is never stored; it is rebuilt
//! when a schedule is restored.
//!
//! [`YamlAssignmentStore`] keeps one entry per rate name:
//! ```yaml
//! streams:
//!   "Rate 1":
//!     - name: Message_1
//!       id: "0x0801"
//!       items:
//!         - full_name: "Root,uint16.count"
//!           size: 2
//!           rate: 1.0
//!           kind: { type: telemetry, data_type: uint16 }
//!       sub_messages:
//!         - name: Message_1.0
//!           id: "0x0801"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::item::Item;

/// One message as persisted: its name, id, the items placed directly in it,
/// and its sub-messages (empty for a sub-message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_messages: Vec<StoredMessage>,
}

/// Source and sink of stored assignments, keyed by rate name.
pub trait AssignmentStore {
    /// Stored messages for `rate_name`, or `None` if nothing is stored.
    fn stored_data(&self, rate_name: &str) -> Option<Vec<StoredMessage>>;

    /// Replace the stored messages for `rate_name`.
    fn save(&mut self, rate_name: &str, messages: Vec<StoredMessage>);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    streams: BTreeMap<String, Vec<StoredMessage>>,
}

/// [`AssignmentStore`] backed by a YAML file.
///
/// [`save`](AssignmentStore::save) only updates memory;
/// [`save_to_file`](Self::save_to_file) writes everything out.
#[derive(Debug, Clone)]
pub struct YamlAssignmentStore {
    path: PathBuf,
    streams: BTreeMap<String, Vec<StoredMessage>>,
}

impl YamlAssignmentStore {
    /// Open the store at `path`.  A missing file is an empty store.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            info!("No assignment store at {}, starting empty", path.display());
            return Ok(Self {
                path,
                streams: BTreeMap::new(),
            });
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Cannot open assignment store: {}", path.display()))?;
        let file: StoreFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse assignment store: {}", path.display()))?;

        info!(
            "Loaded assignment store {} ({} stream(s))",
            path.display(),
            file.streams.len()
        );
        Ok(Self {
            path,
            streams: file.streams,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rate_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    /// Write every stream to the backing file.
    ///
    /// # Errors
    /// Returns an error if serialisation or the write fails.
    pub fn save_to_file(&self) -> Result<()> {
        let file = StoreFile {
            streams: self.streams.clone(),
        };
        let content =
            serde_yaml::to_string(&file).context("Failed to serialise assignment store")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Cannot write assignment store: {}", self.path.display()))?;
        info!("Saved assignment store to {}", self.path.display());
        Ok(())
    }
}

impl AssignmentStore for YamlAssignmentStore {
    fn stored_data(&self, rate_name: &str) -> Option<Vec<StoredMessage>> {
        self.streams.get(rate_name).cloned()
    }

    fn save(&mut self, rate_name: &str, messages: Vec<StoredMessage>) {
        debug!(rate_name, messages = messages.len(), "Assignments stored");
        self.streams.insert(rate_name.to_string(), messages);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataTypeTable;
    use crate::scheduler::{MessageScheduler, ScheduleLayout, SchedulerKind, SlotOption};
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn layout() -> ScheduleLayout {
        ScheduleLayout {
            kind: SchedulerKind::Telemetry,
            rate_name: "Rate 1".into(),
            total_messages: 2,
            message_capacity: 100,
            period_secs: 1.0,
        }
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = YamlAssignmentStore::load(dir.path().join("none.yaml")).unwrap();
        assert!(store.stored_data("Rate 1").is_none());
        assert_eq!(store.rate_names().count(), 0);
    }

    #[test]
    fn malformed_file_is_error() {
        let f = yaml_tempfile("streams: [not, a, map");
        assert!(YamlAssignmentStore::load(f.path()).is_err());
    }

    #[test]
    fn load_parses_hand_written_yaml() {
        let yaml = r#"
streams:
  "Rate 1":
    - name: Message_1
      id: "0x10"
      items:
        - full_name: "Root,uint16.count"
          size: 2
          rate: 1.0
          kind: { type: telemetry, data_type: uint16 }
      sub_messages:
        - name: Message_1.0
          id: "0x10"
    - name: Message_2
"#;
        let f = yaml_tempfile(yaml);
        let store = YamlAssignmentStore::load(f.path()).unwrap();
        let stored = store.stored_data("Rate 1").unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].items[0].size, 2);

        let scheduler = MessageScheduler::from_stored(layout(), Some(stored));
        assert!(scheduler.is_assigned("Root,uint16.count"));
        assert_eq!(scheduler.bytes_remaining(0), Some(98));
        assert_eq!(scheduler.bytes_remaining(1), Some(100));
    }

    #[test]
    fn saved_schedule_survives_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yaml");

        let mut scheduler = MessageScheduler::new(layout());
        let item = crate::item::Item::telemetry("Root,double.temp", 2.0, &DataTypeTable::primitives())
            .unwrap();
        let option: SlotOption = "Message_1, Message_2".parse().unwrap();
        scheduler.place(vec![item], &option).unwrap();

        let mut store = YamlAssignmentStore::load(&path).unwrap();
        store.save("Rate 1", scheduler.to_stored());
        store.save_to_file().unwrap();

        let reopened = YamlAssignmentStore::load(&path).unwrap();
        let restored = MessageScheduler::from_stored(layout(), reopened.stored_data("Rate 1"));
        assert_eq!(restored.to_stored(), scheduler.to_stored());
        assert_eq!(restored.total_bytes_remaining(), 184);
    }
}
