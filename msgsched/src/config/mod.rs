//! Rate, application and data-type parameter loading.
//!
//! One [`RateInformation`] exists per telemetry stream.  Together with the
//! global [`RateParameters`] it fixes how many messages a stream's cycle holds
//! and how many bytes each message may carry.  [`ApplicationParameters`] do
//! the same for the application time-slot schedule.
//!
//! The expected YAML structure is:
//! ```yaml
//! rate_parameters:
//!   max_sec_per_msg: 3
//!   max_msgs_per_sec: 4
//!   include_uneven: false
//! streams:
//!   - rate_name: "Rate 1"
//!     stream_name: "Housekeeping"
//!     max_msgs_per_cycle: 4
//!     max_bytes_per_sec: 400
//! application:
//!   max_msgs_per_sec: 10
//!   max_msgs_per_cycle: 10
//!   slots_per_message: 1
//!   commands_per_table: 128
//! data_types:
//!   uint8: { size: 1 }
//!   char:  { size: 1, string: true }
//! ```

pub mod data_types;

pub use data_types::{DataTypeInfo, DataTypeTable};

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::rate::calculate_sample_rates;

// ── Defaults ──────────────────────────────────────────────────────────────────

const DEFAULT_MAX_MSGS_PER_CYCLE: u32 = 1;
const DEFAULT_MAX_BYTES_PER_SEC: u32 = 56_000;
const DEFAULT_MAX_SEC_PER_MSG: u32 = 1;
const DEFAULT_MAX_MSGS_PER_SEC: u32 = 1;

const DEFAULT_APP_MAX_MSGS_PER_SEC: u32 = 10;
const DEFAULT_APP_MAX_MSGS_PER_CYCLE: u32 = 10;
const DEFAULT_APP_SLOTS_PER_MESSAGE: u32 = 1;
const DEFAULT_APP_COMMANDS_PER_TABLE: u32 = 128;

/// Rate name used for the fallback stream.
pub const DEFAULT_RATE_NAME: &str = "Rate 1";

// ── Private YAML deserialization types ────────────────────────────────────────

/// Top-level wrapper that maps directly onto the YAML file layout.
///
/// Numeric fields are read as signed values so that zero or negative entries
/// can be reported and replaced instead of failing the whole parse.
#[derive(Debug, Deserialize)]
struct SchedulerConfigFile {
    #[serde(default)]
    rate_parameters: Option<RateParametersEntry>,
    #[serde(default)]
    streams: Vec<StreamEntry>,
    #[serde(default)]
    application: Option<ApplicationEntry>,
    #[serde(default)]
    data_types: Option<BTreeMap<String, DataTypeEntry>>,
}

#[derive(Debug, Deserialize)]
struct RateParametersEntry {
    max_sec_per_msg: Option<i64>,
    max_msgs_per_sec: Option<i64>,
    #[serde(default)]
    include_uneven: bool,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    rate_name: String,
    stream_name: Option<String>,
    max_msgs_per_cycle: Option<i64>,
    max_bytes_per_sec: Option<i64>,
    sample_rates: Option<Vec<String>>,
    #[serde(default)]
    num_shared_table_types: u32,
}

#[derive(Debug, Deserialize)]
struct ApplicationEntry {
    max_msgs_per_sec: Option<i64>,
    max_msgs_per_cycle: Option<i64>,
    slots_per_message: Option<i64>,
    commands_per_table: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DataTypeEntry {
    size: u32,
    #[serde(default)]
    string: bool,
}

/// Accept a strictly positive value, otherwise fall back to `default` and
/// warn when the field was present but invalid.
fn positive_or(value: Option<i64>, default: u32, field: &str) -> u32 {
    match value {
        None => default,
        Some(v) if v > 0 && v <= u32::MAX as i64 => v as u32,
        Some(v) => {
            warn!(field, value = v, default, "Invalid parameter value, using default");
            default
        }
    }
}

// ── Public data structures ────────────────────────────────────────────────────

/// Parameters shared by every telemetry stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateParameters {
    /// Longest allowed gap, in seconds, between two copies of one message.
    pub max_sec_per_msg: u32,
    /// Messages that can be downlinked in one second.
    pub max_msgs_per_sec: u32,
    /// Include sample rates that are not evenly time-spaced.
    pub include_uneven: bool,
}

impl Default for RateParameters {
    fn default() -> Self {
        Self {
            max_sec_per_msg: DEFAULT_MAX_SEC_PER_MSG,
            max_msgs_per_sec: DEFAULT_MAX_MSGS_PER_SEC,
            include_uneven: false,
        }
    }
}

/// Per-stream rate configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RateInformation {
    /// Rate column name; the key used by the item catalogue and the store.
    pub rate_name: String,
    pub stream_name: String,
    /// Number of messages in one cycle.  Always `>= 1`.
    pub max_msgs_per_cycle: u32,
    pub max_bytes_per_sec: u32,
    /// Legal sample rates, highest first.
    pub sample_rates: Vec<String>,
    pub num_shared_table_types: u32,
}

impl RateInformation {
    /// A stream carrying the default parameters.
    pub fn new(rate_name: impl Into<String>) -> Self {
        let rate_name = rate_name.into();
        Self {
            stream_name: rate_name.clone(),
            rate_name,
            max_msgs_per_cycle: DEFAULT_MAX_MSGS_PER_CYCLE,
            max_bytes_per_sec: DEFAULT_MAX_BYTES_PER_SEC,
            sample_rates: vec!["1".to_string()],
            num_shared_table_types: 0,
        }
    }

    /// Byte budget of one message in the cycle.
    pub fn message_capacity(&self) -> i64 {
        (self.max_bytes_per_sec / self.max_msgs_per_cycle.max(1)) as i64
    }

    /// Seconds per cycle given the global message rate.
    pub fn period_secs(&self, max_msgs_per_sec: u32) -> f64 {
        self.max_msgs_per_cycle as f64 / max_msgs_per_sec.max(1) as f64
    }
}

/// Application time-slot parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationParameters {
    pub max_msgs_per_sec: u32,
    /// Number of time slots in one cycle.
    pub max_msgs_per_cycle: u32,
    /// Most applications one time slot may hold.
    pub slots_per_message: u32,
    pub commands_per_table: u32,
}

impl Default for ApplicationParameters {
    fn default() -> Self {
        Self {
            max_msgs_per_sec: DEFAULT_APP_MAX_MSGS_PER_SEC,
            max_msgs_per_cycle: DEFAULT_APP_MAX_MSGS_PER_CYCLE,
            slots_per_message: DEFAULT_APP_SLOTS_PER_MESSAGE,
            commands_per_table: DEFAULT_APP_COMMANDS_PER_TABLE,
        }
    }
}

impl ApplicationParameters {
    /// Seconds per application cycle.
    pub fn period_secs(&self) -> f64 {
        self.max_msgs_per_cycle as f64 / self.max_msgs_per_sec.max(1) as f64
    }

    /// Milliseconds of run time available in one time slot: the cycle's
    /// total milliseconds over the messages sent per second.
    pub fn time_slot_capacity_ms(&self) -> i64 {
        let total_ms = (self.period_secs() * 1000.0) as i64;
        total_ms / self.max_msgs_per_sec.max(1) as i64
    }

    /// Legal application rates: every even split of the cycle.
    pub fn sample_rates(&self) -> Vec<String> {
        calculate_sample_rates(1, self.max_msgs_per_sec, self.max_msgs_per_cycle, false)
    }
}

// ── SchedulerConfigManager ────────────────────────────────────────────────────

/// Loads and holds all scheduler parameters.
#[derive(Debug, Clone)]
pub struct SchedulerConfigManager {
    rate_parameters: RateParameters,
    streams: Vec<RateInformation>,
    application: ApplicationParameters,
    data_types: DataTypeTable,

    /// Set to `true` after a successful [`load_from_file`](Self::load_from_file).
    loaded: bool,
}

impl Default for SchedulerConfigManager {
    fn default() -> Self {
        Self {
            rate_parameters: RateParameters::default(),
            streams: vec![RateInformation::new(DEFAULT_RATE_NAME)],
            application: ApplicationParameters::default(),
            data_types: DataTypeTable::primitives(),
            loaded: false,
        }
    }
}

impl SchedulerConfigManager {
    /// Creates a manager holding the default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and replaces every previously loaded value.
    ///
    /// * A stream without `sample_rates` gets the calculated list.
    /// * An empty `streams` list yields one default stream.
    /// * A missing `data_types` section keeps the primitive table.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or if the YAML is
    /// structurally invalid.  On error the manager is left unloaded with
    /// default values.
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading scheduler configuration from: {}", path.display());

        *self = Self::default();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: SchedulerConfigFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        if let Some(entry) = file.rate_parameters {
            self.rate_parameters = RateParameters {
                max_sec_per_msg: positive_or(
                    entry.max_sec_per_msg,
                    DEFAULT_MAX_SEC_PER_MSG,
                    "max_sec_per_msg",
                ),
                max_msgs_per_sec: positive_or(
                    entry.max_msgs_per_sec,
                    DEFAULT_MAX_MSGS_PER_SEC,
                    "max_msgs_per_sec",
                ),
                include_uneven: entry.include_uneven,
            };
        }

        if let Some(entry) = file.application {
            self.application = ApplicationParameters {
                max_msgs_per_sec: positive_or(
                    entry.max_msgs_per_sec,
                    DEFAULT_APP_MAX_MSGS_PER_SEC,
                    "application.max_msgs_per_sec",
                ),
                max_msgs_per_cycle: positive_or(
                    entry.max_msgs_per_cycle,
                    DEFAULT_APP_MAX_MSGS_PER_CYCLE,
                    "application.max_msgs_per_cycle",
                ),
                slots_per_message: positive_or(
                    entry.slots_per_message,
                    DEFAULT_APP_SLOTS_PER_MESSAGE,
                    "application.slots_per_message",
                ),
                commands_per_table: positive_or(
                    entry.commands_per_table,
                    DEFAULT_APP_COMMANDS_PER_TABLE,
                    "application.commands_per_table",
                ),
            };
        }

        if let Some(types) = file.data_types {
            let mut table = DataTypeTable::empty();
            for (name, entry) in types {
                debug!("  Data type: {} | size: {} | string: {}", name, entry.size, entry.string);
                table.insert(name, entry.size, entry.string);
            }
            self.data_types = table;
        }

        self.streams.clear();
        for entry in file.streams {
            let max_msgs_per_cycle = positive_or(
                entry.max_msgs_per_cycle,
                DEFAULT_MAX_MSGS_PER_CYCLE,
                "max_msgs_per_cycle",
            );
            let sample_rates = entry.sample_rates.unwrap_or_else(|| {
                calculate_sample_rates(
                    self.rate_parameters.max_sec_per_msg,
                    self.rate_parameters.max_msgs_per_sec,
                    max_msgs_per_cycle,
                    self.rate_parameters.include_uneven,
                )
            });

            let info = RateInformation {
                stream_name: entry
                    .stream_name
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| entry.rate_name.clone()),
                rate_name: entry.rate_name,
                max_msgs_per_cycle,
                max_bytes_per_sec: positive_or(
                    entry.max_bytes_per_sec,
                    DEFAULT_MAX_BYTES_PER_SEC,
                    "max_bytes_per_sec",
                ),
                sample_rates,
                num_shared_table_types: entry.num_shared_table_types,
            };

            debug!(
                "  Stream: {} ({}) | msgs/cycle: {} | bytes/sec: {} | rates: {:?}",
                info.rate_name,
                info.stream_name,
                info.max_msgs_per_cycle,
                info.max_bytes_per_sec,
                info.sample_rates,
            );

            if self.stream(&info.rate_name).is_some() {
                warn!(rate_name = %info.rate_name, "Duplicate stream entry ignored");
                continue;
            }
            self.streams.push(info);
        }

        // Fallback: no streams parsed → a single default stream
        if self.streams.is_empty() {
            warn!("No streams found in configuration file, using default stream");
            self.streams.push(RateInformation::new(DEFAULT_RATE_NAME));
        }

        self.loaded = true;

        info!(
            streams = self.streams.len(),
            data_types = self.data_types.len(),
            max_msgs_per_sec = self.rate_parameters.max_msgs_per_sec,
            "Successfully loaded scheduler configuration"
        );

        Ok(())
    }

    pub fn rate_parameters(&self) -> &RateParameters {
        &self.rate_parameters
    }

    /// All streams in file order.
    pub fn streams(&self) -> &[RateInformation] {
        &self.streams
    }

    /// The stream with the given rate name, if configured.
    pub fn stream(&self, rate_name: &str) -> Option<&RateInformation> {
        self.streams.iter().find(|s| s.rate_name == rate_name)
    }

    pub fn application(&self) -> &ApplicationParameters {
        &self.application
    }

    pub fn data_types(&self) -> &DataTypeTable {
        &self.data_types
    }

    /// Returns `true` after a successful call to [`load_from_file`](Self::load_from_file).
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SizeResolver;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper: write a YAML string to a temp file and return it.
    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn default_stream_has_expected_values() {
        let info = RateInformation::new("Rate 1");
        assert_eq!(info.stream_name, "Rate 1");
        assert_eq!(info.max_msgs_per_cycle, 1);
        assert_eq!(info.max_bytes_per_sec, 56_000);
        assert_eq!(info.sample_rates, vec!["1"]);
        assert_eq!(info.message_capacity(), 56_000);
    }

    #[test]
    fn default_application_parameters() {
        let app = ApplicationParameters::default();
        assert_eq!(app.max_msgs_per_sec, 10);
        assert_eq!(app.max_msgs_per_cycle, 10);
        assert_eq!(app.slots_per_message, 1);
        assert_eq!(app.commands_per_table, 128);
        // 1 s cycle split over 10 slots
        assert_eq!(app.time_slot_capacity_ms(), 100);
    }

    #[test]
    fn new_manager_is_not_loaded_but_usable() {
        let mgr = SchedulerConfigManager::new();
        assert!(!mgr.is_loaded());
        assert!(mgr.stream(DEFAULT_RATE_NAME).is_some());
        assert_eq!(mgr.data_types().size_of("uint32_t"), Some(4));
    }

    // ── load_from_file ────────────────────────────────────────────────────────

    #[test]
    fn load_full_yaml() {
        let yaml = r#"
rate_parameters:
  max_sec_per_msg: 3
  max_msgs_per_sec: 4
streams:
  - rate_name: "Rate 1"
    stream_name: "Housekeeping"
    max_msgs_per_cycle: 4
    max_bytes_per_sec: 400
  - rate_name: "Rate 2"
    max_msgs_per_cycle: 2
    max_bytes_per_sec: 100
    sample_rates: ["1", "1/2"]
application:
  max_msgs_per_sec: 4
  max_msgs_per_cycle: 8
  slots_per_message: 3
data_types:
  u8: { size: 1 }
  text: { size: 1, string: true }
"#;
        let f = yaml_tempfile(yaml);
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        assert!(mgr.is_loaded());
        assert_eq!(mgr.streams().len(), 2);

        let s1 = mgr.stream("Rate 1").unwrap();
        assert_eq!(s1.stream_name, "Housekeeping");
        assert_eq!(s1.message_capacity(), 100);
        assert_eq!(s1.sample_rates, vec!["4", "2", "1", "1/2", "1/3"]);
        assert_eq!(s1.period_secs(mgr.rate_parameters().max_msgs_per_sec), 1.0);

        let s2 = mgr.stream("Rate 2").unwrap();
        assert_eq!(s2.stream_name, "Rate 2"); // falls back to rate name
        assert_eq!(s2.sample_rates, vec!["1", "1/2"]);

        let app = mgr.application();
        assert_eq!(app.slots_per_message, 3);
        assert_eq!(app.commands_per_table, 128);
        // 2000 ms cycle at 4 messages per second
        assert_eq!(app.time_slot_capacity_ms(), 500);

        assert_eq!(mgr.data_types().size_of("u8"), Some(1));
        assert!(mgr.data_types().is_string("text"));
        assert_eq!(mgr.data_types().size_of("double"), None);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let yaml = r#"
streams:
  - rate_name: "Rate 1"
    max_msgs_per_cycle: 0
    max_bytes_per_sec: -5
application:
  slots_per_message: 0
"#;
        let f = yaml_tempfile(yaml);
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        let s = mgr.stream("Rate 1").unwrap();
        assert_eq!(s.max_msgs_per_cycle, 1);
        assert_eq!(s.max_bytes_per_sec, 56_000);
        assert_eq!(mgr.application().slots_per_message, 1);
    }

    #[test]
    fn empty_streams_section_inserts_default_stream() {
        let f = yaml_tempfile("streams: []\n");
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        assert!(mgr.is_loaded());
        assert_eq!(mgr.streams().len(), 1);
        assert!(mgr.stream(DEFAULT_RATE_NAME).is_some());
    }

    #[test]
    fn duplicate_stream_is_ignored() {
        let yaml = r#"
streams:
  - rate_name: "A"
    max_msgs_per_cycle: 2
  - rate_name: "A"
    max_msgs_per_cycle: 5
"#;
        let f = yaml_tempfile(yaml);
        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f.path()).unwrap();

        assert_eq!(mgr.streams().len(), 1);
        assert_eq!(mgr.stream("A").unwrap().max_msgs_per_cycle, 2);
    }

    #[test]
    fn missing_file_returns_error() {
        let mut mgr = SchedulerConfigManager::new();
        let result = mgr.load_from_file(Path::new("/nonexistent/path/params.yaml"));
        assert!(result.is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        let f = yaml_tempfile("this is: not: valid: yaml: content:::");
        let mut mgr = SchedulerConfigManager::new();
        assert!(mgr.load_from_file(f.path()).is_err());
        assert!(!mgr.is_loaded());
    }

    // ── Reload ────────────────────────────────────────────────────────────────

    #[test]
    fn reload_replaces_previous_streams() {
        let f1 = yaml_tempfile("streams:\n  - rate_name: one\n");
        let f2 = yaml_tempfile("streams:\n  - rate_name: two\n");

        let mut mgr = SchedulerConfigManager::new();
        mgr.load_from_file(f1.path()).unwrap();
        assert!(mgr.stream("one").is_some());

        mgr.load_from_file(f2.path()).unwrap();
        assert!(mgr.stream("one").is_none(), "old stream must be gone");
        assert!(mgr.stream("two").is_some());
    }
}
