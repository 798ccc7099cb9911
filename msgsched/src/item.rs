/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Schedulable items: telemetry variables and application tasks.
//!
//! Both kinds share one core [`Item`] struct holding everything the
//! allocation engine reads (`size`, `rate`, `link`, `message_indices`).
//! Kind-specific data lives in [`ItemKind`] and is carried through the engine
//! untouched.
//!
//! ```text
//! catalogue ──(Item::telemetry / Item::application)──►  Item  ──(MessageScheduler)──►  message_indices
//!                  ↑ SizeResolver injected                          ↑ set on placement, cleared on removal
//! ```
//!
//! # Telemetry names
//! A telemetry item's `full_name` is its path through the structure tree,
//! comma separated, ending in `dataType.variableName`:
//!
//! ```text
//! Root,hk_tlm.packet,uint8.mode:3
//! ```
//!
//! A `:N` suffix marks an `N`-bit field.  The data type of the last segment is
//! resolved to a byte size through the injected [`SizeResolver`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::MessageId;

// ── Size resolution ───────────────────────────────────────────────────────────

/// Maps a data type name to its byte size.
///
/// Implemented by [`DataTypeTable`](crate::config::DataTypeTable); tests can
/// provide their own.
pub trait SizeResolver {
    /// Byte size of one element of `data_type`, or `None` if unknown.
    fn size_of(&self, data_type: &str) -> Option<u32>;

    /// `true` when arrays of `data_type` are character strings.
    fn is_string(&self, data_type: &str) -> bool;
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure to build an [`Item`] from catalogue data.
#[derive(Debug, Error, PartialEq)]
pub enum ItemError {
    /// The last path segment is not of the form `dataType.variableName`.
    #[error("item '{0}' is not a valid telemetry path (expected '...,dataType.name')")]
    MalformedName(String),

    /// The resolver does not know the item's data type.
    #[error("item '{item}' has unknown data type '{data_type}'")]
    UnknownDataType { item: String, data_type: String },

    /// The bit length after `:` is not a positive number or exceeds the type.
    #[error("item '{item}' has invalid bit length '{bits}'")]
    InvalidBitLength { item: String, bits: String },

    /// The item's rate could not be parsed.
    #[error("item '{item}' has invalid rate: {source}")]
    InvalidRate {
        item: String,
        source: crate::rate::RateError,
    },
}

// ── Kind-specific payloads ────────────────────────────────────────────────────

/// Telemetry variable details derived from the full name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryInfo {
    pub data_type: String,
    /// Field width for bit-packed variables.
    #[serde(default)]
    pub bit_length: Option<u32>,
    /// `true` when the data type forms character strings.
    #[serde(default)]
    pub string: bool,
}

/// Application scheduling metadata.  Opaque to the allocation engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub message_rate: String,
    #[serde(default)]
    pub wake_up_message: String,
    #[serde(default)]
    pub hk_send_rate: String,
    #[serde(default)]
    pub hk_wake_up_message: String,
    #[serde(default)]
    pub sch_group: String,
}

/// What an item is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Telemetry(TelemetryInfo),
    Application(ApplicationInfo),
}

// ── Item ──────────────────────────────────────────────────────────────────────

/// A schedulable unit.
///
/// `full_name` is the unique key.  `message_indices` is empty until the item
/// is placed and is never persisted; it is rebuilt whenever a schedule is
/// restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub full_name: String,
    /// Bytes for telemetry, milliseconds of run time for applications.
    pub size: u32,
    /// Samples per second.
    pub rate: f64,
    /// Explicit group; all members must be co-located.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Head of the bit-packed run this item shares storage with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packed_with: Option<String>,
    /// Position in the source tree; keeps message contents in tree order.
    #[serde(default)]
    pub tree_order: usize,
    #[serde(skip)]
    pub message_indices: Vec<MessageId>,
    pub kind: ItemKind,
}

impl Item {
    /// Build a telemetry item, resolving its size from the data type in the
    /// last path segment.
    pub fn telemetry(
        full_name: impl Into<String>,
        rate: f64,
        resolver: &dyn SizeResolver,
    ) -> Result<Self, ItemError> {
        let full_name = full_name.into();

        let last = full_name.rsplit(',').next().unwrap_or_default();
        let (data_type, variable) = match last.split_once('.') {
            Some((t, v)) if !t.is_empty() && !v.is_empty() => (t, v),
            _ => return Err(ItemError::MalformedName(full_name)),
        };

        let size = resolver
            .size_of(data_type)
            .ok_or_else(|| ItemError::UnknownDataType {
                item: full_name.clone(),
                data_type: data_type.to_string(),
            })?;

        let bit_length = match variable.split_once(':') {
            None => None,
            Some((_, bits)) => match bits.parse::<u32>() {
                Ok(b) if b > 0 && b <= size * 8 => Some(b),
                _ => {
                    return Err(ItemError::InvalidBitLength {
                        item: full_name.clone(),
                        bits: bits.to_string(),
                    })
                }
            },
        };

        let info = TelemetryInfo {
            data_type: data_type.to_string(),
            bit_length,
            string: resolver.is_string(data_type),
        };

        Ok(Self {
            full_name,
            size,
            rate,
            link: None,
            packed_with: None,
            tree_order: 0,
            message_indices: Vec::new(),
            kind: ItemKind::Telemetry(info),
        })
    }

    /// Build an application item whose size is its run time.
    pub fn application(
        name: impl Into<String>,
        rate: f64,
        run_time: u32,
        info: ApplicationInfo,
    ) -> Self {
        Self {
            full_name: name.into(),
            size: run_time,
            rate,
            link: None,
            packed_with: None,
            tree_order: 0,
            message_indices: Vec::new(),
            kind: ItemKind::Application(info),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_tree_order(mut self, tree_order: usize) -> Self {
        self.tree_order = tree_order;
        self
    }

    pub fn name(&self) -> &str {
        &self.full_name
    }

    /// Bytes this item actually consumes in a message.  Followers in a
    /// bit-packed run share the head's storage and consume nothing.
    pub fn footprint(&self) -> u32 {
        if self.packed_with.is_some() {
            0
        } else {
            self.size
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.message_indices.is_empty()
    }

    pub fn telemetry_info(&self) -> Option<&TelemetryInfo> {
        match &self.kind {
            ItemKind::Telemetry(info) => Some(info),
            ItemKind::Application(_) => None,
        }
    }

    pub fn bit_length(&self) -> Option<u32> {
        self.telemetry_info().and_then(|t| t.bit_length)
    }

    pub fn is_bit_packed(&self) -> bool {
        self.bit_length().is_some()
    }

    /// Everything before the last path segment (the containing structure).
    pub fn parent_path(&self) -> &str {
        match self.full_name.rfind(',') {
            Some(pos) => &self.full_name[..pos],
            None => "",
        }
    }

    /// For a string element, the name with its last array index removed
    /// (`Root,char.label[2][7]` → `Root,char.label[2]`).  `None` for anything
    /// that is not an element of a string array.
    pub fn string_base(&self) -> Option<&str> {
        let info = self.telemetry_info()?;
        if !info.string || !self.full_name.ends_with(']') {
            return None;
        }
        self.full_name
            .rfind('[')
            .map(|pos| &self.full_name[..pos])
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
