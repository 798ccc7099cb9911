/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Structured error types for the allocation engine.
//!
//! Capacity failures are ordinary outcomes in this domain: auto-fill turns
//! them into an unassigned count and the interactive layer turns them into a
//! warning.  The variants therefore carry what the caller needs to word that
//! warning (item class, required and available room) rather than free text.
//!
//! | Variant | Typical caller reaction |
//! |---|---|
//! | `NoRoom` | warn the user, leave the items unassigned |
//! | `InvalidOption` / `RateMismatch` | refresh the option list |
//! | `AlreadyAssigned` / `EmptySelection` | refresh the selection |
//! | `SubMessagesUnsupported` | disable the sub-message controls |

use std::fmt;

use thiserror::Error;

// ── Item class ────────────────────────────────────────────────────────────────

/// Which kind of schedule produced an error; selects the user-facing wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    Variable,
    Application,
}

impl ItemClass {
    /// Plural noun used in summaries ("variables", "applications").
    pub fn plural(self) -> &'static str {
        match self {
            ItemClass::Variable => "variables",
            ItemClass::Application => "applications",
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemClass::Variable => write!(f, "variable to a message"),
            ItemClass::Application => write!(f, "application to a time slot"),
        }
    }
}

// ── Scheduler errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    /// No option (or not the requested one) has room for the items.
    ///
    /// `available` is the limiting room of the best candidate, or `None` when
    /// no candidate existed at all.
    #[error("Cannot assign {class}")]
    NoRoom {
        class: ItemClass,
        required: i64,
        available: Option<i64>,
    },

    /// The option descriptor does not name a target valid for the items' rate.
    #[error("'{0}' is not a valid option for this rate")]
    InvalidOption(String),

    /// The selected items do not all share one rate.
    #[error("item '{item}' has rate {rate}, expected {expected}")]
    RateMismatch {
        item: String,
        rate: f64,
        expected: f64,
    },

    /// The item is already placed; remove it first.
    #[error("item '{0}' is already assigned")]
    AlreadyAssigned(String),

    /// A placement was requested with no items.
    #[error("no items selected")]
    EmptySelection,

    /// Application time slots have no sub-messages.
    #[error("time slots do not support sub-messages")]
    SubMessagesUnsupported,
}
