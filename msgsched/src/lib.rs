/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! msgsched – telemetry message and application time-slot scheduler
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── config/      – YAML rate / application / data-type parameters
//! ├── rate/        – sample-rate parsing, formatting and enumeration
//! ├── item.rs      – schedulable items (telemetry | application)
//! ├── source.rs    – item source trait + YAML catalogue
//! ├── message.rs   – message arena (parents, sub-messages, id sync)
//! ├── scheduler/   – allocation engine, options, associated groups
//! ├── autofill/    – greedy batch placement + background worker
//! └── store/       – persisted assignments
//! ```

pub mod autofill;
pub mod config;
pub mod item;
pub mod message;
pub mod rate;
pub mod scheduler;
pub mod source;
pub mod store;
