/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Allocation engine.
//!
//! [`MessageScheduler`] owns one rate stream's message set and the items
//! placed in it.  It enumerates placement options for a rate, selects the
//! best option for a given size, places and removes items, and keeps every
//! message's remaining-capacity counter exact.
//!
//! # Options
//! `period = total_messages / max_msgs_per_sec` is the cycle length in
//! seconds.  An item at `rate` must appear `rate · period` times per cycle:
//!
//! | Rate | Option shape |
//! |---|---|
//! | `rate · period >= 1` | `r = round(rate · period)` whole messages spaced `total / r` apart |
//! | `rate · period < 1` | every `n`-th sub-message of a parent, `n = round(1 / (rate · period))` |
//!
//! # Capacity accounting
//! Counters are always rebuilt from item sizes after a change rather than
//! adjusted incrementally:
//!
//! ```text
//! parent.own      = capacity − Σ footprint(parent items)
//! sub.own         = capacity − Σ footprint(parent items) − Σ footprint(sub items)
//! parent.reported = min(sub.own)
//! ```
//!
//! # Example
//! ```rust,ignore
//! let layout = ScheduleLayout::telemetry(stream, config.rate_parameters());
//! let mut scheduler = MessageScheduler::new(layout);
//! if let Some(option) = scheduler.message_with_room(1.0, 24) {
//!     scheduler.place(vec![item], &option)?;
//! }
//! ```

pub mod associate;
pub mod error;
pub mod option;

pub use associate::{AssociatedGroup, GroupKind};
pub use error::{ItemClass, SchedulerError};
pub use option::SlotOption;

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::config::{ApplicationParameters, RateInformation, RateParameters};
use crate::item::Item;
use crate::message::{MessageArena, MessageId};
use crate::rate::{math::round_count, RATE_TOLERANCE};
use crate::store::StoredMessage;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Store key used for the application time-slot schedule.
pub const APPLICATION_RATE_NAME: &str = "Applications";

const MESSAGE_PREFIX: &str = "Message_";
const TIME_SLOT_PREFIX: &str = "Time Slot_";

// ── Layout ────────────────────────────────────────────────────────────────────

/// Which kind of items a schedule holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// Telemetry messages; capacity in bytes; sub-messages allowed.
    Telemetry,
    /// Application time slots; capacity in milliseconds; at most
    /// `slots_per_message` applications per slot; no sub-messages.
    Application { slots_per_message: usize },
}

impl SchedulerKind {
    pub fn class(self) -> ItemClass {
        match self {
            SchedulerKind::Telemetry => ItemClass::Variable,
            SchedulerKind::Application { .. } => ItemClass::Application,
        }
    }

    fn message_prefix(self) -> &'static str {
        match self {
            SchedulerKind::Telemetry => MESSAGE_PREFIX,
            SchedulerKind::Application { .. } => TIME_SLOT_PREFIX,
        }
    }
}

/// Fixed shape of one schedule, derived from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleLayout {
    pub kind: SchedulerKind,
    /// Store key.
    pub rate_name: String,
    pub total_messages: usize,
    /// Initial capacity of every message.
    pub message_capacity: i64,
    /// Seconds per cycle.
    pub period_secs: f64,
}

impl ScheduleLayout {
    /// Layout of a telemetry stream.
    pub fn telemetry(info: &RateInformation, params: &RateParameters) -> Self {
        Self {
            kind: SchedulerKind::Telemetry,
            rate_name: info.rate_name.clone(),
            total_messages: info.max_msgs_per_cycle.max(1) as usize,
            message_capacity: info.message_capacity(),
            period_secs: info.period_secs(params.max_msgs_per_sec),
        }
    }

    /// Layout of the application time-slot schedule.
    pub fn application(app: &ApplicationParameters) -> Self {
        Self {
            kind: SchedulerKind::Application {
                slots_per_message: app.slots_per_message.max(1) as usize,
            },
            rate_name: APPLICATION_RATE_NAME.to_string(),
            total_messages: app.max_msgs_per_cycle.max(1) as usize,
            message_capacity: app.time_slot_capacity_ms(),
            period_secs: app.period_secs(),
        }
    }
}

// ── MessageScheduler ──────────────────────────────────────────────────────────

/// Allocation engine for one schedule.
///
/// Sole mutator of its messages and of the placed items' `message_indices`.
/// Not shared between threads; ownership is moved to whichever task is
/// currently editing (see [`crate::autofill::task`]).
#[derive(Debug, Clone)]
pub struct MessageScheduler {
    layout: ScheduleLayout,
    messages: MessageArena,
    /// Placed items by full name.
    items: BTreeMap<String, Item>,
    /// Snapshot taken at construction or by [`commit`](Self::commit).
    committed: Vec<StoredMessage>,
}

impl MessageScheduler {
    /// A fresh, empty message set.
    pub fn new(layout: ScheduleLayout) -> Self {
        let mut messages = MessageArena::new();
        let prefix = layout.kind.message_prefix();
        for n in 1..=layout.total_messages {
            messages.add_parent(format!("{prefix}{n}"), "", layout.message_capacity);
        }

        info!(
            rate_name = %layout.rate_name,
            messages = layout.total_messages,
            capacity = layout.message_capacity,
            period_secs = layout.period_secs,
            "Message set created"
        );

        let mut scheduler = Self {
            layout,
            messages,
            items: BTreeMap::new(),
            committed: Vec::new(),
        };
        scheduler.commit();
        scheduler
    }

    /// Rebuild a message set from stored assignments.
    ///
    /// Falls back to a fresh set when nothing is stored or when the stored
    /// message count no longer matches the layout.
    pub fn from_stored(layout: ScheduleLayout, stored: Option<Vec<StoredMessage>>) -> Self {
        let Some(stored) = stored else {
            return Self::new(layout);
        };
        if stored.len() != layout.total_messages {
            warn!(
                rate_name = %layout.rate_name,
                stored = stored.len(),
                expected = layout.total_messages,
                "Stored message count does not match rate parameters, starting empty"
            );
            return Self::new(layout);
        }

        let mut messages = MessageArena::new();
        let mut items: BTreeMap<String, Item> = BTreeMap::new();

        for entry in &stored {
            let parent = messages.add_parent(&entry.name, &entry.id, layout.message_capacity);
            for item in &entry.items {
                Self::restore_item(&mut messages, &mut items, parent, item);
            }

            for (idx, sub) in entry.sub_messages.iter().enumerate() {
                let handle = if idx == 0 {
                    messages.sub_message(parent, 0)
                } else {
                    messages.add_new_sub_message(parent, sub.id.as_str())
                };
                let Some(handle) = handle else { continue };
                for item in &sub.items {
                    Self::restore_item(&mut messages, &mut items, handle, item);
                }
            }
        }

        let mut scheduler = Self {
            layout,
            messages,
            items,
            committed: Vec::new(),
        };
        scheduler.recalculate();
        scheduler.commit();

        info!(
            rate_name = %scheduler.layout.rate_name,
            messages = scheduler.messages.len(),
            items = scheduler.items.len(),
            "Message set restored"
        );
        scheduler
    }

    fn restore_item(
        messages: &mut MessageArena,
        items: &mut BTreeMap<String, Item>,
        handle: MessageId,
        stored: &Item,
    ) {
        if !messages.add_variable(handle, stored.full_name.as_str(), None) {
            return;
        }
        items
            .entry(stored.full_name.clone())
            .or_insert_with(|| {
                let mut item = stored.clone();
                item.message_indices.clear();
                item
            })
            .message_indices
            .push(handle);
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn layout(&self) -> &ScheduleLayout {
        &self.layout
    }

    pub fn kind(&self) -> SchedulerKind {
        self.layout.kind
    }

    pub fn rate_name(&self) -> &str {
        &self.layout.rate_name
    }

    pub fn messages(&self) -> &MessageArena {
        &self.messages
    }

    /// Remaining room of the top-level message at `index`.
    pub fn bytes_remaining(&self, index: usize) -> Option<i64> {
        self.messages
            .parent_at(index)
            .map(|p| self.messages.bytes_remaining(p))
    }

    /// Sum of the remaining room over all top-level messages.
    pub fn total_bytes_remaining(&self) -> i64 {
        self.messages
            .parents()
            .iter()
            .map(|&p| self.messages.bytes_remaining(p))
            .sum()
    }

    pub fn item(&self, name: &str) -> Option<&Item> {
        self.items.get(name)
    }

    pub fn is_assigned(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    pub fn assigned_items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn assigned_names(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }

    // ── Option enumeration ────────────────────────────────────────────────────

    /// Every placement option whose repetition pattern matches `rate`, in
    /// enumeration order.  Room is not considered.
    pub fn options(&self, rate: f64) -> Vec<SlotOption> {
        let total = self.messages.len();
        let period = self.layout.period_secs;
        if total == 0 || period <= 0.0 || !rate.is_finite() {
            return Vec::new();
        }

        let per_cycle = rate * period;

        if per_cycle >= 1.0 - RATE_TOLERANCE {
            let copies = round_count(per_cycle);
            if copies == 0 || copies > total {
                return Vec::new();
            }
            let rows = total / copies;
            (0..rows)
                .filter_map(|row| {
                    (0..copies)
                        .map(|k| {
                            self.messages
                                .parent_at(row + k * rows)
                                .and_then(|h| self.messages.get(h))
                                .map(|m| m.name().to_string())
                        })
                        .collect::<Option<Vec<_>>>()
                        .map(SlotOption::Messages)
                })
                .collect()
        } else {
            let stride = round_count(1.0 / per_cycle);
            if stride == 0 {
                return Vec::new();
            }
            let mut options = Vec::new();
            for &parent in self.messages.parents() {
                let count = self.messages.sub_message_count(parent);
                if count <= 1 || count % stride != 0 {
                    continue;
                }
                let Some(name) = self.messages.get(parent).map(|m| m.name().to_string()) else {
                    continue;
                };
                for first in 1..=stride {
                    options.push(SlotOption::SubMessages {
                        parent: name.clone(),
                        ordinals: (first..=count).step_by(stride).collect(),
                    });
                }
            }
            options
        }
    }

    /// Options for `rate` that still have room, with their limiting room.
    pub fn message_availability(&self, rate: f64) -> Vec<(SlotOption, i64)> {
        self.options(rate)
            .into_iter()
            .filter_map(|opt| {
                let targets = self.resolve(&opt)?;
                if !self.slots_available(&targets, 1) {
                    return None;
                }
                let room = self.room_of(&targets);
                (room > 0).then_some((opt, room))
            })
            .collect()
    }

    /// Message handles an option refers to, or `None` if it names anything
    /// that does not exist.
    pub fn resolve(&self, option: &SlotOption) -> Option<Vec<MessageId>> {
        let find_parent = |name: &str| {
            self.messages
                .parents()
                .iter()
                .copied()
                .find(|&p| self.messages.get(p).is_some_and(|m| m.name() == name))
        };

        let handles: Vec<MessageId> = match option {
            SlotOption::Messages(names) => names
                .iter()
                .map(|n| find_parent(n.as_str()))
                .collect::<Option<_>>()?,
            SlotOption::SubMessages { parent, ordinals } => {
                let parent = find_parent(parent.as_str())?;
                ordinals
                    .iter()
                    .map(|&n| {
                        n.checked_sub(1)
                            .and_then(|i| self.messages.sub_message(parent, i))
                    })
                    .collect::<Option<_>>()?
            }
        };

        (!handles.is_empty()).then_some(handles)
    }

    /// Limiting room of an option: the minimum over its messages.
    pub fn option_room(&self, option: &SlotOption) -> Option<i64> {
        self.resolve(option).map(|targets| self.room_of(&targets))
    }

    fn room_of(&self, targets: &[MessageId]) -> i64 {
        targets
            .iter()
            .map(|&t| self.messages.bytes_remaining(t))
            .min()
            .unwrap_or(0)
    }

    /// Application slots hold a bounded number of applications; telemetry
    /// messages are limited by bytes only.
    fn slots_available(&self, targets: &[MessageId], count: usize) -> bool {
        match self.layout.kind {
            SchedulerKind::Telemetry => true,
            SchedulerKind::Application { slots_per_message } => targets.iter().all(|&t| {
                self.messages
                    .get(t)
                    .is_some_and(|m| m.variables().len() + count <= slots_per_message)
            }),
        }
    }

    // ── Best-fit selection ────────────────────────────────────────────────────

    /// The option with the most limiting room for `count` items at `rate`.
    ///
    /// Only options with room are candidates.  The first is taken, then
    /// replaced only by an option with strictly more room, so ties go to the
    /// earliest option.
    fn best_candidate(&self, rate: f64, count: usize) -> Option<(SlotOption, i64)> {
        let mut selected: Option<(SlotOption, i64)> = None;

        for option in self.options(rate) {
            let Some(targets) = self.resolve(&option) else { continue };
            if !self.slots_available(&targets, count) {
                continue;
            }
            let room = self.room_of(&targets);
            if room <= 0 {
                continue;
            }
            match &selected {
                Some((_, best)) if room <= *best => {}
                _ => selected = Some((option, room)),
            }
        }
        selected
    }

    /// Option able to take `total_size` at `rate`, or `None` if nothing fits.
    /// A size equal to the remaining room fits.
    pub fn message_with_room(&self, rate: f64, total_size: i64) -> Option<SlotOption> {
        self.best_fit(rate, total_size, 1)
    }

    /// As [`message_with_room`](Self::message_with_room) for a group of
    /// `count` items.
    pub fn best_fit(&self, rate: f64, total_size: i64, count: usize) -> Option<SlotOption> {
        match self.best_candidate(rate, count) {
            Some((option, room)) if total_size <= room => Some(option),
            _ => None,
        }
    }

    /// Remaining room each target message would have after adding `size`;
    /// negative values mean the option would be oversubscribed.
    pub fn preview(&self, option: &SlotOption, size: i64) -> Vec<(String, i64)> {
        self.resolve(option)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| {
                self.messages
                    .get(t)
                    .map(|m| (m.name().to_string(), self.messages.bytes_remaining(t) - size))
            })
            .collect()
    }

    // ── Placement ─────────────────────────────────────────────────────────────

    /// Place `members` into every message of `option` without a room check.
    /// Members that are already assigned are skipped and left where they are.
    ///
    /// Callers obtain the option from [`best_fit`](Self::best_fit) or go
    /// through [`assign`](Self::assign).
    ///
    /// # Errors
    /// [`SchedulerError::InvalidOption`] if the option names unknown messages.
    pub fn place(&mut self, members: Vec<Item>, option: &SlotOption) -> Result<Vec<String>, SchedulerError> {
        let targets = self
            .resolve(option)
            .ok_or_else(|| SchedulerError::InvalidOption(option.to_string()))?;

        let mut names = Vec::with_capacity(members.len());
        for mut item in members {
            if self.is_assigned(&item.full_name) {
                warn!(item = %item.full_name, "Item already assigned, not placed again");
                continue;
            }
            for &target in &targets {
                let at = self.insert_position(target, item.tree_order);
                self.messages
                    .add_variable(target, item.full_name.as_str(), Some(at));
            }
            item.message_indices = targets.clone();
            names.push(item.full_name.clone());
            self.items.insert(item.full_name.clone(), item);
        }

        self.recalculate();

        debug!(
            option = %option,
            items = ?names,
            "Items placed"
        );
        Ok(names)
    }

    /// Position keeping a message's variables in tree order.
    fn insert_position(&self, target: MessageId, tree_order: usize) -> usize {
        let Some(msg) = self.messages.get(target) else { return 0 };
        msg.variables()
            .iter()
            .position(|n| self.items.get(n).is_some_and(|i| i.tree_order > tree_order))
            .unwrap_or(msg.variables().len())
    }

    /// Interactive placement of a selection into a chosen option.
    ///
    /// The selection must share one rate, be unplaced, and the option must be
    /// one the rate allows.  Bit-packed fields in the selection share storage.
    ///
    /// # Errors
    /// [`SchedulerError::NoRoom`] when the option cannot take the selection;
    /// nothing is placed in that case.
    pub fn assign(&mut self, items: Vec<Item>, option: &SlotOption) -> Result<Vec<String>, SchedulerError> {
        let (rate, members) = self.prepare_selection(items)?;

        if !self.options(rate).contains(option) {
            return Err(SchedulerError::InvalidOption(option.to_string()));
        }
        let targets = self
            .resolve(option)
            .ok_or_else(|| SchedulerError::InvalidOption(option.to_string()))?;

        let required = associate::group_size(&members);
        let available = self.room_of(&targets);
        if !self.slots_available(&targets, members.len()) || required > available {
            let err = SchedulerError::NoRoom {
                class: self.layout.kind.class(),
                required,
                available: Some(available),
            };
            warn!(option = %option, required, available, "{err}");
            return Err(err);
        }

        self.place(members, option)
    }

    /// Interactive placement into whichever option best fits the selection.
    pub fn assign_best_fit(&mut self, items: Vec<Item>) -> Result<SlotOption, SchedulerError> {
        let (rate, members) = self.prepare_selection(items)?;
        let required = associate::group_size(&members);

        match self.best_candidate(rate, members.len()) {
            Some((option, room)) if required <= room => {
                self.place(members, &option)?;
                Ok(option)
            }
            candidate => Err(SchedulerError::NoRoom {
                class: self.layout.kind.class(),
                required,
                available: candidate.map(|(_, room)| room),
            }),
        }
    }

    fn prepare_selection(&self, mut items: Vec<Item>) -> Result<(f64, Vec<Item>), SchedulerError> {
        let rate = items.first().ok_or(SchedulerError::EmptySelection)?.rate;

        for item in &items {
            if self.is_assigned(&item.full_name) {
                return Err(SchedulerError::AlreadyAssigned(item.full_name.clone()));
            }
            if (item.rate - rate).abs() >= RATE_TOLERANCE {
                return Err(SchedulerError::RateMismatch {
                    item: item.full_name.clone(),
                    rate: item.rate,
                    expected: rate,
                });
            }
        }

        items.sort_by_key(|i| i.tree_order);
        associate::mark_bit_packs(&mut items);
        Ok((rate, items))
    }

    // ── Removal ───────────────────────────────────────────────────────────────

    /// Remove the named items, together with every co-located member of
    /// their link or bit-packed run.
    ///
    /// Returns the removed items with placement data cleared, in tree order,
    /// so the caller can make them available again.  Unknown names are
    /// ignored.
    pub fn remove(&mut self, names: &[String]) -> Vec<Item> {
        let mut selected: BTreeSet<String> = names
            .iter()
            .filter(|n| self.items.contains_key(n.as_str()))
            .cloned()
            .collect();

        // Expand until no new associates are found
        loop {
            let mut extra = Vec::new();
            for name in &selected {
                let Some(item) = self.items.get(name) else { continue };
                let pack_head = item.packed_with.clone().unwrap_or_else(|| name.clone());
                for other in self.items.values() {
                    if selected.contains(&other.full_name) {
                        continue;
                    }
                    let linked = item.link.is_some()
                        && other.link == item.link
                        && other.message_indices == item.message_indices;
                    let packed = other.full_name == pack_head
                        || other.packed_with.as_deref() == Some(pack_head.as_str());
                    if linked || packed {
                        extra.push(other.full_name.clone());
                    }
                }
            }
            if extra.is_empty() {
                break;
            }
            selected.extend(extra);
        }

        let mut removed = Vec::with_capacity(selected.len());
        for name in selected {
            let Some(mut item) = self.items.remove(&name) else { continue };
            for &handle in &item.message_indices {
                self.messages.remove_variable(handle, &name);
            }
            item.message_indices.clear();
            item.packed_with = None;
            removed.push(item);
        }
        removed.sort_by_key(|i| i.tree_order);

        if !removed.is_empty() {
            self.recalculate();
            debug!(count = removed.len(), "Items removed");
        }
        removed
    }

    /// Remove every placed item, or only those at `rate`.
    pub fn clear(&mut self, rate: Option<f64>) -> Vec<Item> {
        let names: Vec<String> = self
            .items
            .values()
            .filter(|i| rate.map_or(true, |r| (i.rate - r).abs() < RATE_TOLERANCE))
            .map(|i| i.full_name.clone())
            .collect();
        self.remove(&names)
    }

    // ── Sub-messages ──────────────────────────────────────────────────────────

    /// Append a sub-message to the top-level message at `index`.
    ///
    /// Items already placed in that message's sub-messages no longer match
    /// the new repetition pattern and are removed first; they are returned.
    /// An out-of-range index is ignored.
    pub fn add_sub_message(&mut self, index: usize, id: &str) -> Result<Vec<Item>, SchedulerError> {
        self.ensure_sub_messages_supported()?;
        let Some(parent) = self.messages.parent_at(index) else {
            warn!(index, "Add sub-message ignored: no such message");
            return Ok(Vec::new());
        };

        let released = self.release_sub_items(parent);
        self.messages.add_new_sub_message(parent, id);
        self.recalculate();

        info!(
            message = index,
            sub_messages = self.messages.sub_message_count(parent),
            released = released.len(),
            "Sub-message added"
        );
        Ok(released)
    }

    /// Remove the last sub-message of the top-level message at `index`.
    ///
    /// The default sub-message is never removed; an out-of-range index or a
    /// message with only its default sub-message is ignored.
    pub fn remove_sub_message(&mut self, index: usize) -> Result<Vec<Item>, SchedulerError> {
        self.ensure_sub_messages_supported()?;
        let Some(parent) = self.messages.parent_at(index) else {
            warn!(index, "Remove sub-message ignored: no such message");
            return Ok(Vec::new());
        };
        let count = self.messages.sub_message_count(parent);
        if count <= 1 {
            warn!(index, "Remove sub-message ignored: only the default sub-message remains");
            return Ok(Vec::new());
        }

        let released = self.release_sub_items(parent);
        self.messages.remove_sub_message(parent, count - 1);
        self.recalculate();

        info!(
            message = index,
            sub_messages = count - 1,
            released = released.len(),
            "Sub-message removed"
        );
        Ok(released)
    }

    fn ensure_sub_messages_supported(&self) -> Result<(), SchedulerError> {
        match self.layout.kind {
            SchedulerKind::Telemetry => Ok(()),
            SchedulerKind::Application { .. } => Err(SchedulerError::SubMessagesUnsupported),
        }
    }

    fn release_sub_items(&mut self, parent: MessageId) -> Vec<Item> {
        let children = self
            .messages
            .get(parent)
            .map(|m| m.sub_messages().to_vec())
            .unwrap_or_default();
        let names: Vec<String> = children
            .into_iter()
            .filter_map(|c| self.messages.get(c))
            .flat_map(|m| m.variables().to_vec())
            .collect();
        self.remove(&names)
    }

    // ── Naming ────────────────────────────────────────────────────────────────

    /// Set the id of a top-level message (`sub = None`) or of one of its
    /// sub-messages.  Returns `false` if the target does not exist.
    pub fn set_message_id(&mut self, index: usize, sub: Option<usize>, id: &str) -> bool {
        let handle = match (self.messages.parent_at(index), sub) {
            (Some(p), None) => Some(p),
            (Some(p), Some(s)) => self.messages.sub_message(p, s),
            (None, _) => None,
        };
        match handle {
            Some(h) => {
                self.messages.set_id(h, id);
                true
            }
            None => false,
        }
    }

    /// Rename the top-level message at `index`.  Names must stay unique.
    pub fn set_message_name(&mut self, index: usize, name: &str) -> bool {
        let taken = self
            .messages
            .parents()
            .iter()
            .any(|&p| self.messages.get(p).is_some_and(|m| m.name() == name));
        match self.messages.parent_at(index) {
            Some(p) if !taken => {
                self.messages.set_name(p, name);
                true
            }
            _ => false,
        }
    }

    // ── Capacity ──────────────────────────────────────────────────────────────

    /// Rebuild every counter from the footprints of the placed items.
    fn recalculate(&mut self) {
        let capacity = self.layout.message_capacity;
        let parents = self.messages.parents().to_vec();

        for parent in parents {
            let Some(msg) = self.messages.get(parent) else { continue };
            let own = self.footprint(msg.variables());
            let children = msg.sub_messages().to_vec();

            self.messages.set_bytes_remaining(parent, capacity - own);
            for child in children {
                let sub_used = self
                    .messages
                    .get(child)
                    .map_or(0, |m| self.footprint(m.variables()));
                self.messages
                    .set_bytes_remaining(child, capacity - own - sub_used);
            }
        }
    }

    fn footprint(&self, names: &[String]) -> i64 {
        names
            .iter()
            .filter_map(|n| self.items.get(n))
            .map(|i| i.footprint() as i64)
            .sum()
    }

    /// Change the capacity of every message, shifting each counter by the
    /// difference.
    pub fn update_capacity(&mut self, capacity: i64) {
        let delta = capacity - self.layout.message_capacity;
        if delta == 0 {
            return;
        }
        for parent in self.messages.parents().to_vec() {
            self.messages.add_bytes(parent, delta);
        }
        self.layout.message_capacity = capacity;
        info!(capacity, delta, "Message capacity updated");
    }

    // ── Persistence snapshot ──────────────────────────────────────────────────

    /// The current assignment in storable form.
    pub fn to_stored(&self) -> Vec<StoredMessage> {
        let stored_items = |names: &[String]| -> Vec<Item> {
            names
                .iter()
                .filter_map(|n| self.items.get(n))
                .map(|i| {
                    let mut item = i.clone();
                    item.message_indices.clear();
                    item
                })
                .collect()
        };

        self.messages
            .parents()
            .iter()
            .filter_map(|&p| self.messages.get(p))
            .map(|msg| StoredMessage {
                name: msg.name().to_string(),
                id: msg.id().to_string(),
                items: stored_items(msg.variables()),
                sub_messages: msg
                    .sub_messages()
                    .iter()
                    .filter_map(|&c| self.messages.get(c))
                    .map(|sub| StoredMessage {
                        name: sub.name().to_string(),
                        id: sub.id().to_string(),
                        items: stored_items(sub.variables()),
                        sub_messages: Vec::new(),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Record the current state as saved.
    pub fn commit(&mut self) {
        self.committed = self.to_stored();
    }

    /// `true` when the assignment differs from the last committed state.
    pub fn is_changed(&self) -> bool {
        self.to_stored() != self.committed
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
