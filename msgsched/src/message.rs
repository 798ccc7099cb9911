/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Messages, sub-messages and the arena that owns them.
//!
//! A parent message is one slot in the cycle.  It always owns at least one
//! sub-message (the *default* sub-message, index 0) which shares the parent's
//! id.  Extra sub-messages model the repeated copies of a slower message
//! within one slot.
//!
//! # Ownership model
//! Messages live in a [`MessageArena`] and refer to each other through
//! [`MessageId`] handles: a sub-message stores its parent's id and a parent
//! stores the ordered list of its children.  Removing a sub-message leaves a
//! vacant slot so outstanding ids never alias another message.
//!
//! # Capacity
//! Each message keeps its own `bytes_remaining` counter, but a parent
//! *reports* the minimum over its sub-messages ([`MessageArena::bytes_remaining`]).
//! Recomputing the counters from item sizes is the allocation engine's job.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Handle to a message inside a [`MessageArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(usize);

impl MessageId {
    pub fn index(self) -> usize {
        self.0
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    name: String,
    id: String,
    bytes_remaining: i64,
    parent: Option<MessageId>,
    /// `Some` only for parent messages.
    sub_messages: Option<Vec<MessageId>>,
    /// Item names in transmission order.
    variables: Vec<String>,
}

impl Message {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<MessageId> {
        self.parent
    }

    pub fn is_parent(&self) -> bool {
        self.sub_messages.is_some()
    }

    /// Child handles in order; empty for a sub-message.
    pub fn sub_messages(&self) -> &[MessageId] {
        self.sub_messages.as_deref().unwrap_or(&[])
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v == name)
    }
}

// ── MessageArena ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageArena {
    slots: Vec<Option<Message>>,
    parents: Vec<MessageId>,
}

impl MessageArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, message: Message) -> MessageId {
        let handle = MessageId(self.slots.len());
        self.slots.push(Some(message));
        handle
    }

    fn get_mut(&mut self, handle: MessageId) -> Option<&mut Message> {
        self.slots.get_mut(handle.0).and_then(Option::as_mut)
    }

    pub fn get(&self, handle: MessageId) -> Option<&Message> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    /// Create a top-level message together with its default sub-message.
    pub fn add_parent(&mut self, name: impl Into<String>, id: impl Into<String>, bytes: i64) -> MessageId {
        let handle = self.push(Message {
            name: name.into(),
            id: id.into(),
            bytes_remaining: bytes,
            parent: None,
            sub_messages: Some(Vec::new()),
            variables: Vec::new(),
        });
        let default_id = self.slots[handle.0]
            .as_ref()
            .map(|m| m.id.clone())
            .unwrap_or_default();
        self.add_new_sub_message(handle, default_id);
        self.parents.push(handle);
        handle
    }

    /// Top-level messages in cycle order.
    pub fn parents(&self) -> &[MessageId] {
        &self.parents
    }

    /// Number of top-level messages.
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// The top-level message at cycle position `index`.
    pub fn parent_at(&self, index: usize) -> Option<MessageId> {
        self.parents.get(index).copied()
    }

    /// The sub-message at `index` under `parent`.
    pub fn sub_message(&self, parent: MessageId, index: usize) -> Option<MessageId> {
        self.get(parent)?.sub_messages().get(index).copied()
    }

    pub fn sub_message_count(&self, parent: MessageId) -> usize {
        self.get(parent).map_or(0, |m| m.sub_messages().len())
    }

    /// Append a sub-message named `parentName.N` (N = current count) that
    /// starts with the parent's current remaining bytes.
    ///
    /// Returns `None` when `parent` is not a parent message.
    pub fn add_new_sub_message(&mut self, parent: MessageId, id: impl Into<String>) -> Option<MessageId> {
        let (name, bytes) = {
            let msg = self.get(parent)?;
            if !msg.is_parent() {
                return None;
            }
            (
                format!("{}.{}", msg.name, msg.sub_messages().len()),
                msg.bytes_remaining,
            )
        };

        let child = self.push(Message {
            name,
            id: id.into(),
            bytes_remaining: bytes,
            parent: Some(parent),
            sub_messages: None,
            variables: Vec::new(),
        });

        if let Some(list) = self.get_mut(parent).and_then(|m| m.sub_messages.as_mut()) {
            list.push(child);
        }
        Some(child)
    }

    /// Remove the sub-message at `index`.
    ///
    /// A no-op returning `None` when the index is out of range or when it
    /// would remove the parent's only sub-message.
    pub fn remove_sub_message(&mut self, parent: MessageId, index: usize) -> Option<Message> {
        let list = self.get_mut(parent)?.sub_messages.as_mut()?;
        if index >= list.len() || list.len() == 1 {
            warn!(
                parent = parent.0,
                index,
                count = list.len(),
                "Sub-message removal ignored"
            );
            return None;
        }
        let child = list.remove(index);
        self.slots.get_mut(child.0).and_then(Option::take)
    }

    /// Set a message's id.  A parent and its default sub-message always carry
    /// the same id; changing one changes the other.
    pub fn set_id(&mut self, handle: MessageId, id: impl Into<String>) {
        let id = id.into();
        let (parent, default_sub) = match self.get(handle) {
            Some(msg) => match msg.parent {
                None => (None, msg.sub_messages().first().copied()),
                Some(p) => (Some(p), None),
            },
            None => return,
        };

        // The partner to keep in sync, if any
        let partner = match parent {
            None => default_sub,
            Some(p) if self.sub_message(p, 0) == Some(handle) => Some(p),
            Some(_) => None,
        };

        if let Some(msg) = self.get_mut(handle) {
            msg.id = id.clone();
        }
        if let Some(other) = partner.and_then(|h| self.get_mut(h)) {
            other.id = id;
        }
    }

    /// Rename a message; a parent's sub-messages follow the new prefix.
    pub fn set_name(&mut self, handle: MessageId, name: impl Into<String>) {
        let name = name.into();
        let Some(msg) = self.get(handle) else { return };
        let old = msg.name.clone();
        let children = msg.sub_messages().to_vec();

        for child in children {
            if let Some(sub) = self.get_mut(child) {
                if let Some(rest) = sub.name.strip_prefix(old.as_str()) {
                    sub.name = format!("{name}{rest}");
                }
            }
        }
        if let Some(msg) = self.get_mut(handle) {
            msg.name = name;
        }
    }

    /// Remaining bytes: the message's own counter for a sub-message, the
    /// minimum over all sub-messages for a parent.
    pub fn bytes_remaining(&self, handle: MessageId) -> i64 {
        let Some(msg) = self.get(handle) else { return 0 };
        match &msg.sub_messages {
            Some(children) if !children.is_empty() => children
                .iter()
                .map(|&c| self.bytes_remaining(c))
                .min()
                .unwrap_or(msg.bytes_remaining),
            _ => msg.bytes_remaining,
        }
    }

    /// Overwrite a message's own counter (sub-messages untouched).
    pub(crate) fn set_bytes_remaining(&mut self, handle: MessageId, bytes: i64) {
        if let Some(msg) = self.get_mut(handle) {
            msg.bytes_remaining = bytes;
        }
    }

    /// Shift a message's counter by `delta` and apply the same shift to every
    /// sub-message.
    pub fn add_bytes(&mut self, handle: MessageId, delta: i64) {
        let children = match self.get_mut(handle) {
            Some(msg) => {
                msg.bytes_remaining += delta;
                msg.sub_messages().to_vec()
            }
            None => return,
        };
        for child in children {
            self.add_bytes(child, delta);
        }
    }

    /// Insert `name` at `index` (append when `None` or past the end).
    ///
    /// No capacity check is made here.  Returns `false` when the message does
    /// not exist or already holds `name`.
    pub fn add_variable(&mut self, handle: MessageId, name: impl Into<String>, index: Option<usize>) -> bool {
        let name = name.into();
        let Some(msg) = self.get_mut(handle) else { return false };
        if msg.contains(&name) {
            return false;
        }
        let at = index.unwrap_or(msg.variables.len()).min(msg.variables.len());
        msg.variables.insert(at, name);
        true
    }

    /// Remove `name` from this message, or failing that from the first
    /// sub-message holding it.
    pub fn remove_variable(&mut self, handle: MessageId, name: &str) -> Option<String> {
        let msg = self.get_mut(handle)?;
        if let Some(pos) = msg.variables.iter().position(|v| v == name) {
            debug!(message = %msg.name, variable = name, "Variable removed");
            return Some(msg.variables.remove(pos));
        }
        let children = msg.sub_messages().to_vec();
        children
            .into_iter()
            .find_map(|child| self.remove_variable(child, name))
    }

    /// The message's own variables followed by those of its sub-messages,
    /// without duplicates.
    pub fn all_variables(&self, handle: MessageId) -> Vec<String> {
        let Some(msg) = self.get(handle) else { return Vec::new() };
        let mut all = msg.variables.clone();
        for &child in msg.sub_messages() {
            for name in self.all_variables(child) {
                if !all.contains(&name) {
                    all.push(name);
                }
            }
        }
        all
    }

    /// Parent and sub-message handles in cycle order.
    pub fn iter_handles(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.parents.iter().flat_map(move |&p| {
            std::iter::once(p).chain(self.get(p).map(|m| m.sub_messages().to_vec()).unwrap_or_default())
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
