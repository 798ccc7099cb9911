/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Associated-item grouping.
//!
//! Some items may only be placed together:
//!
//! | Group | Members | Size |
//! |---|---|---|
//! | linked | every candidate sharing the head's link | sum of footprints |
//! | bit-packed | adjacent `:bits` fields of one type that fit in one storage unit | the head's size |
//! | string | adjacent elements of one character array | sum of sizes |
//!
//! "Adjacent" means consecutive `tree_order` values with the same parent
//! structure.  Candidate lists are sorted largest-first with a stable sort,
//! so adjacent members of one run stay next to each other.

use crate::item::Item;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    Single,
    Linked(String),
    BitPacked,
    StringMembers,
}

/// Items that must be placed together, in tree order, with bit-pack
/// followers already marked.
#[derive(Debug, Clone)]
pub struct AssociatedGroup {
    pub kind: GroupKind,
    pub total_size: i64,
    pub members: Vec<Item>,
}

impl AssociatedGroup {
    fn new(kind: GroupKind, mut members: Vec<Item>) -> Self {
        members.sort_by_key(|m| m.tree_order);
        mark_bit_packs(&mut members);
        let total_size = group_size(&members);
        Self {
            kind,
            total_size,
            members,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.members.iter().map(|m| m.full_name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Bytes consumed by `items` once placed together.
pub fn group_size(items: &[Item]) -> i64 {
    items.iter().map(|i| i.footprint() as i64).sum()
}

/// Expand `working[0]` to the group it must be placed with.
///
/// Returns `None` for an empty list.
pub fn collect(working: &[Item]) -> Option<AssociatedGroup> {
    let head = working.first()?;

    if let Some(link) = &head.link {
        let members = working
            .iter()
            .filter(|i| i.link.as_deref() == Some(link.as_str()))
            .cloned()
            .collect();
        return Some(AssociatedGroup::new(GroupKind::Linked(link.clone()), members));
    }

    if let Some(head_bits) = head.bit_length() {
        let capacity = head.size * 8;
        let mut used = head_bits;
        let mut members = vec![head.clone()];
        for next in &working[1..] {
            let prev = members.last().unwrap_or(head);
            if !same_structure(prev, next) || !next.is_bit_packed() || next.link.is_some() {
                break;
            }
            let bits = next.bit_length().unwrap_or(0);
            if used + bits > capacity {
                break;
            }
            used += bits;
            members.push(next.clone());
        }
        let kind = if members.len() > 1 {
            GroupKind::BitPacked
        } else {
            GroupKind::Single
        };
        return Some(AssociatedGroup::new(kind, members));
    }

    if let Some(base) = head.string_base() {
        let mut members = vec![head.clone()];
        for next in &working[1..] {
            let prev = members.last().unwrap_or(head);
            if next.string_base() != Some(base)
                || next.tree_order != prev.tree_order + 1
                || next.link.is_some()
            {
                break;
            }
            members.push(next.clone());
        }
        let kind = if members.len() > 1 {
            GroupKind::StringMembers
        } else {
            GroupKind::Single
        };
        return Some(AssociatedGroup::new(kind, members));
    }

    Some(AssociatedGroup::new(GroupKind::Single, vec![head.clone()]))
}

fn same_structure(prev: &Item, next: &Item) -> bool {
    next.tree_order == prev.tree_order + 1
        && next.parent_path() == prev.parent_path()
        && next.telemetry_info().map(|t| &t.data_type) == prev.telemetry_info().map(|t| &t.data_type)
}

/// Mark bit-pack followers in `items` (sorted by tree order).
///
/// A run starts at a bit-packed field and absorbs following adjacent fields
/// of the same type while their widths still fit in one storage unit; every
/// absorbed field gets `packed_with` set to the run's head.  Existing marks
/// are cleared first.
pub fn mark_bit_packs(items: &mut [Item]) {
    // (head index, bits used, capacity in bits)
    let mut run: Option<(usize, u32, u32)> = None;

    for idx in 0..items.len() {
        items[idx].packed_with = None;

        let Some(bits) = items[idx].bit_length() else {
            run = None;
            continue;
        };

        if let Some((head, used, capacity)) = run {
            if idx > 0 && same_structure(&items[idx - 1], &items[idx]) && used + bits <= capacity {
                items[idx].packed_with = Some(items[head].full_name.clone());
                run = Some((head, used + bits, capacity));
                continue;
            }
        }
        run = Some((idx, bits, items[idx].size * 8));
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataTypeTable;

    fn make_item(name: &str, order: usize) -> Item {
        Item::telemetry(name, 1.0, &DataTypeTable::primitives())
            .unwrap()
            .with_tree_order(order)
    }

    // ── Single ────────────────────────────────────────────────────────────────

    #[test]
    fn empty_list_has_no_group() {
        assert!(collect(&[]).is_none());
    }

    #[test]
    fn plain_item_is_alone() {
        let working = vec![make_item("R,uint32.a", 0), make_item("R,uint32.b", 1)];
        let group = collect(&working).unwrap();
        assert_eq!(group.kind, GroupKind::Single);
        assert_eq!(group.names(), vec!["R,uint32.a"]);
        assert_eq!(group.total_size, 4);
    }

    // ── Linked ────────────────────────────────────────────────────────────────

    #[test]
    fn linked_group_gathers_all_members_anywhere_in_list() {
        let working = vec![
            make_item("R,double.a", 0).with_link("L1"),
            make_item("R,uint32.x", 1),
            make_item("R,uint16.b", 2).with_link("L1"),
        ];
        let group = collect(&working).unwrap();
        assert_eq!(group.kind, GroupKind::Linked("L1".into()));
        assert_eq!(group.names(), vec!["R,double.a", "R,uint16.b"]);
        assert_eq!(group.total_size, 10);
    }

    // ── Bit-packed ────────────────────────────────────────────────────────────

    #[test]
    fn bit_pack_run_stops_when_bits_overflow() {
        let working = vec![
            make_item("R,uint8.a:3", 0),
            make_item("R,uint8.b:3", 1),
            make_item("R,uint8.c:3", 2),
        ];
        let group = collect(&working).unwrap();
        assert_eq!(group.kind, GroupKind::BitPacked);
        assert_eq!(group.names(), vec!["R,uint8.a:3", "R,uint8.b:3"]);
        assert_eq!(group.total_size, 1, "pack consumes one storage unit");
        assert_eq!(group.members[1].packed_with.as_deref(), Some("R,uint8.a:3"));
    }

    #[test]
    fn bit_pack_run_stops_at_type_change() {
        let working = vec![make_item("R,uint8.a:2", 0), make_item("R,uint16.b:2", 1)];
        let group = collect(&working).unwrap();
        assert_eq!(group.kind, GroupKind::Single);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn bit_pack_run_requires_adjacency() {
        let working = vec![make_item("R,uint8.a:2", 0), make_item("R,uint8.b:2", 5)];
        assert_eq!(collect(&working).unwrap().len(), 1);
    }

    #[test]
    fn mark_restarts_run_after_overflow() {
        let mut items = vec![
            make_item("R,uint8.a:5", 0),
            make_item("R,uint8.b:3", 1),
            make_item("R,uint8.c:4", 2),
            make_item("R,uint8.d:4", 3),
        ];
        mark_bit_packs(&mut items);
        assert_eq!(items[0].packed_with, None);
        assert_eq!(items[1].packed_with.as_deref(), Some("R,uint8.a:5"));
        assert_eq!(items[2].packed_with, None);
        assert_eq!(items[3].packed_with.as_deref(), Some("R,uint8.c:4"));
        assert_eq!(group_size(&items), 2);
    }

    // ── Strings ───────────────────────────────────────────────────────────────

    #[test]
    fn string_elements_are_grouped_and_summed() {
        let working = vec![
            make_item("R,char.name[0]", 0),
            make_item("R,char.name[1]", 1),
            make_item("R,char.name[2]", 2),
            make_item("R,char.other[0]", 3),
        ];
        let group = collect(&working).unwrap();
        assert_eq!(group.kind, GroupKind::StringMembers);
        assert_eq!(group.len(), 3);
        assert_eq!(group.total_size, 3);
    }
}
