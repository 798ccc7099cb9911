/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Data-type size table.
//!
//! Items never look sizes up on their own; a [`DataTypeTable`] (or any other
//! [`SizeResolver`]) is handed to item construction instead.

use std::collections::HashMap;

use crate::item::SizeResolver;

/// Size and string flag for one data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataTypeInfo {
    /// Size in bytes of one element.
    pub size: u32,
    /// `true` for character types whose arrays form strings.
    pub string: bool,
}

/// Data type name → [`DataTypeInfo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeTable {
    types: HashMap<String, DataTypeInfo>,
}

impl DataTypeTable {
    /// An empty table.  Every lookup fails until types are inserted.
    pub fn empty() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Built-in primitive C types.
    pub fn primitives() -> Self {
        let mut table = Self::empty();
        for (name, size) in [
            ("int8_t", 1),
            ("uint8_t", 1),
            ("int16_t", 2),
            ("uint16_t", 2),
            ("int32_t", 4),
            ("uint32_t", 4),
            ("int64_t", 8),
            ("uint64_t", 8),
            ("int8", 1),
            ("uint8", 1),
            ("int16", 2),
            ("uint16", 2),
            ("int32", 4),
            ("uint32", 4),
            ("int64", 8),
            ("uint64", 8),
            ("float", 4),
            ("double", 8),
        ] {
            table.insert(name, size, false);
        }
        table.insert("char", 1, true);
        table
    }

    pub fn insert(&mut self, name: impl Into<String>, size: u32, string: bool) {
        self.types.insert(name.into(), DataTypeInfo { size, string });
    }

    pub fn get(&self, name: &str) -> Option<&DataTypeInfo> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl Default for DataTypeTable {
    fn default() -> Self {
        Self::primitives()
    }
}

impl SizeResolver for DataTypeTable {
    fn size_of(&self, data_type: &str) -> Option<u32> {
        self.types.get(data_type).map(|info| info.size)
    }

    fn is_string(&self, data_type: &str) -> bool {
        self.types.get(data_type).is_some_and(|info| info.string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_resolve_sizes() {
        let table = DataTypeTable::primitives();
        assert_eq!(table.size_of("uint16_t"), Some(2));
        assert_eq!(table.size_of("double"), Some(8));
        assert_eq!(table.size_of("struct_x"), None);
    }

    #[test]
    fn only_char_is_a_string_type_by_default() {
        let table = DataTypeTable::default();
        assert!(table.is_string("char"));
        assert!(!table.is_string("uint8"));
        assert!(!table.is_string("unknown"));
    }

    #[test]
    fn insert_overrides_existing_entry() {
        let mut table = DataTypeTable::primitives();
        table.insert("float", 8, false);
        assert_eq!(table.size_of("float"), Some(8));
    }
}
