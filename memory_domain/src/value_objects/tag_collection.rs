// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tag Collection
//!
//! A multi-valued map of caller-supplied tags attached to a document,
//! used for filtering at retrieval time. Keys beginning with `__` are
//! reserved for tags the system itself attaches (document id, index
//! name, ingestion timestamp, partition number, ...): callers cannot
//! set or overwrite them through [`TagCollection::insert`].

use crate::MemoryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const RESERVED_PREFIX: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCollection(BTreeMap<String, Vec<String>>);

impl TagCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a caller-supplied tag value. Rejects reserved-prefix
    /// keys; use [`TagCollection::insert_system`] for those.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<(), MemoryError> {
        let key = key.into();
        if key.starts_with(RESERVED_PREFIX) {
            return Err(MemoryError::validation(
                "tag",
                format!("'{key}' uses the reserved '__' prefix and cannot be set directly"),
            ));
        }
        self.insert_system(key, value);
        Ok(())
    }

    /// Sets a system tag, bypassing the reserved-prefix check. Used by
    /// the orchestrator to stamp `__document_id`, `__index`,
    /// `__file_part`, and similar bookkeeping tags.
    pub fn insert_system(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn get(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tags matching the given key/value pair regardless of any other
    /// values under the same key. Used by index-wide purges and
    /// document-scoped filters alike.
    pub fn matches(&self, key: &str, value: &str) -> bool {
        self.0.get(key).is_some_and(|values| values.iter().any(|v| v == value))
    }
}

impl IntoIterator for TagCollection {
    type Item = (String, Vec<String>);
    type IntoIter = std::collections::btree_map::IntoIter<String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
