// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Index Name
//!
//! Names the logical collection a document's artifacts, pipeline state,
//! and retrievable content all live under. Normalized to lowercase so
//! `"Invoices"` and `"invoices"` address the same index - index names
//! double as filesystem directory names and SQLite table-key prefixes,
//! both case-sensitive on at least one supported platform.

use crate::MemoryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static PATTERN: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[a-z0-9][a-z0-9-]{0,62}$").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexName(String);

impl IndexName {
    pub fn new(value: impl Into<String>) -> Result<Self, MemoryError> {
        let value = value.into().to_lowercase();
        if !PATTERN.is_match(&value) {
            return Err(MemoryError::validation(
                "index_name",
                "must be 1-63 lowercase alphanumeric characters or '-', and must not start with '-'",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IndexName {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IndexName> for String {
    fn from(name: IndexName) -> Self {
        name.0
    }
}
