// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Identifier
//!
//! A caller-supplied, human-meaningful identifier for a document within
//! an index - not a generated id. Two uploads of the same `DocumentId`
//! are the same document at different points in time; re-ingesting
//! supersedes, it does not duplicate.

use crate::MemoryError;
use once_validated_regex::document_id_pattern;
use serde::{Deserialize, Serialize};
use std::fmt;

mod once_validated_regex {
    use regex::Regex;
    use std::sync::LazyLock;

    pub fn document_id_pattern() -> &'static Regex {
        static PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex"));
        &PATTERN
    }
}

/// A validated document identifier.
///
/// Non-empty, and restricted to `[A-Za-z0-9._-]` so it is always safe to
/// use as a filesystem path segment and as a SQL parameter. The one
/// exception is the pipeline that deletes an entire index, which
/// targets no single document and therefore carries no `DocumentId` at
/// all (modeled as `Option<DocumentId>` at the call site, not as an
/// empty `DocumentId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(value: impl Into<String>) -> Result<Self, MemoryError> {
        let value = value.into();
        if value.is_empty() {
            return Err(MemoryError::validation("document_id", "must not be empty"));
        }
        if value.len() > 512 {
            return Err(MemoryError::validation("document_id", "must not exceed 512 characters"));
        }
        if !document_id_pattern().is_match(&value) {
            return Err(MemoryError::validation(
                "document_id",
                "must contain only letters, digits, '.', '_', or '-'",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mints a server-generated id for an upload that arrived with an
    /// empty `documentId` (§6). Uses a ULID rather than a bare random
    /// string: same "random plus timestamp" shape the spec calls for,
    /// but also lexicographically sortable like every other id in this
    /// domain.
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = MemoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ids() {
        assert!(DocumentId::new("invoice-2024.pdf").is_ok());
        assert!(DocumentId::new("a_b.c-123").is_ok());
    }

    #[test]
    fn generated_ids_are_valid_and_unique() {
        let a = DocumentId::generate();
        let b = DocumentId::generate();
        assert_ne!(a, b);
        assert!(DocumentId::new(a.as_str().to_string()).is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(DocumentId::new("").is_err());
    }

    #[test]
    fn rejects_path_traversal_characters() {
        assert!(DocumentId::new("../etc/passwd").is_err());
        assert!(DocumentId::new("a/b").is_err());
    }
}
