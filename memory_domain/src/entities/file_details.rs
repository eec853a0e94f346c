// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Details
//!
//! Describes one artifact attached to a pipeline execution: either the
//! document's original content, or a file a step handler generated
//! while processing it (a partition, an extracted text chunk, an
//! embedding blob, ...).
//!
//! The original design expressed this as a base `FileDetails` class with
//! an `Original`/`Generated` subclass split via inheritance. This
//! codebase uses a tagged variant instead - `FileRecord` - so callers
//! pattern-match the two shapes instead of downcasting.

use crate::value_objects::TagCollection;
use serde::{Deserialize, Serialize};

/// One breadcrumb in a file's processing history: a step handler
/// stamps an entry here every time it touches the file, so the history
/// can be inspected without replaying the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub step_name: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn new(step_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            timestamp: chrono::Utc::now(),
            message: message.into(),
        }
    }
}

/// A single artifact belonging to a pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetails {
    /// Key under which the artifact's bytes are stored in the
    /// [`ArtifactStore`](crate::services::ArtifactStore) volume for this
    /// document.
    pub name: String,
    pub size: u64,
    pub mime_type: String,
    /// Case-insensitive set of step names that have already processed
    /// this file - consulted so a re-entrant orchestrator run does not
    /// reprocess work a prior attempt already completed.
    processed_by: Vec<String>,
    pub log: Vec<LogEntry>,
    pub tags: TagCollection,
    pub record: FileRecord,
}

/// Distinguishes a document's original content from content a step
/// handler derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FileRecord {
    /// The document exactly as the caller uploaded it.
    Original,
    /// A file produced by a step handler while processing the pipeline.
    Generated {
        /// Name of the file this one was derived from.
        parent_name: String,
        content_hash: crate::value_objects::ContentHash,
    },
}

impl FileDetails {
    pub fn new(name: impl Into<String>, size: u64, mime_type: impl Into<String>, record: FileRecord) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.into(),
            processed_by: Vec::new(),
            log: Vec::new(),
            tags: TagCollection::new(),
            record,
        }
    }

    pub fn original(name: impl Into<String>, size: u64, mime_type: impl Into<String>) -> Self {
        Self::new(name, size, mime_type, FileRecord::Original)
    }

    pub fn generated(
        name: impl Into<String>,
        size: u64,
        mime_type: impl Into<String>,
        parent_name: impl Into<String>,
        content_hash: crate::value_objects::ContentHash,
    ) -> Self {
        Self::new(
            name,
            size,
            mime_type,
            FileRecord::Generated {
                parent_name: parent_name.into(),
                content_hash,
            },
        )
    }

    /// Whether `step_name` has already processed this file, compared
    /// case-insensitively since step names come from configuration and
    /// callers are inconsistent about case.
    pub fn was_processed_by(&self, step_name: &str) -> bool {
        self.processed_by.iter().any(|s| s.eq_ignore_ascii_case(step_name))
    }

    /// Records that `step_name` processed this file. Idempotent: marking
    /// the same step twice has no additional effect.
    pub fn mark_processed_by(&mut self, step_name: impl Into<String>) {
        let step_name = step_name.into();
        if !self.was_processed_by(&step_name) {
            self.processed_by.push(step_name);
        }
    }

    pub fn append_log(&mut self, step_name: impl Into<String>, message: impl Into<String>) {
        self.log.push(LogEntry::new(step_name, message));
    }

    pub fn is_original(&self) -> bool {
        matches!(self.record, FileRecord::Original)
    }

    pub fn parent_name(&self) -> Option<&str> {
        match &self.record {
            FileRecord::Original => None,
            FileRecord::Generated { parent_name, .. } => Some(parent_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processed_by_is_case_insensitive() {
        let mut file = FileDetails::original("doc.txt", 10, "text/plain");
        file.mark_processed_by("Partition");
        assert!(file.was_processed_by("partition"));
        assert!(file.was_processed_by("PARTITION"));
    }

    #[test]
    fn marking_the_same_step_twice_does_not_duplicate() {
        let mut file = FileDetails::original("doc.txt", 10, "text/plain");
        file.mark_processed_by("embed");
        file.mark_processed_by("embed");
        assert_eq!(file.processed_by.len(), 1);
    }

    #[test]
    fn generated_files_carry_parent_linkage() {
        let hash = crate::value_objects::ContentHash::of(b"chunk");
        let file = FileDetails::generated("doc.txt.part0", 5, "text/plain", "doc.txt", hash);
        assert_eq!(file.parent_name(), Some("doc.txt"));
        assert!(!file.is_original());
    }
}
