// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Data Pipeline
//!
//! `DataPipeline` is the unit of work carried through the orchestrator: one
//! document's journey through an ordered sequence of named steps. It is
//! persisted by the [`PipelineStateStore`](crate::services::PipelineStateStore)
//! after every step and is the only state a step handler is given to read or
//! mutate.
//!
//! `DataPipelinePointer` is the minimal message an orchestrator enqueues on a
//! step's queue - just enough to reload the full record and detect whether a
//! newer execution has already superseded it.

use crate::error::MemoryError;
use crate::value_objects::{DocumentId, ExecutionId, IndexName, TagCollection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::file_details::FileDetails;

/// The single reserved step name for an index-wide delete. A pipeline with
/// this as its only step carries no `document_id` - see
/// [`DataPipeline::validate`].
pub const DELETE_INDEX_STEP: &str = "delete-index";

/// A prior execution superseded by a newer upload, kept around only long
/// enough for a consolidation step to delete its derived artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousExecution {
    pub execution_id: ExecutionId,
    /// Artifact-store file names this execution produced, to be deleted by
    /// whatever step drains `previous_executions_to_purge`.
    pub file_names: Vec<String>,
}

/// A file queued for upload to the artifact store at the start of a run.
/// Transient: present only between `prepare_new_upload` and the
/// orchestrator's first artifact-store write, never persisted.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// The unit of work carried through the pipeline orchestrator.
///
/// Invariants enforced by [`DataPipeline::validate`]:
/// - `completed_steps ++ remaining_steps == steps`, in order.
/// - No two consecutive entries of `steps` are equal, and none is empty.
/// - `document_id` is `None` if and only if `steps == [DELETE_INDEX_STEP]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPipeline {
    pub index: IndexName,
    /// `None` only for the reserved `delete-index` pipeline, which targets
    /// no single document.
    pub document_id: Option<DocumentId>,
    pub execution_id: ExecutionId,
    pub steps: Vec<String>,
    pub remaining_steps: Vec<String>,
    pub completed_steps: Vec<String>,
    pub tags: TagCollection,
    pub files: Vec<FileDetails>,
    pub creation: chrono::DateTime<chrono::Utc>,
    pub last_update: chrono::DateTime<chrono::Utc>,
    pub previous_executions_to_purge: Vec<PreviousExecution>,
    pub custom_data: BTreeMap<String, serde_json::Value>,
    /// Set by the orchestrator when a step handler returns `FatalError`.
    /// Terminal: a failed pipeline's `remaining_steps` stop advancing.
    pub failed: bool,
    pub failure_reason: Option<String>,

    /// Files staged for upload at the start of this run. Never persisted;
    /// the orchestrator drains this into the artifact store and then marks
    /// `upload_complete`.
    #[serde(skip)]
    pub files_to_upload: Vec<PendingFile>,
    #[serde(skip)]
    pub upload_complete: bool,
}

impl DataPipeline {
    /// Builds a fresh pipeline for a new document upload. Mints a new
    /// `execution_id`; callers that are re-ingesting an already-known
    /// document should additionally stamp `previous_executions_to_purge`
    /// with the superseded execution (see the distributed orchestrator's
    /// supersession handling).
    pub fn new_upload(
        index: IndexName,
        document_id: DocumentId,
        steps: Vec<String>,
        tags: TagCollection,
        files_to_upload: Vec<PendingFile>,
    ) -> Result<Self, MemoryError> {
        let pipeline = Self {
            index,
            document_id: Some(document_id),
            execution_id: ExecutionId::new(),
            remaining_steps: steps.clone(),
            steps,
            completed_steps: Vec::new(),
            tags,
            files: Vec::new(),
            creation: chrono::Utc::now(),
            last_update: chrono::Utc::now(),
            previous_executions_to_purge: Vec::new(),
            custom_data: BTreeMap::new(),
            failed: false,
            failure_reason: None,
            files_to_upload,
            upload_complete: false,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Builds the reserved single-step pipeline that deletes an entire
    /// index. Carries no `document_id` per the §3 invariant.
    pub fn new_delete_index(index: IndexName) -> Result<Self, MemoryError> {
        let pipeline = Self {
            index,
            document_id: None,
            execution_id: ExecutionId::new(),
            steps: vec![DELETE_INDEX_STEP.to_string()],
            remaining_steps: vec![DELETE_INDEX_STEP.to_string()],
            completed_steps: Vec::new(),
            tags: TagCollection::new(),
            files: Vec::new(),
            creation: chrono::Utc::now(),
            last_update: chrono::Utc::now(),
            previous_executions_to_purge: Vec::new(),
            custom_data: BTreeMap::new(),
            failed: false,
            failure_reason: None,
            files_to_upload: Vec::new(),
            upload_complete: false,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Validates every §3 invariant. Called before the orchestrator
    /// persists the initial record, and may be re-run by callers that
    /// deserialize a pipeline from an untrusted source.
    pub fn validate(&self) -> Result<(), MemoryError> {
        if self.steps.is_empty() {
            return Err(MemoryError::validation("steps", "pipeline must have at least one step"));
        }
        for step in &self.steps {
            if step.is_empty() {
                return Err(MemoryError::validation("steps", "step names must not be empty"));
            }
        }
        for pair in self.steps.windows(2) {
            if pair[0] == pair[1] {
                return Err(MemoryError::validation(
                    "steps",
                    format!("consecutive steps must not repeat: '{}'", pair[0]),
                ));
            }
        }

        let mut joined = self.completed_steps.clone();
        joined.extend(self.remaining_steps.iter().cloned());
        if joined != self.steps {
            return Err(MemoryError::validation(
                "steps",
                "completed_steps ++ remaining_steps must equal steps, in order",
            ));
        }

        let is_delete_index = self.steps == [DELETE_INDEX_STEP.to_string()];
        match (&self.document_id, is_delete_index) {
            (None, true) => {}
            (Some(_), false) => {}
            (None, false) => {
                return Err(MemoryError::validation(
                    "document_id",
                    "empty only for the reserved delete-index pipeline",
                ))
            }
            (Some(_), true) => {
                return Err(MemoryError::validation(
                    "document_id",
                    "the delete-index pipeline must not target a single document",
                ))
            }
        }

        Ok(())
    }

    /// `true` once every step has moved from `remaining_steps` to
    /// `completed_steps`.
    pub fn is_complete(&self) -> bool {
        self.remaining_steps.is_empty()
    }

    pub fn current_step(&self) -> Option<&str> {
        self.remaining_steps.first().map(String::as_str)
    }

    /// Moves the first remaining step to `completed_steps`. Called by an
    /// orchestrator after a handler reports `Success`. Panics if there is
    /// no remaining step - callers must check [`DataPipeline::is_complete`]
    /// first, since advancing a complete pipeline is a programmer error.
    pub fn advance_step(&mut self) -> String {
        let step = self.remaining_steps.remove(0);
        self.completed_steps.push(step.clone());
        self.last_update = chrono::Utc::now();
        step
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.failed = true;
        self.failure_reason = Some(reason.into());
        self.last_update = chrono::Utc::now();
    }

    /// Snapshots this execution so its artifacts can be purged later, and
    /// clears it for reuse by a fresh upload superseding this one.
    pub fn to_previous_execution(&self) -> PreviousExecution {
        PreviousExecution {
            execution_id: self.execution_id.clone(),
            file_names: self.files.iter().map(|f| f.name.clone()).collect(),
        }
    }

    pub fn status(&self) -> DataPipelineStatus {
        DataPipelineStatus::from_pipeline(self)
    }

    pub fn pointer(&self) -> DataPipelinePointer {
        DataPipelinePointer {
            index: self.index.clone(),
            document_id: self.document_id.clone(),
            execution_id: self.execution_id.clone(),
            steps: self.steps.clone(),
        }
    }
}

/// The minimal message placed on a step's queue by the distributed
/// orchestrator. Carrying `steps` (not just the current one) lets a
/// handler reload and resume a pipeline even if the state store record
/// were somehow lost, per §4.A.
///
/// Field order on the wire is significant per §6: `index, document_id,
/// execution_id, steps`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPipelinePointer {
    pub index: IndexName,
    pub document_id: Option<DocumentId>,
    pub execution_id: ExecutionId,
    pub steps: Vec<String>,
}

/// The read-only summary exposed to callers of `readSummary` / the
/// upload-status surface. Never mutated directly; always derived from a
/// [`DataPipeline`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPipelineStatus {
    pub index: IndexName,
    pub document_id: Option<DocumentId>,
    pub completed: bool,
    pub failed: bool,
    pub empty: bool,
    pub remaining_steps: Vec<String>,
    pub completed_steps: Vec<String>,
    /// Per-file breadcrumb log. Present only when at least one file has
    /// at least one log entry - an empty pipeline produces `None` here,
    /// not an empty vec, so callers can tell "nothing happened yet" from
    /// "this field doesn't apply."
    pub log_entries: Option<Vec<(String, Vec<super::file_details::LogEntry>)>>,
}

impl DataPipelineStatus {
    pub fn from_pipeline(pipeline: &DataPipeline) -> Self {
        let log_entries: Vec<(String, Vec<super::file_details::LogEntry>)> = pipeline
            .files
            .iter()
            .filter(|f| !f.log.is_empty())
            .map(|f| (f.name.clone(), f.log.clone()))
            .collect();

        Self {
            index: pipeline.index.clone(),
            document_id: pipeline.document_id.clone(),
            completed: pipeline.is_complete() && !pipeline.failed,
            failed: pipeline.failed,
            empty: pipeline.files.is_empty(),
            remaining_steps: pipeline.remaining_steps.clone(),
            completed_steps: pipeline.completed_steps.clone(),
            log_entries: if log_entries.is_empty() { None } else { Some(log_entries) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> IndexName {
        IndexName::new("personal").unwrap()
    }

    fn doc() -> DocumentId {
        DocumentId::new("doc-001").unwrap()
    }

    #[test]
    fn happy_path_round_trip() {
        let steps = vec!["extract".to_string(), "partition".to_string(), "embed".to_string(), "save".to_string()];
        let mut pipeline = DataPipeline::new_upload(index(), doc(), steps.clone(), TagCollection::new(), vec![]).unwrap();

        assert!(!pipeline.is_complete());
        for step in &steps {
            assert_eq!(pipeline.current_step(), Some(step.as_str()));
            pipeline.advance_step();
        }
        assert!(pipeline.is_complete());
        assert_eq!(pipeline.completed_steps, steps);

        let json = serde_json::to_string(&pipeline).unwrap();
        let reloaded: DataPipeline = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.completed_steps, pipeline.completed_steps);
        assert_eq!(reloaded.execution_id, pipeline.execution_id);
    }

    #[test]
    fn rejects_consecutive_duplicate_steps() {
        let steps = vec!["extract".to_string(), "extract".to_string()];
        assert!(DataPipeline::new_upload(index(), doc(), steps, TagCollection::new(), vec![]).is_err());
    }

    #[test]
    fn rejects_empty_step_list() {
        assert!(DataPipeline::new_upload(index(), doc(), vec![], TagCollection::new(), vec![]).is_err());
    }

    #[test]
    fn delete_index_pipeline_has_no_document_id() {
        let pipeline = DataPipeline::new_delete_index(index()).unwrap();
        assert!(pipeline.document_id.is_none());
        assert_eq!(pipeline.steps, vec![DELETE_INDEX_STEP.to_string()]);
    }

    #[test]
    fn non_delete_index_pipeline_must_have_a_document_id() {
        let mut pipeline = DataPipeline::new_upload(index(), doc(), vec!["extract".into()], TagCollection::new(), vec![]).unwrap();
        pipeline.document_id = None;
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn pointer_carries_the_full_step_list() {
        let steps = vec!["extract".to_string(), "embed".to_string()];
        let pipeline = DataPipeline::new_upload(index(), doc(), steps.clone(), TagCollection::new(), vec![]).unwrap();
        let pointer = pipeline.pointer();
        assert_eq!(pointer.steps, steps);
        assert_eq!(pointer.execution_id, pipeline.execution_id);
    }

    #[test]
    fn status_hides_empty_log_entries() {
        let pipeline = DataPipeline::new_upload(index(), doc(), vec!["extract".into()], TagCollection::new(), vec![]).unwrap();
        assert!(pipeline.status().log_entries.is_none());
    }

    #[test]
    fn failing_a_pipeline_stamps_the_reason_and_does_not_complete() {
        let mut pipeline = DataPipeline::new_upload(index(), doc(), vec!["extract".into()], TagCollection::new(), vec![]).unwrap();
        pipeline.mark_failed("unknown step handler");
        assert!(pipeline.failed);
        assert!(!pipeline.status().completed);
    }
}
