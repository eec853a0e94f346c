// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Process Orchestrator
//!
//! Runs a pipeline to completion on the calling task, per §4.E. No
//! queue involved: `upload` returns only once the pipeline has reached
//! a terminal state (complete or failed).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use semantic_memory_domain::entities::{DataPipeline, DataPipelineStatus, PendingFile};
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{
    ArtifactStore, AskAnswer, AskQuery, HandlerOutcome, PipelineStateStore, SearchClient, SearchQuery, SearchResult, StepHandler,
};
use semantic_memory_domain::value_objects::{DocumentId, IndexName, TagCollection};
use tokio::sync::Mutex as AsyncMutex;

use super::service::Service;

/// Same linear backoff the file-backed queue uses, so a handler's
/// retry experience is identical whether it is driven in-process or
/// over a queue (§9: "default: same policy as queue").
fn linear_backoff(attempt: u32) -> std::time::Duration {
    std::time::Duration::from_secs(attempt.max(1) as u64)
}

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub struct InProcessOrchestrator {
    state_store: Arc<dyn PipelineStateStore>,
    artifact_store: Arc<dyn ArtifactStore>,
    search_client: Option<Arc<dyn SearchClient>>,
    handlers: AsyncMutex<HashMap<String, Arc<dyn StepHandler>>>,
    max_attempts: u32,
}

impl InProcessOrchestrator {
    pub fn new(state_store: Arc<dyn PipelineStateStore>, artifact_store: Arc<dyn ArtifactStore>, search_client: Option<Arc<dyn SearchClient>>) -> Self {
        Self { state_store, artifact_store, search_client, handlers: AsyncMutex::new(HashMap::new()), max_attempts: DEFAULT_MAX_ATTEMPTS }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Drives `pipeline` to completion or failure, persisting after
    /// every step (§4.E algorithm). The delete-index pipeline carries no
    /// `document_id`, so it has no keyed location in the state store;
    /// its progress lives only in this call's stack, matching the
    /// in-process mode's synchronous, non-resumable nature.
    async fn run_pipeline(&self, mut pipeline: DataPipeline) -> Result<DataPipeline, MemoryError> {
        pipeline.validate()?;
        self.persist(&pipeline).await?;

        if !pipeline.upload_complete {
            let index = pipeline.index.clone();
            let document_id = pipeline.document_id.clone();
            if let Some(document_id) = &document_id {
                self.artifact_store.create_volume(&index, document_id).await?;
                for file in std::mem::take(&mut pipeline.files_to_upload) {
                    self.artifact_store.write_bytes(&index, document_id, &file.name, &file.bytes).await?;
                    pipeline.files.push(semantic_memory_domain::entities::FileDetails::original(file.name, file.bytes.len() as u64, file.mime_type));
                }
            }
            pipeline.upload_complete = true;
            self.persist(&pipeline).await?;
        }

        while !pipeline.is_complete() && !pipeline.failed {
            let step_name = pipeline.current_step().expect("non-empty remaining_steps while not complete").to_string();
            let handler = self.handlers.lock().await.get(&step_name).cloned();

            let Some(handler) = handler else {
                pipeline.mark_failed(format!("no handler registered for step '{step_name}'"));
                self.persist(&pipeline).await?;
                break;
            };

            match self.invoke_with_retry(&handler, &mut pipeline).await {
                HandlerOutcome::Success => {
                    pipeline.advance_step();
                    self.persist(&pipeline).await?;
                }
                HandlerOutcome::FatalError => {
                    pipeline.mark_failed(format!("step '{step_name}' returned a fatal error"));
                    self.persist(&pipeline).await?;
                }
                HandlerOutcome::TransientError => {
                    pipeline.mark_failed(format!("step '{step_name}' exhausted its retry budget"));
                    self.persist(&pipeline).await?;
                }
            }
        }

        Ok(pipeline)
    }

    /// Retries a `TransientError` outcome up to `max_attempts` times
    /// with linear backoff, then reclassifies it as fatal by returning
    /// it unchanged - the caller treats a `TransientError` surviving
    /// this call as terminal (§4.E step 3).
    async fn invoke_with_retry(&self, handler: &Arc<dyn StepHandler>, pipeline: &mut DataPipeline) -> HandlerOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match handler.invoke(pipeline).await {
                Ok(outcome @ (HandlerOutcome::Success | HandlerOutcome::FatalError)) => return outcome,
                Ok(HandlerOutcome::TransientError) if attempt < self.max_attempts => {
                    tokio::time::sleep(linear_backoff(attempt)).await;
                }
                Ok(HandlerOutcome::TransientError) => return HandlerOutcome::TransientError,
                Err(_) => return HandlerOutcome::FatalError,
            }
        }
    }

    async fn persist(&self, pipeline: &DataPipeline) -> Result<(), MemoryError> {
        if pipeline.document_id.is_some() {
            self.state_store.write(pipeline).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Service for InProcessOrchestrator {
    async fn add_handler(&self, handler: Arc<dyn StepHandler>) -> Result<(), MemoryError> {
        let step_name = handler.step_name().to_string();
        let mut handlers = self.handlers.lock().await;
        if handlers.contains_key(&step_name) {
            return Err(MemoryError::configuration(format!("handler for step '{step_name}' is already registered")));
        }
        handlers.insert(step_name, handler);
        Ok(())
    }

    async fn upload(
        &self,
        index: IndexName,
        document_id: Option<DocumentId>,
        steps: Vec<String>,
        tags: TagCollection,
        files: Vec<PendingFile>,
    ) -> Result<DocumentId, MemoryError> {
        if files.is_empty() {
            return Err(MemoryError::validation("files", "upload must include at least one file"));
        }

        let document_id = document_id.unwrap_or_else(DocumentId::generate);

        // A fresh upload always supersedes whatever pipeline already
        // exists for this document, complete or not - in-process has no
        // queue to race against, so supersession here is just bookkeeping
        // for the purge step rather than an executionId mismatch check.
        let previous_execution = self.state_store.read(&index, &document_id).await?.map(|existing| existing.to_previous_execution());

        let mut pipeline = DataPipeline::new_upload(index, document_id.clone(), steps, tags, files)?;
        if let Some(previous) = previous_execution {
            pipeline.previous_executions_to_purge.push(previous);
        }

        let pipeline = self.run_pipeline(pipeline).await?;
        if pipeline.failed {
            return Err(MemoryError::orchestration(pipeline.failure_reason.unwrap_or_else(|| "pipeline failed".to_string())));
        }
        Ok(document_id)
    }

    async fn upload_status(&self, index: &IndexName, document_id: &DocumentId) -> Result<Option<DataPipelineStatus>, MemoryError> {
        Ok(self.state_store.read(index, document_id).await?.map(|p| p.status()))
    }

    async fn is_document_ready(&self, index: &IndexName, document_id: &DocumentId) -> Result<bool, MemoryError> {
        let Some(pipeline) = self.state_store.read(index, document_id).await? else {
            return Ok(false);
        };
        Ok(pipeline.is_complete() && !pipeline.failed && !pipeline.files.is_empty())
    }

    async fn start_document_deletion(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError> {
        self.artifact_store.delete_volume(index, document_id).await?;
        self.state_store.delete(index, document_id).await
    }

    async fn start_index_deletion(&self, index: &IndexName) -> Result<(), MemoryError> {
        let pipeline = DataPipeline::new_delete_index(index.clone())?;
        let pipeline = self.run_pipeline(pipeline).await?;
        if pipeline.failed {
            return Err(MemoryError::orchestration(pipeline.failure_reason.unwrap_or_else(|| "index deletion failed".to_string())));
        }
        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>, MemoryError> {
        match &self.search_client {
            Some(client) => client.search(query).await,
            None => Ok(Vec::new()),
        }
    }

    async fn ask(&self, query: AskQuery) -> Result<AskAnswer, MemoryError> {
        match &self.search_client {
            Some(client) => client.ask(query).await,
            None => Err(MemoryError::configuration("no search client configured")),
        }
    }

    fn handler_names(&self) -> Vec<String> {
        self.handlers.try_lock().map(|h| h.keys().cloned().collect()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::artifact_store::FileSystemArtifactStore;
    use crate::infrastructure::handlers::NoopStepHandler;
    use crate::infrastructure::state_store::FileSystemStateStore;

    fn index() -> IndexName {
        IndexName::new("personal").unwrap()
    }

    async fn orchestrator(dir: &tempfile::TempDir) -> InProcessOrchestrator {
        let state_store = Arc::new(FileSystemStateStore::new(dir.path()));
        let artifact_store = Arc::new(FileSystemArtifactStore::new(dir.path()));
        InProcessOrchestrator::new(state_store, artifact_store, None)
    }

    #[tokio::test]
    async fn upload_with_registered_handlers_completes() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir).await;
        orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap();
        orchestrator.add_handler(Arc::new(NoopStepHandler::new("embed"))).await.unwrap();

        let files = vec![PendingFile { name: "doc.txt".into(), mime_type: "text/plain".into(), bytes: b"hello".to_vec() }];
        let document_id = orchestrator
            .upload(index(), Some(DocumentId::new("doc-1").unwrap()), vec!["extract".into(), "embed".into()], TagCollection::new(), files)
            .await
            .unwrap();

        let status = orchestrator.upload_status(&index(), &document_id).await.unwrap().unwrap();
        assert!(status.completed);
        assert!(!status.failed);
        assert!(orchestrator.is_document_ready(&index(), &document_id).await.unwrap());
    }

    #[tokio::test]
    async fn upload_with_missing_handler_fails_the_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir).await;

        let err = orchestrator.upload(index(), Some(DocumentId::new("doc-2").unwrap()), vec!["unregistered".into()], TagCollection::new(), vec![]).await.unwrap_err();
        assert!(matches!(err, MemoryError::Orchestration { .. }));
    }

    #[tokio::test]
    async fn duplicate_handler_registration_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir).await;
        orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap();
        let err = orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap_err();
        assert!(matches!(err, MemoryError::Configuration(_)));
    }

    #[tokio::test]
    async fn reupload_of_same_document_records_previous_execution_for_purge() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir).await;
        orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap();

        let document_id = DocumentId::new("doc-3").unwrap();
        let file = || vec![PendingFile { name: "doc.txt".into(), mime_type: "text/plain".into(), bytes: b"hello".to_vec() }];
        orchestrator.upload(index(), Some(document_id.clone()), vec!["extract".into()], TagCollection::new(), file()).await.unwrap();

        let second = DataPipeline::new_upload(index(), document_id.clone(), vec!["extract".into()], TagCollection::new(), vec![]).unwrap();
        let first_execution = orchestrator.state_store.read(&index(), &document_id).await.unwrap().unwrap().execution_id;

        orchestrator.upload(index(), Some(document_id.clone()), vec!["extract".into()], TagCollection::new(), file()).await.unwrap();
        let reloaded = orchestrator.state_store.read(&index(), &document_id).await.unwrap().unwrap();
        assert_ne!(reloaded.execution_id, first_execution);
        assert_ne!(reloaded.execution_id, second.execution_id);
    }
}
