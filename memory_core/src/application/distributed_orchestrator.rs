// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Distributed Orchestrator
//!
//! Same public surface as [`InProcessOrchestrator`](crate::application::in_process_orchestrator::InProcessOrchestrator)
//! (§4.F), but steps run as queue subscribers: `upload` enqueues a
//! pointer to the first step and returns; each step's handler is driven
//! by a [`StepDispatchHandler`] subscribed to `queue-<stepName>`.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use semantic_memory_domain::entities::{DataPipeline, DataPipelinePointer, DataPipelineStatus, PendingFile};
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{
    ArtifactStore, AskAnswer, AskQuery, DequeueHandler, DequeueOutcome, HandlerOutcome, PipelineStateStore, QueueOptions, SearchClient, SearchQuery,
    SearchResult, StepHandler,
};
use semantic_memory_domain::value_objects::{DocumentId, IndexName, TagCollection};
use tokio::sync::Mutex as AsyncMutex;

use super::service::{QueueFactory, Service};

fn queue_name(step_name: &str) -> String {
    format!("queue-{step_name}")
}

/// One advisory lock per `(index, documentId)`, mirroring the queue
/// module's own per-directory lock registry: `advanceStep` must
/// serialize with any other in-flight `advanceStep` for the same
/// document, but not with unrelated documents.
static DOCUMENT_LOCKS: LazyLock<SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>> = LazyLock::new(|| SyncMutex::new(HashMap::new()));

fn document_lock(index: &IndexName, document_id: Option<&DocumentId>) -> Arc<AsyncMutex<()>> {
    let key = format!("{}/{}", index.as_str(), document_id.map(DocumentId::as_str).unwrap_or(""));
    let mut locks = DOCUMENT_LOCKS.lock();
    locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

/// The part of step-advancement that needs no reference back to the
/// orchestrator itself: re-reading/persisting the pipeline and
/// enqueuing the next step's pointer. Split out from
/// `DistributedOrchestrator` so `StepDispatchHandler` can hold one
/// without a self-referential `Arc`.
struct StepAdvancer {
    state_store: Arc<dyn PipelineStateStore>,
    queue_factory: Arc<dyn QueueFactory>,
}

impl StepAdvancer {
    async fn enqueue_pointer(&self, pipeline: &DataPipeline) -> Result<(), MemoryError> {
        let Some(step) = pipeline.current_step() else { return Ok(()) };
        let name = queue_name(step);
        let queue = self.queue_factory.queue_for(&name).await?;
        let _ = queue.connect(&name, QueueOptions { dequeue_enabled: false, ..QueueOptions::default() }).await;
        let body = serde_json::to_string(&pipeline.pointer())?;
        queue.enqueue(&body).await?;
        Ok(())
    }

    /// Re-reads the persisted pipeline under the document lock, merges
    /// in the handler's mutations, pops the first remaining step,
    /// persists, and enqueues a pointer to the next step - or leaves it
    /// complete if there is none (§4.F `advanceStep`). Re-reading rather
    /// than trusting `handled` verbatim matters because a handler may
    /// run long enough for a newer upload to supersede this execution
    /// while it was in flight; re-checking `execution_id` here (not just
    /// at dequeue time) is what makes that race safe to drop silently
    /// instead of clobbering the newer execution's record.
    async fn advance_step(&self, handled: DataPipeline) -> Result<(), MemoryError> {
        let lock = document_lock(&handled.index, handled.document_id.as_ref());
        let _guard = lock.lock().await;

        let mut current = match &handled.document_id {
            Some(document_id) => match self.state_store.read(&handled.index, document_id).await? {
                Some(persisted) => persisted,
                None => return Ok(()),
            },
            None => handled.clone(),
        };

        if current.execution_id != handled.execution_id {
            return Ok(());
        }

        current.files = handled.files;
        current.tags = handled.tags;
        current.custom_data = handled.custom_data;
        current.previous_executions_to_purge = handled.previous_executions_to_purge;
        current.advance_step();

        if current.document_id.is_some() {
            self.state_store.write(&current).await?;
        }
        self.enqueue_pointer(&current).await
    }
}

pub struct DistributedOrchestrator {
    state_store: Arc<dyn PipelineStateStore>,
    artifact_store: Arc<dyn ArtifactStore>,
    search_client: Option<Arc<dyn SearchClient>>,
    queue_factory: Arc<dyn QueueFactory>,
    advancer: Arc<StepAdvancer>,
    handlers: AsyncMutex<HashMap<String, Arc<dyn StepHandler>>>,
}

impl DistributedOrchestrator {
    pub fn new(
        state_store: Arc<dyn PipelineStateStore>,
        artifact_store: Arc<dyn ArtifactStore>,
        queue_factory: Arc<dyn QueueFactory>,
        search_client: Option<Arc<dyn SearchClient>>,
    ) -> Self {
        let advancer = Arc::new(StepAdvancer { state_store: state_store.clone(), queue_factory: queue_factory.clone() });
        Self { state_store, artifact_store, search_client, queue_factory, advancer, handlers: AsyncMutex::new(HashMap::new()) }
    }
}

/// Subscribed to `queue-<stepName>`; decodes a [`DataPipelinePointer`],
/// loads the authoritative pipeline, and either drains a superseded
/// execution or invokes the real handler (§4.F).
struct StepDispatchHandler {
    step_name: String,
    handler: Arc<dyn StepHandler>,
    state_store: Arc<dyn PipelineStateStore>,
    advancer: Arc<StepAdvancer>,
}

#[async_trait]
impl DequeueHandler for StepDispatchHandler {
    async fn handle(&self, content: &str) -> DequeueOutcome {
        let pointer: DataPipelinePointer = match serde_json::from_str(content) {
            Ok(pointer) => pointer,
            Err(_) => return DequeueOutcome::FatalError,
        };

        let Some(document_id) = pointer.document_id.clone() else {
            // The reserved delete-index pipeline carries no document_id
            // and therefore no keyed state-store record to reconcile
            // against; run the handler directly against an ephemeral
            // pipeline built straight from the pointer.
            let mut pipeline = ephemeral_from_pointer(&pointer);
            return match self.handler.invoke(&mut pipeline).await {
                Ok(HandlerOutcome::Success) => DequeueOutcome::Success,
                Ok(HandlerOutcome::TransientError) => DequeueOutcome::TransientError,
                Ok(HandlerOutcome::FatalError) | Err(_) => DequeueOutcome::FatalError,
            };
        };

        let loaded = match self.state_store.read(&pointer.index, &document_id).await {
            Ok(loaded) => loaded,
            Err(_) => return DequeueOutcome::TransientError,
        };

        let Some(mut pipeline) = loaded else {
            return DequeueOutcome::FatalError;
        };

        if pipeline.execution_id != pointer.execution_id {
            // A newer execution already replaced this one; this message
            // belongs to drained, superseded work. Succeed without
            // touching anything so the queue deletes it quietly.
            return DequeueOutcome::Success;
        }

        match self.handler.invoke(&mut pipeline).await {
            Ok(HandlerOutcome::Success) => match self.advancer.advance_step(pipeline).await {
                Ok(()) => DequeueOutcome::Success,
                Err(_) => DequeueOutcome::TransientError,
            },
            Ok(HandlerOutcome::TransientError) => DequeueOutcome::TransientError,
            Ok(HandlerOutcome::FatalError) | Err(_) => {
                pipeline.mark_failed(format!("step '{}' returned a fatal error", self.step_name));
                if pipeline.document_id.is_some() {
                    let _ = self.state_store.write(&pipeline).await;
                }
                DequeueOutcome::FatalError
            }
        }
    }
}

fn ephemeral_from_pointer(pointer: &DataPipelinePointer) -> DataPipeline {
    DataPipeline {
        index: pointer.index.clone(),
        document_id: pointer.document_id.clone(),
        execution_id: pointer.execution_id.clone(),
        steps: pointer.steps.clone(),
        remaining_steps: pointer.steps.clone(),
        completed_steps: Vec::new(),
        tags: TagCollection::new(),
        files: Vec::new(),
        creation: chrono::Utc::now(),
        last_update: chrono::Utc::now(),
        previous_executions_to_purge: Vec::new(),
        custom_data: std::collections::BTreeMap::new(),
        failed: false,
        failure_reason: None,
        files_to_upload: Vec::new(),
        upload_complete: true,
    }
}

#[async_trait]
impl Service for DistributedOrchestrator {
    async fn add_handler(&self, handler: Arc<dyn StepHandler>) -> Result<(), MemoryError> {
        let step_name = handler.step_name().to_string();
        {
            let mut handlers = self.handlers.lock().await;
            if handlers.contains_key(&step_name) {
                return Err(MemoryError::configuration(format!("handler for step '{step_name}' is already registered")));
            }
            handlers.insert(step_name.clone(), handler.clone());
        }

        let name = queue_name(&step_name);
        let queue = self.queue_factory.queue_for(&name).await?;
        queue.connect(&name, QueueOptions::default()).await?;

        let dispatch = Arc::new(StepDispatchHandler { step_name, handler, state_store: self.state_store.clone(), advancer: self.advancer.clone() });
        queue.on_dequeue(dispatch).await
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
        let previous_execution = self.state_store.read(&index, &document_id).await?.map(|existing| existing.to_previous_execution());

        let mut pipeline = DataPipeline::new_upload(index.clone(), document_id.clone(), steps, tags, files)?;
        if let Some(previous) = previous_execution {
            pipeline.previous_executions_to_purge.push(previous);
        }

        self.artifact_store.create_volume(&index, &document_id).await?;
        for file in std::mem::take(&mut pipeline.files_to_upload) {
            self.artifact_store.write_bytes(&index, &document_id, &file.name, &file.bytes).await?;
            pipeline.files.push(semantic_memory_domain::entities::FileDetails::original(file.name, file.bytes.len() as u64, file.mime_type));
        }
        pipeline.upload_complete = true;

        self.state_store.write(&pipeline).await?;
        self.advancer.enqueue_pointer(&pipeline).await?;

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
        self.advancer.enqueue_pointer(&pipeline).await
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
    use crate::infrastructure::queue::FileSystemQueueFactory;
    use crate::infrastructure::state_store::FileSystemStateStore;
    use std::time::Duration;

    fn index() -> IndexName {
        IndexName::new("personal").unwrap()
    }

    async fn orchestrator(dir: &tempfile::TempDir) -> DistributedOrchestrator {
        let state_store = Arc::new(FileSystemStateStore::new(dir.path()));
        let artifact_store = Arc::new(FileSystemArtifactStore::new(dir.path()));
        let queue_factory = Arc::new(FileSystemQueueFactory::new(dir.path().join("queues")));
        DistributedOrchestrator::new(state_store, artifact_store, queue_factory, None)
    }

    #[tokio::test]
    async fn upload_runs_every_step_to_completion_via_queues() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir).await;
        orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap();
        orchestrator.add_handler(Arc::new(NoopStepHandler::new("embed"))).await.unwrap();

        let files = vec![PendingFile { name: "doc.txt".into(), mime_type: "text/plain".into(), bytes: b"hello".to_vec() }];
        let document_id = orchestrator
            .upload(index(), Some(DocumentId::new("doc-1").unwrap()), vec!["extract".into(), "embed".into()], TagCollection::new(), files)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let status = orchestrator.upload_status(&index(), &document_id).await.unwrap().unwrap();
        assert!(status.completed, "expected pipeline to complete, got {status:?}");
    }

    #[tokio::test]
    async fn superseded_execution_drains_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = orchestrator(&dir).await;
        orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap();

        let document_id = DocumentId::new("doc-2").unwrap();
        let file = || vec![PendingFile { name: "doc.txt".into(), mime_type: "text/plain".into(), bytes: b"hello".to_vec() }];
        orchestrator.upload(index(), Some(document_id.clone()), vec!["extract".into()], TagCollection::new(), file()).await.unwrap();
        orchestrator.upload(index(), Some(document_id.clone()), vec!["extract".into()], TagCollection::new(), file()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        let status = orchestrator.upload_status(&index(), &document_id).await.unwrap().unwrap();
        assert!(status.completed);
    }
}
