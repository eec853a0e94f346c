// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Retry and poison-queue behavior driven through the distributed
//! orchestrator's queue dispatch path, not the queue's own unit tests:
//! a handler that fails transiently a bounded number of times still
//! completes the pipeline, and one that fails fatally lands the
//! message in the step's poison directory and marks the pipeline
//! failed.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use semantic_memory_core::application::{DistributedOrchestrator, Service};
use semantic_memory_core::infrastructure::artifact_store::FileSystemArtifactStore;
use semantic_memory_core::infrastructure::queue::FileSystemQueueFactory;
use semantic_memory_core::infrastructure::state_store::FileSystemStateStore;
use semantic_memory_domain::entities::DataPipeline;
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{HandlerOutcome, StepHandler};
use semantic_memory_domain::value_objects::{DocumentId, IndexName, TagCollection};

struct FlakyHandler {
    step_name: String,
    fails_remaining: AtomicUsize,
    always_fatal: bool,
}

#[async_trait]
impl StepHandler for FlakyHandler {
    fn step_name(&self) -> &str {
        &self.step_name
    }

    async fn invoke(&self, _pipeline: &mut DataPipeline) -> Result<HandlerOutcome, MemoryError> {
        if self.always_fatal {
            return Ok(HandlerOutcome::FatalError);
        }
        let remaining = self.fails_remaining.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n == 0 { None } else { Some(n - 1) });
        match remaining {
            Ok(_) => Ok(HandlerOutcome::TransientError),
            Err(_) => Ok(HandlerOutcome::Success),
        }
    }
}

fn index() -> IndexName {
    IndexName::new("personal").unwrap()
}

fn one_file() -> Vec<semantic_memory_domain::entities::PendingFile> {
    vec![semantic_memory_domain::entities::PendingFile { name: "doc.txt".into(), mime_type: "text/plain".into(), bytes: b"hello".to_vec() }]
}

#[tokio::test]
async fn transient_failures_within_budget_still_complete() {
    let dir = tempfile::tempdir().unwrap();
    let state_store = Arc::new(FileSystemStateStore::new(dir.path().join("pipelines")));
    let artifact_store = Arc::new(FileSystemArtifactStore::new(dir.path().join("artifacts")));
    let queue_factory = Arc::new(FileSystemQueueFactory::new(dir.path().join("queues")).with_poll_interval(Duration::from_millis(20)));
    let orchestrator = DistributedOrchestrator::new(state_store, artifact_store, queue_factory, None);

    orchestrator
        .add_handler(Arc::new(FlakyHandler { step_name: "extract".into(), fails_remaining: AtomicUsize::new(2), always_fatal: false }))
        .await
        .unwrap();

    let document_id = DocumentId::new("doc-flaky").unwrap();
    orchestrator.upload(index(), Some(document_id.clone()), vec!["extract".into()], TagCollection::new(), one_file()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(4)).await;

    let status = orchestrator.upload_status(&index(), &document_id).await.unwrap().unwrap();
    assert!(status.completed, "expected eventual completion after transient retries, got {status:?}");
}

#[tokio::test]
async fn fatal_handler_poisons_the_step_queue_and_fails_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let state_store = Arc::new(FileSystemStateStore::new(dir.path().join("pipelines")));
    let artifact_store = Arc::new(FileSystemArtifactStore::new(dir.path().join("artifacts")));
    let queues_root = dir.path().join("queues");
    let queue_factory = Arc::new(FileSystemQueueFactory::new(queues_root.clone()).with_poll_interval(Duration::from_millis(20)));
    let orchestrator = DistributedOrchestrator::new(state_store, artifact_store, queue_factory, None);

    orchestrator
        .add_handler(Arc::new(FlakyHandler { step_name: "extract".into(), fails_remaining: AtomicUsize::new(0), always_fatal: true }))
        .await
        .unwrap();

    let document_id = DocumentId::new("doc-fatal").unwrap();
    orchestrator.upload(index(), Some(document_id.clone()), vec!["extract".into()], TagCollection::new(), one_file()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let status = orchestrator.upload_status(&index(), &document_id).await.unwrap().unwrap();
    assert!(status.failed, "expected pipeline to be marked failed, got {status:?}");

    let poison_dir = queues_root.join("queue-extract-poison");
    let poisoned: Vec<_> = std::fs::read_dir(&poison_dir).unwrap().collect();
    assert_eq!(poisoned.len(), 1, "expected exactly one poisoned message under {}", Path::new(&poison_dir).display());
}
