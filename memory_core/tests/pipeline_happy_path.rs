// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! An upload driven end to end through the in-process orchestrator with
//! the real reference handlers wired in, mirroring the happy-path
//! scenario: extract (stand-in), partition, embed, purge.

use std::sync::Arc;

use semantic_memory_core::application::{InProcessOrchestrator, Service};
use semantic_memory_core::infrastructure::artifact_store::FileSystemArtifactStore;
use semantic_memory_core::infrastructure::handlers::{HashingEmbedder, NoopStepHandler, PurgePreviousExecutionsHandler, TextLengthPartitioner};
use semantic_memory_core::infrastructure::state_store::FileSystemStateStore;
use semantic_memory_domain::entities::PendingFile;
use semantic_memory_domain::services::ArtifactStore;
use semantic_memory_domain::value_objects::{DocumentId, IndexName, TagCollection};

#[tokio::test]
async fn upload_runs_extract_partition_embed_purge_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let artifact_store = Arc::new(FileSystemArtifactStore::new(dir.path().join("artifacts")));
    let state_store = Arc::new(FileSystemStateStore::new(dir.path().join("pipelines")));
    let orchestrator = InProcessOrchestrator::new(state_store, artifact_store.clone(), None);

    orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap();
    orchestrator.add_handler(Arc::new(TextLengthPartitioner::new(artifact_store.clone(), 5))).await.unwrap();
    orchestrator.add_handler(Arc::new(HashingEmbedder::new(artifact_store.clone()))).await.unwrap();
    orchestrator.add_handler(Arc::new(PurgePreviousExecutionsHandler::new(artifact_store.clone()))).await.unwrap();

    let index = IndexName::new("personal").unwrap();
    let document_id = DocumentId::new("doc-001").unwrap();
    let steps = vec!["extract".to_string(), "partition".to_string(), "embed".to_string(), "purge-previous-executions".to_string()];
    let files = vec![PendingFile { name: "hello.txt".into(), mime_type: "text/plain".into(), bytes: b"hello world".to_vec() }];

    let document_id = orchestrator.upload(index.clone(), Some(document_id), steps, TagCollection::new(), files).await.unwrap();

    let status = orchestrator.upload_status(&index, &document_id).await.unwrap().unwrap();
    assert!(status.completed);
    assert!(!status.failed);
    assert!(status.remaining_steps.is_empty());
    assert_eq!(status.completed_steps, vec!["extract", "partition", "embed", "purge-previous-executions"]);
    assert!(orchestrator.is_document_ready(&index, &document_id).await.unwrap());

    let names = artifact_store.list_file_names(&index, &document_id).await.unwrap();
    assert!(names.iter().any(|n| n == "hello.txt"), "original file should remain: {names:?}");
    assert!(names.iter().any(|n| n.starts_with("hello.txt.partition.") && n.ends_with(".txt")), "partitioner should have produced chunk files: {names:?}");
    assert!(names.iter().any(|n| n.contains(".embed.") && n.ends_with(".txt")), "embedder should have produced embedding files: {names:?}");
}

#[tokio::test]
async fn upload_with_no_files_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let artifact_store = Arc::new(FileSystemArtifactStore::new(dir.path().join("artifacts")));
    let state_store = Arc::new(FileSystemStateStore::new(dir.path().join("pipelines")));
    let orchestrator = InProcessOrchestrator::new(state_store, artifact_store, None);
    orchestrator.add_handler(Arc::new(NoopStepHandler::new("extract"))).await.unwrap();

    let index = IndexName::new("personal").unwrap();
    let document_id = DocumentId::new("doc-empty").unwrap();
    let err = orchestrator.upload(index, Some(document_id), vec!["extract".into()], TagCollection::new(), vec![]).await.unwrap_err();
    assert!(matches!(err, semantic_memory_domain::error::MemoryError::Validation { .. }));
}
