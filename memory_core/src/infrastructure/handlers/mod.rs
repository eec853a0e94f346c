// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Reference Step Handlers
//!
//! Concrete [`StepHandler`] implementations. The real extractors,
//! partitioners, embedders, and generators a production deployment
//! plugs in are out of scope (§1 Non-goals); these are the reference
//! handlers needed to exercise the orchestrator end to end and the one
//! handler every deployment needs regardless of backend:
//! [`PurgePreviousExecutionsHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use semantic_memory_domain::entities::DataPipeline;
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{ArtifactStore, HandlerOutcome, StepHandler};
use semantic_memory_domain::value_objects::ContentHash;

/// A handler that does nothing but stamp every file processed, for
/// steps whose real behavior this crate does not implement. Useful as
/// a placeholder while wiring a pipeline's step list, and in tests.
pub struct NoopStepHandler {
    step_name: String,
}

impl NoopStepHandler {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self { step_name: step_name.into() }
    }
}

#[async_trait]
impl StepHandler for NoopStepHandler {
    fn step_name(&self) -> &str {
        &self.step_name
    }

    async fn invoke(&self, pipeline: &mut DataPipeline) -> Result<HandlerOutcome, MemoryError> {
        for file in &mut pipeline.files {
            if file.is_original() && !file.was_processed_by(&self.step_name) {
                file.mark_processed_by(&self.step_name);
                file.append_log(&self.step_name, "no-op");
            }
        }
        Ok(HandlerOutcome::Success)
    }
}

/// Splits every original file's text content into fixed-size chunks,
/// writing each chunk back to the artifact store as a `Generated` file
/// and registering it on the pipeline. Idempotent across re-entry: a
/// file already marked processed by this step is skipped rather than
/// re-partitioned, so a retried delivery does not duplicate chunks.
pub struct TextLengthPartitioner {
    artifact_store: Arc<dyn ArtifactStore>,
    chunk_size: usize,
}

impl TextLengthPartitioner {
    pub const STEP_NAME: &'static str = "partition";

    pub fn new(artifact_store: Arc<dyn ArtifactStore>, chunk_size: usize) -> Self {
        Self { artifact_store, chunk_size: chunk_size.max(1) }
    }
}

#[async_trait]
impl StepHandler for TextLengthPartitioner {
    fn step_name(&self) -> &str {
        Self::STEP_NAME
    }

    async fn invoke(&self, pipeline: &mut DataPipeline) -> Result<HandlerOutcome, MemoryError> {
        let originals: Vec<String> =
            pipeline.files.iter().filter(|f| f.is_original() && !f.was_processed_by(Self::STEP_NAME)).map(|f| f.name.clone()).collect();

        for name in originals {
            let bytes = self.artifact_store.read_bytes(&pipeline.index, pipeline.document_id.as_ref().expect("partition step requires a document"), &name).await?;
            let text = String::from_utf8_lossy(&bytes);

            let mut generated = Vec::new();
            for (index, chunk) in text.as_bytes().chunks(self.chunk_size).enumerate() {
                let chunk_name = format!("{name}.partition.{index}.txt");
                self.artifact_store
                    .write_bytes(&pipeline.index, pipeline.document_id.as_ref().expect("partition step requires a document"), &chunk_name, chunk)
                    .await?;
                generated.push(semantic_memory_domain::entities::FileDetails::generated(
                    chunk_name,
                    chunk.len() as u64,
                    "text/plain",
                    name.clone(),
                    ContentHash::of(chunk),
                ));
            }

            if let Some(file) = pipeline.files.iter_mut().find(|f| f.name == name) {
                file.mark_processed_by(Self::STEP_NAME);
                file.append_log(Self::STEP_NAME, format!("split into {} chunks", generated.len()));
            }
            pipeline.files.extend(generated);
        }

        Ok(HandlerOutcome::Success)
    }
}

/// Stands in for a real embedding generator (Non-goal): stamps each
/// generated chunk with the content hash of its bytes as a
/// deterministic, dependency-free placeholder "embedding".
pub struct HashingEmbedder {
    artifact_store: Arc<dyn ArtifactStore>,
}

impl HashingEmbedder {
    pub const STEP_NAME: &'static str = "embed";

    pub fn new(artifact_store: Arc<dyn ArtifactStore>) -> Self {
        Self { artifact_store }
    }
}

#[async_trait]
impl StepHandler for HashingEmbedder {
    fn step_name(&self) -> &str {
        Self::STEP_NAME
    }

    async fn invoke(&self, pipeline: &mut DataPipeline) -> Result<HandlerOutcome, MemoryError> {
        let targets: Vec<String> =
            pipeline.files.iter().filter(|f| !f.is_original() && !f.was_processed_by(Self::STEP_NAME)).map(|f| f.name.clone()).collect();

        for (index, name) in targets.iter().enumerate() {
            let bytes = self
                .artifact_store
                .read_bytes(&pipeline.index, pipeline.document_id.as_ref().expect("embed step requires a document"), name)
                .await?;
            let hash = ContentHash::of(&bytes);
            self.artifact_store
                .write_text(
                    &pipeline.index,
                    pipeline.document_id.as_ref().expect("embed step requires a document"),
                    &format!("{name}.{}.{index}.txt", Self::STEP_NAME),
                    hash.as_str(),
                )
                .await?;
        }

        for name in &targets {
            if let Some(file) = pipeline.files.iter_mut().find(|f| &f.name == name) {
                file.mark_processed_by(Self::STEP_NAME);
                file.append_log(Self::STEP_NAME, "embedding placeholder written");
            }
        }

        Ok(HandlerOutcome::Success)
    }
}

/// Drains `previous_executions_to_purge`, deleting every artifact a
/// superseded execution produced. Resolves the lazy-purge Open
/// Question: supersession only marks executions for purge; this
/// handler is what actually removes their files, run as an ordinary
/// step so it benefits from the same at-least-once retry semantics as
/// any other step.
pub struct PurgePreviousExecutionsHandler {
    artifact_store: Arc<dyn ArtifactStore>,
}

impl PurgePreviousExecutionsHandler {
    pub const STEP_NAME: &'static str = "purge-previous-executions";

    pub fn new(artifact_store: Arc<dyn ArtifactStore>) -> Self {
        Self { artifact_store }
    }
}

#[async_trait]
impl StepHandler for PurgePreviousExecutionsHandler {
    fn step_name(&self) -> &str {
        Self::STEP_NAME
    }

    async fn invoke(&self, pipeline: &mut DataPipeline) -> Result<HandlerOutcome, MemoryError> {
        let document_id = pipeline.document_id.as_ref().expect("purge step requires a document").clone();
        let previous = std::mem::take(&mut pipeline.previous_executions_to_purge);

        for execution in previous {
            for file_name in &execution.file_names {
                self.artifact_store.delete_file(&pipeline.index, &document_id, file_name).await?;
            }
        }

        Ok(HandlerOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semantic_memory_domain::entities::PreviousExecution;
    use semantic_memory_domain::value_objects::{DocumentId, ExecutionId, IndexName, TagCollection};

    fn index() -> IndexName {
        IndexName::new("personal").unwrap()
    }

    fn doc() -> DocumentId {
        DocumentId::new("doc-001").unwrap()
    }

    #[tokio::test]
    async fn partitioner_splits_text_into_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> = Arc::new(crate::infrastructure::artifact_store::FileSystemArtifactStore::new(dir.path()));
        store.write_text(&index(), &doc(), "doc.txt", "abcdefghij").await.unwrap();

        let mut pipeline = DataPipeline::new_upload(index(), doc(), vec![TextLengthPartitioner::STEP_NAME.into()], TagCollection::new(), vec![]).unwrap();
        pipeline.files.push(semantic_memory_domain::entities::FileDetails::original("doc.txt", 10, "text/plain"));

        let partitioner = TextLengthPartitioner::new(store, 4);
        let outcome = partitioner.invoke(&mut pipeline).await.unwrap();

        assert_eq!(outcome, HandlerOutcome::Success);
        assert_eq!(pipeline.files.len(), 1 + 3);
        assert!(pipeline.files[0].was_processed_by(TextLengthPartitioner::STEP_NAME));
    }

    #[tokio::test]
    async fn partitioner_skips_files_already_processed() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> = Arc::new(crate::infrastructure::artifact_store::FileSystemArtifactStore::new(dir.path()));
        store.write_text(&index(), &doc(), "doc.txt", "abcd").await.unwrap();

        let mut pipeline = DataPipeline::new_upload(index(), doc(), vec![TextLengthPartitioner::STEP_NAME.into()], TagCollection::new(), vec![]).unwrap();
        let mut file = semantic_memory_domain::entities::FileDetails::original("doc.txt", 4, "text/plain");
        file.mark_processed_by(TextLengthPartitioner::STEP_NAME);
        pipeline.files.push(file);

        let partitioner = TextLengthPartitioner::new(store, 4);
        partitioner.invoke(&mut pipeline).await.unwrap();

        assert_eq!(pipeline.files.len(), 1);
    }

    #[tokio::test]
    async fn purge_handler_deletes_every_superseded_file() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> = Arc::new(crate::infrastructure::artifact_store::FileSystemArtifactStore::new(dir.path()));
        store.write_text(&index(), &doc(), "old.part0", "x").await.unwrap();

        let mut pipeline =
            DataPipeline::new_upload(index(), doc(), vec![PurgePreviousExecutionsHandler::STEP_NAME.into()], TagCollection::new(), vec![]).unwrap();
        pipeline.previous_executions_to_purge.push(PreviousExecution { execution_id: ExecutionId::new(), file_names: vec!["old.part0".into()] });

        let handler = PurgePreviousExecutionsHandler::new(store.clone());
        handler.invoke(&mut pipeline).await.unwrap();

        assert!(pipeline.previous_executions_to_purge.is_empty());
        assert!(store.read_bytes(&index(), &doc(), "old.part0").await.is_err());
    }
}
