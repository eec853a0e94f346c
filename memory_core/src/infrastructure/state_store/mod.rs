// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Filesystem Pipeline State Store
//!
//! Implements [`PipelineStateStore`] (§4.C): one `DataPipeline` JSON
//! document at `__pipeline_status.json` inside the document's artifact
//! volume, `<root>/<index>/<document_id>/`. Shares its root with
//! [`FileSystemArtifactStore`](crate::infrastructure::artifact_store::FileSystemArtifactStore)
//! by convention rather than by going through that trait, since the
//! record is bookkeeping the artifact store's own listing deliberately
//! hides from handlers.

use std::path::PathBuf;

use async_trait::async_trait;
use semantic_memory_domain::entities::DataPipeline;
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::PipelineStateStore;
use semantic_memory_domain::value_objects::{DocumentId, IndexName};
use tokio::fs;

const STATE_FILE_NAME: &str = "__pipeline_status.json";

pub struct FileSystemStateStore {
    root: PathBuf,
}

impl FileSystemStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, index: &IndexName, document_id: &DocumentId) -> PathBuf {
        self.root.join(index.as_str()).join(document_id.as_str()).join(STATE_FILE_NAME)
    }
}

#[async_trait]
impl PipelineStateStore for FileSystemStateStore {
    async fn read(&self, index: &IndexName, document_id: &DocumentId) -> Result<Option<DataPipeline>, MemoryError> {
        let path = self.path(index, document_id);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            MemoryError::invalid_pipeline_data(index.as_str(), document_id.as_str(), e.to_string())
        })
    }

    async fn write(&self, pipeline: &DataPipeline) -> Result<(), MemoryError> {
        let document_id = pipeline
            .document_id
            .as_ref()
            .ok_or_else(|| MemoryError::orchestration("cannot persist a pipeline with no document_id via the keyed state store"))?;
        let path = self.path(&pipeline.index, document_id);
        let dir = path.parent().expect("path always has a parent under root");
        fs::create_dir_all(dir).await?;

        let bytes = serde_json::to_vec_pretty(pipeline)?;
        let tmp = dir.join(format!(".{STATE_FILE_NAME}.tmp"));
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn delete(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError> {
        let path = self.path(index, document_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
