// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline State Store Port
//!
//! Persists one [`DataPipeline`](crate::entities::DataPipeline) per
//! `(index, document_id)`, conventionally at the well-known key
//! `__pipeline_status.json` inside the document's artifact volume (see
//! §4.C and §6's persisted-layout table). A missing record is `Ok(None)`,
//! never an error; a record that fails to parse is surfaced as
//! [`MemoryError::InvalidPipelineData`](crate::error::MemoryError::InvalidPipelineData),
//! which the orchestrator treats as fatal while preserving the
//! document's artifacts for operator recovery.

use crate::entities::DataPipeline;
use crate::error::MemoryError;
use crate::value_objects::{DocumentId, IndexName};
use async_trait::async_trait;

#[async_trait]
pub trait PipelineStateStore: Send + Sync {
    async fn read(&self, index: &IndexName, document_id: &DocumentId) -> Result<Option<DataPipeline>, MemoryError>;

    /// Persists `pipeline` atomically - a reader never observes a
    /// torn write.
    async fn write(&self, pipeline: &DataPipeline) -> Result<(), MemoryError>;

    async fn delete(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError>;
}
