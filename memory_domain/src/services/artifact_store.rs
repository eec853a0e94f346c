// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Artifact Store Port
//!
//! A volume-scoped key/value blob store keyed by `(index, document_id,
//! file_name)`. Writes replace on conflict; reads of a missing key return
//! `MemoryError::NotFound`, never a generic I/O failure, so callers can
//! distinguish "not written yet" from "storage is broken." One file's
//! write is atomic; there is no cross-file atomicity, so handlers must
//! tolerate partial progress across a crash (see §5).

use crate::error::MemoryError;
use crate::value_objects::{DocumentId, IndexName};
use async_trait::async_trait;

/// Size and content-type metadata returned alongside a streamed read,
/// without requiring the caller to buffer the whole file first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactMetadata {
    pub size: u64,
    pub mime_type: String,
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Creates the `(index, document_id)` volume if it does not already
    /// exist. Idempotent.
    async fn create_volume(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError>;

    async fn write_bytes(
        &self,
        index: &IndexName,
        document_id: &DocumentId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<(), MemoryError>;

    async fn write_text(
        &self,
        index: &IndexName,
        document_id: &DocumentId,
        file_name: &str,
        text: &str,
    ) -> Result<(), MemoryError> {
        self.write_bytes(index, document_id, file_name, text.as_bytes()).await
    }

    /// Reads a file's full contents. Returns `MemoryError::NotFound` if
    /// no such key exists.
    async fn read_bytes(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> Result<Vec<u8>, MemoryError>;

    async fn read_text(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> Result<String, MemoryError> {
        let bytes = self.read_bytes(index, document_id, file_name).await?;
        String::from_utf8(bytes).map_err(|e| MemoryError::internal(format!("file is not valid UTF-8: {e}")))
    }

    async fn metadata(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> Result<ArtifactMetadata, MemoryError>;

    async fn delete_file(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> Result<(), MemoryError>;

    async fn list_file_names(&self, index: &IndexName, document_id: &DocumentId) -> Result<Vec<String>, MemoryError>;

    /// Deletes the entire volume and everything in it. Cascades: deleting
    /// a document's pipeline must call this so artifacts never outlive
    /// their owning pipeline (§3 ownership & lifecycle).
    async fn delete_volume(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError>;
}
