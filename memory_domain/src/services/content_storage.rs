// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Content Storage Service Port
//!
//! The external-facing upsert/delete surface used by clients and by
//! upload handlers, backed by the two-phase queued write model of §4.G:
//! phase one synchronously records an Operation and returns a
//! `content_id`; phase two drains Operations in timestamp order, with
//! each processed operation cancelling all strictly earlier, not-yet-
//! complete operations on the same `content_id` (last-write-wins).
//! `get_by_id` only ever observes committed rows, never a pending
//! Operation.

use crate::value_objects::{DocumentId, IndexName, TagCollection};
use crate::error::MemoryError;
use async_trait::async_trait;

/// A request to create or replace one piece of retrievable content.
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    /// Caller-supplied id, or `None` to have one generated.
    pub content_id: Option<String>,
    pub index: IndexName,
    pub document_id: DocumentId,
    pub tags: TagCollection,
    pub payload: serde_json::Value,
}

/// A committed content row. Never partially written - `get_by_id` never
/// returns a row for an Operation still in flight.
#[derive(Debug, Clone)]
pub struct ContentRecord {
    pub content_id: String,
    pub index: IndexName,
    pub document_id: DocumentId,
    pub tags: TagCollection,
    pub payload: serde_json::Value,
    pub updated: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait ContentStorageService: Send + Sync {
    /// Phase 1: accepts the request and returns its `content_id`. Always
    /// succeeds if the Operation row can be written; does not wait for
    /// phase 2 to commit it.
    async fn upsert(&self, request: UpsertRequest) -> Result<String, MemoryError>;

    /// Phase 1 of a delete: enqueues an Operation that, once processed,
    /// cancels all prior pending operations for `content_id` and removes
    /// the committed row.
    async fn delete(&self, content_id: &str) -> Result<(), MemoryError>;

    /// Reads the committed row only. `Ok(None)` for an unknown or
    /// already-deleted `content_id` - never an error.
    async fn get_by_id(&self, content_id: &str) -> Result<Option<ContentRecord>, MemoryError>;

    async fn count(&self) -> Result<u64, MemoryError>;
}
