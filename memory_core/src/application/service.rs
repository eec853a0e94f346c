// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Service Port
//!
//! Replaces the HTTP-framework-plus-DI-container shape the distillation
//! warns against (§REDESIGN FLAGS): one trait both orchestrator
//! execution modes implement, fronted by whatever thin transport a
//! deployment chooses. `memory_core`'s own CLI (`presentation::cli`) is
//! one such caller; it is not the only one this trait is designed for.

use std::sync::Arc;

use async_trait::async_trait;
use semantic_memory_domain::entities::{DataPipelineStatus, PendingFile};
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{AskAnswer, AskQuery, Queue, SearchQuery, SearchResult, StepHandler};
use semantic_memory_domain::value_objects::{DocumentId, IndexName, TagCollection};

/// Looks up (and lazily connects) the named queue a step's messages
/// travel on. Exists so the application layer depends on `Queue`
/// without knowing whether it's backed by the file-based reference
/// implementation or something else a deployment plugs in.
#[async_trait]
pub trait QueueFactory: Send + Sync {
    async fn queue_for(&self, name: &str) -> Result<Arc<dyn Queue>, MemoryError>;
}

/// The orchestrator API surface common to both execution modes (§4.E,
/// §4.F). `upload` returns once the pipeline has been accepted and
/// durably recorded - for the in-process mode that means fully run to
/// completion or failure; for the distributed mode it means the first
/// step's pointer has been enqueued.
#[async_trait]
pub trait Service: Send + Sync {
    /// Registers a step handler. Fails if a handler for that step name
    /// is already registered - re-registration is a configuration
    /// error, not a silent replacement (§9 Open Question decision).
    async fn add_handler(&self, handler: Arc<dyn StepHandler>) -> Result<(), MemoryError>;

    async fn upload(
        &self,
        index: IndexName,
        document_id: Option<DocumentId>,
        steps: Vec<String>,
        tags: TagCollection,
        files: Vec<PendingFile>,
    ) -> Result<DocumentId, MemoryError>;

    async fn upload_status(&self, index: &IndexName, document_id: &DocumentId) -> Result<Option<DataPipelineStatus>, MemoryError>;

    async fn is_document_ready(&self, index: &IndexName, document_id: &DocumentId) -> Result<bool, MemoryError>;

    async fn start_document_deletion(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError>;

    async fn start_index_deletion(&self, index: &IndexName) -> Result<(), MemoryError>;

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>, MemoryError>;

    async fn ask(&self, query: AskQuery) -> Result<AskAnswer, MemoryError>;

    fn handler_names(&self) -> Vec<String>;
}
