// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Ports
//!
//! Async traits the application layer depends on and the infrastructure
//! layer implements: [`Queue`], [`ArtifactStore`], [`PipelineStateStore`],
//! [`StepHandler`], [`ContentStorageService`], [`SearchClient`]. None of
//! these traits are implemented in this crate - the domain layer describes
//! the contract only, so it never links against a filesystem, a socket, or
//! a database driver.

pub mod artifact_store;
pub mod content_storage;
pub mod pipeline_state_store;
pub mod queue;
pub mod search_client;
pub mod step_handler;

pub use artifact_store::{ArtifactMetadata, ArtifactStore};
pub use content_storage::{ContentRecord, ContentStorageService, UpsertRequest};
pub use pipeline_state_store::PipelineStateStore;
pub use queue::{DequeueHandler, DequeueOutcome, Queue, QueueMessage, QueueOptions};
pub use search_client::{AskAnswer, AskQuery, SearchClient, SearchQuery, SearchResult};
pub use step_handler::{HandlerOutcome, StepHandler};
