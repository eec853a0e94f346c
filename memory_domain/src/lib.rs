// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Semantic Memory Domain
//!
//! Pure, reusable business logic for the semantic memory ingestion and
//! retrieval service: entities, value objects, and the infrastructure
//! ports (traits) that the application and infrastructure layers
//! implement.
//!
//! ## Layout
//!
//! - `error` - `MemoryError`, the single error type threaded through every
//!   layer above this one.
//! - `value_objects` - `ExecutionId`, `DocumentId`, `IndexName`,
//!   `TagCollection`, `ContentHash`.
//! - `entities` - `DataPipeline`, `DataPipelinePointer`,
//!   `DataPipelineStatus`, `FileDetails`, `FileRecord`, `LogEntry`.
//! - `services` - async traits (`Queue`, `ArtifactStore`,
//!   `PipelineStateStore`, `StepHandler`, `ContentStorageService`,
//!   `SearchClient`) that infrastructure adapters implement and the
//!   application layer depends on.
//!
//! This crate never touches a filesystem, a socket, or a database. It
//! describes *what* the system is made of; `semantic-memory-core` wires
//! concrete adapters to it.

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

pub use error::MemoryError;
