// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Semantic Memory Core
//!
//! Application, infrastructure, and presentation layers for the document
//! ingestion and retrieval pipeline: both orchestrator execution modes
//! (§4.E in-process, §4.F distributed), the file-backed reference
//! implementations of the queue, artifact store, and pipeline state
//! store ports, the content storage service's two-phase queued write
//! model (§4.G), and the `memory` binary's CLI surface.
//!
//! Layering follows the domain crate's Clean Architecture boundary:
//! `application` depends only on `semantic_memory_domain`'s ports,
//! `infrastructure` implements those ports, and `presentation` is the
//! thin translation between parsed CLI commands and the `Service` trait.

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use application::{QueueFactory, Service};
