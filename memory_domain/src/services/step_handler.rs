// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Step Handler Port
//!
//! A handler is named by its `step_name` and consumes and mutates a
//! [`DataPipeline`] for exactly that step. The original design used
//! exceptions for control flow; this codebase replaces that with the
//! explicit [`HandlerOutcome`] sum the orchestrator switches on (see
//! REDESIGN FLAGS in §9).

use crate::entities::DataPipeline;
use crate::error::MemoryError;
use async_trait::async_trait;

/// The outcome of one step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The step finished; the orchestrator may advance `remaining_steps`.
    Success,
    /// A transient condition (e.g. a model endpoint timed out). The
    /// orchestrator retries without advancing the step.
    TransientError,
    /// A terminal condition for this execution. The orchestrator halts
    /// the pipeline and flags it failed.
    FatalError,
}

/// A pluggable step processor.
///
/// Contract (§4.D): on `Success`, the handler must have stamped every
/// `FileDetails.processed_by` it fully processed. On re-entry after a
/// `TransientError`, the handler must check
/// [`FileDetails::was_processed_by`](crate::entities::FileDetails::was_processed_by)
/// for itself before repeating any side effect observable outside the
/// artifact store - handlers are at-least-once and must be idempotent
/// under that re-entry.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// The step name this handler is registered under. Orchestrators key
    /// their handler registry and their per-step queue names on this.
    fn step_name(&self) -> &str;

    async fn invoke(&self, pipeline: &mut DataPipeline) -> Result<HandlerOutcome, MemoryError>;
}
