// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Identifies one run of a [`DataPipeline`](crate::entities::DataPipeline)
//! through a document. A document re-ingested later gets a new
//! `ExecutionId`; the orchestrator uses it to detect and supersede
//! stale, in-flight executions for the same document.

use super::generic_id::{GenericId, IdCategory};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionIdCategory;

impl IdCategory for ExecutionIdCategory {
    fn category_name() -> &'static str {
        "execution"
    }
}

pub type ExecutionId = GenericId<ExecutionIdCategory>;
