// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Search Client Port
//!
//! The query-time counterpart of the ingestion pipeline: reads the
//! vector/search backends a document's embeddings were written into and,
//! for `ask`, additionally calls an external text generator to produce a
//! grounded answer. Contract only - concrete embedding providers, vector
//! databases, and text generators are explicitly out of scope (§1).

use crate::value_objects::{IndexName, TagCollection};
use crate::error::MemoryError;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub index: IndexName,
    pub query: String,
    pub filters: TagCollection,
    pub limit: usize,
    pub min_relevance: f32,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content_id: String,
    pub relevance: f32,
    pub snippet: String,
}

#[derive(Debug, Clone)]
pub struct AskQuery {
    pub index: IndexName,
    pub question: String,
    pub filters: TagCollection,
    pub min_relevance: f32,
}

#[derive(Debug, Clone)]
pub struct AskAnswer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

#[async_trait]
pub trait SearchClient: Send + Sync {
    /// Returns an empty list - never an error - when nothing in `index`
    /// clears `min_relevance`, including when `index` has no ingested
    /// documents at all (§8 scenario 6).
    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>, MemoryError>;

    async fn ask(&self, query: AskQuery) -> Result<AskAnswer, MemoryError>;
}
