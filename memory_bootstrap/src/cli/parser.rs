// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Command-line interface parsing using clap.
//!
//! This module defines the CLI structure and handles argument parsing.
//! Security validation happens in the validator module after parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Main CLI structure
#[derive(Parser, Debug, Clone)]
#[command(name = "memory")]
#[command(about = concat!("Semantic Memory v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the queue dispatch worker pool size
    ///
    /// Controls how many messages the in-process orchestrator dispatches
    /// concurrently. Default: number of CPUs.
    #[arg(long)]
    pub cpu_threads: Option<usize>,

    /// Override the file-backed queue polling concurrency
    ///
    /// Controls how many cooperating workers poll the same queue root
    /// (§5 "Concurrency model"). Default: 1.
    #[arg(long)]
    pub io_threads: Option<usize>,

    /// Orchestration mode override: `in-process` or `distributed`
    #[arg(long, value_parser = parse_orchestration_type)]
    pub storage_type: Option<String>,

    /// Dequeue batch size (messages fetched per poll)
    ///
    /// Default: 10 (§2 `QueueOptions.fetchBatchSize`).
    #[arg(long, default_value = "10")]
    pub channel_depth: usize,
}

/// CLI subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Enqueue a document for ingestion (§4.B "upload")
    Upload {
        /// Path to the document's raw content
        #[arg(short, long)]
        input: PathBuf,

        /// Target index name
        #[arg(short, long)]
        index: String,

        /// Stable document id within the index (generated if omitted)
        #[arg(short, long)]
        document_id: Option<String>,

        /// Tags as `key=value1,value2` pairs, repeatable
        #[arg(long)]
        tag: Vec<String>,
    },

    /// Show a pipeline's current status (§4.D "status")
    Status {
        /// Target index name
        #[arg(short, long)]
        index: String,

        /// Document id to look up
        #[arg(short, long)]
        document_id: String,
    },

    /// Remove a single document from an index (§4.E "deleteDocument")
    DeleteDocument {
        /// Target index name
        #[arg(short, long)]
        index: String,

        /// Document id to remove
        #[arg(short, long)]
        document_id: String,
    },

    /// Remove an entire index (§4.E "deleteIndex")
    DeleteIndex {
        /// Index name to remove
        #[arg(short, long)]
        index: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Run a similarity search over an index (§4.F "search")
    Search {
        /// Target index name
        #[arg(short, long)]
        index: String,

        /// Free-text query
        #[arg(short, long)]
        query: String,

        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Ask a question answered from retrieved context (§4.F "ask")
    Ask {
        /// Target index name
        #[arg(short, long)]
        index: String,

        /// Natural-language question
        #[arg(short, long)]
        question: String,
    },

    /// Inspect queue depth, in-flight, and poison-queue counts (§2, §11)
    QueueInspect {
        /// Queue name to inspect
        #[arg(short, long)]
        queue: String,
    },
}

/// Parse and validate orchestration mode from CLI argument
fn parse_orchestration_type(s: &str) -> Result<String, String> {
    match s.to_lowercase().as_str() {
        "in-process" | "distributed" => Ok(s.to_lowercase()),
        _ => Err(format!(
            "Invalid orchestration mode '{}'. Valid options: in-process, distributed",
            s
        )),
    }
}

/// Parse CLI arguments
///
/// # Panics
///
/// Clap will exit the process with an appropriate error message if parsing
/// fails, including `--help` and `--version`.
pub fn parse_cli() -> Cli {
    Cli::parse()
}
