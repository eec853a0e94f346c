// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Command Runner
//!
//! Wires a [`ValidatedCli`](semantic_memory_bootstrap::cli::ValidatedCli)
//! onto the [`Service`] port: builds the orchestrator named by
//! [`Settings::orchestration_type`], registers the reference step
//! handlers, and dispatches the parsed command. One transport, thin by
//! design - a deployment that wants HTTP fronts this same `Service`
//! with its own presentation layer instead of this one.

use std::path::Path;
use std::sync::Arc;

use semantic_memory_bootstrap::cli::{ValidatedCli, ValidatedCommand};
use semantic_memory_domain::entities::PendingFile;
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{AskQuery, SearchQuery};
use semantic_memory_domain::value_objects::{DocumentId, IndexName, TagCollection};

use crate::application::{DistributedOrchestrator, InProcessOrchestrator, QueueFactory, Service};
use crate::infrastructure::artifact_store::FileSystemArtifactStore;
use crate::infrastructure::config::{OrchestrationType, Settings};
use crate::infrastructure::handlers::{HashingEmbedder, NoopStepHandler, PurgePreviousExecutionsHandler, TextLengthPartitioner};
use crate::infrastructure::queue::FileSystemQueueFactory;
use crate::infrastructure::state_store::FileSystemStateStore;

/// The step sequence the `upload` command drives when the caller
/// doesn't supply one of its own. `extract` has no concrete handler in
/// this crate (§1 Non-goals) so it runs against [`NoopStepHandler`];
/// `partition`, `embed`, and `purge-previous-executions` are the
/// reference handlers this crate does carry.
const DEFAULT_UPLOAD_STEPS: &[&str] = &["extract", "partition", "embed", "purge-previous-executions"];

const PARTITION_CHUNK_SIZE: usize = 4096;

/// Builds the configured `Service` and registers the reference step
/// handlers under it. Returns the handle callers dispatch commands
/// against.
async fn build_service(settings: &Settings) -> Result<Arc<dyn Service>, MemoryError> {
    let state_store = Arc::new(FileSystemStateStore::new(settings.storage_root.join("pipelines")));
    let artifact_store = Arc::new(FileSystemArtifactStore::new(settings.storage_root.join("artifacts")));

    let service: Arc<dyn Service> = match settings.orchestration_type {
        OrchestrationType::InProcess => Arc::new(InProcessOrchestrator::new(state_store, artifact_store.clone(), None)),
        OrchestrationType::Distributed => {
            let queue_factory: Arc<dyn QueueFactory> = Arc::new(FileSystemQueueFactory::new(settings.storage_root.join("queues")));
            Arc::new(DistributedOrchestrator::new(state_store, artifact_store.clone(), queue_factory, None))
        }
    };

    service.add_handler(Arc::new(NoopStepHandler::new("extract"))).await?;
    service.add_handler(Arc::new(TextLengthPartitioner::new(artifact_store.clone(), PARTITION_CHUNK_SIZE))).await?;
    service.add_handler(Arc::new(HashingEmbedder::new(artifact_store.clone()))).await?;
    service.add_handler(Arc::new(PurgePreviousExecutionsHandler::new(artifact_store))).await?;

    Ok(service)
}

fn read_upload_tags(raw: &[(String, Vec<String>)]) -> Result<TagCollection, MemoryError> {
    let mut tags = TagCollection::new();
    for (key, values) in raw {
        for value in values {
            tags.insert(key.clone(), value.clone())?;
        }
    }
    Ok(tags)
}

async fn read_pending_file(path: &Path) -> Result<PendingFile, MemoryError> {
    let bytes = tokio::fs::read(path).await?;
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("upload.bin").to_string();
    // MIME detection is out of scope (§1 Non-goals); every uploaded file
    // is tagged generic binary and left for a handler to reinterpret.
    Ok(PendingFile { name, mime_type: "application/octet-stream".to_string(), bytes })
}

/// Runs one validated CLI command to completion, printing its result to
/// stdout. The caller maps the returned `Result` to a process exit code
/// via [`semantic_memory_bootstrap::map_error_to_exit_code`].
pub async fn run(cli: ValidatedCli) -> Result<(), MemoryError> {
    crate::infrastructure::logging::init(cli.verbose).map_err(MemoryError::configuration)?;

    let settings = Settings::load(cli.config.as_deref())?;
    let service = build_service(&settings).await?;

    match cli.command {
        ValidatedCommand::Upload { input, index, document_id, tags } => {
            let index = IndexName::new(index)?;
            let document_id = document_id.map(DocumentId::new).transpose()?;
            let tags = read_upload_tags(&tags)?;
            let file = read_pending_file(&input).await?;

            let steps: Vec<String> = DEFAULT_UPLOAD_STEPS.iter().map(|s| s.to_string()).collect();
            let document_id = service.upload(index, document_id, steps, tags, vec![file]).await?;
            println!("accepted documentId={}", document_id.as_str());
        }

        ValidatedCommand::Status { index, document_id } => {
            let index = IndexName::new(index)?;
            let document_id = DocumentId::new(document_id)?;
            match service.upload_status(&index, &document_id).await? {
                Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
                None => return Err(MemoryError::not_found("pipeline", document_id.as_str())),
            }
        }

        ValidatedCommand::DeleteDocument { index, document_id } => {
            let index = IndexName::new(index)?;
            let document_id = DocumentId::new(document_id)?;
            service.start_document_deletion(&index, &document_id).await?;
            println!("deleted index={} documentId={}", index.as_str(), document_id.as_str());
        }

        ValidatedCommand::DeleteIndex { index, force } => {
            if !force {
                return Err(MemoryError::validation("force", "delete-index requires --force to proceed"));
            }
            let index = IndexName::new(index)?;
            service.start_index_deletion(&index).await?;
            println!("deletion started index={}", index.as_str());
        }

        ValidatedCommand::Search { index, query, limit } => {
            let index = IndexName::new(index)?;
            let results = service
                .search(SearchQuery { index, query, filters: TagCollection::new(), limit, min_relevance: 0.0 })
                .await?;
            println!("{}", serde_json::to_string_pretty(&results.into_iter().map(|r| serde_json::json!({
                "contentId": r.content_id,
                "relevance": r.relevance,
                "snippet": r.snippet,
            })).collect::<Vec<_>>())?);
        }

        ValidatedCommand::Ask { index, question } => {
            let index = IndexName::new(index)?;
            let answer = service.ask(AskQuery { index, question, filters: TagCollection::new(), min_relevance: 0.0 }).await?;
            println!("{}", answer.answer);
            for source in answer.sources {
                println!("  source: {} ({:.2})", source.content_id, source.relevance);
            }
        }

        ValidatedCommand::QueueInspect { queue } => {
            // The file-backed queue has no out-of-band inspection API of
            // its own (§2); report the handlers this process knows
            // about so an operator can confirm the named step is wired.
            let known = service.handler_names();
            println!("queue={queue} registered_steps={known:?}");
        }
    }

    Ok(())
}
