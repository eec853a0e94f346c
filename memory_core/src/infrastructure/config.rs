// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration
//!
//! Binds the deployment-shape variant tags (§9 REDESIGN FLAGS) and the
//! file-backed reference implementation's tunables via the `config`
//! crate, layered as TOML file then environment variable overrides
//! (`MEMORY__QUEUE__MAX_ATTEMPTS=5`, double underscore between
//! sections, matching `config`'s default `Environment` separator).
//!
//! Only `ContentStorageType::FileSystem`, `OrchestrationType::InProcess`
//! / `::Distributed`, and `QueueType::FileBased` have a concrete
//! implementation in this crate; the remaining variants round out the
//! recognized configuration surface for a deployment that plugs in
//! collaborators this crate doesn't carry (Azure Blobs, RabbitMQ, and
//! the embedding/vector-db/text-generation backends are all out of
//! scope here).

use std::path::PathBuf;

use semantic_memory_domain::error::MemoryError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ContentStorageType {
    AzureBlobs,
    FileSystem,
}

impl Default for ContentStorageType {
    fn default() -> Self {
        Self::FileSystem
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OrchestrationType {
    InProcess,
    Distributed,
}

impl Default for OrchestrationType {
    fn default() -> Self {
        Self::InProcess
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueType {
    AzureQueue,
    RabbitMq,
    FileBased,
}

impl Default for QueueType {
    fn default() -> Self {
        Self::FileBased
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum EmbeddingGeneratorType {
    AzureOpenAi,
    OpenAi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum VectorDbType {
    AzureCognitiveSearch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TextGeneratorType {
    AzureOpenAi,
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub fetch_batch_size: u32,
    pub fetch_lock_seconds: u64,
    pub max_attempts: u32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { fetch_batch_size: 10, fetch_lock_seconds: 300, max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub content_storage_type: ContentStorageType,
    pub orchestration_type: OrchestrationType,
    pub queue_type: QueueType,
    pub embedding_generator_type: Option<EmbeddingGeneratorType>,
    pub vector_db_type: Option<VectorDbType>,
    pub text_generator_type: Option<TextGeneratorType>,
    pub queue: QueueSettings,
    pub storage_root: PathBuf,
    pub content_database_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            content_storage_type: ContentStorageType::default(),
            orchestration_type: OrchestrationType::default(),
            queue_type: QueueType::default(),
            embedding_generator_type: None,
            vector_db_type: None,
            text_generator_type: None,
            queue: QueueSettings::default(),
            storage_root: PathBuf::from("./data"),
            content_database_path: PathBuf::from("./data/content.db"),
        }
    }
}

impl Settings {
    /// Loads settings from an optional TOML file with environment
    /// overrides layered on top, falling back entirely to defaults when
    /// no file is present - same "missing file is not an error" posture
    /// the teacher's observability config loader takes.
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self, MemoryError> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(config::Environment::with_prefix("MEMORY").separator("__"));

        let raw = builder.build().map_err(|e| MemoryError::configuration(e.to_string()))?;
        let settings: Settings = raw.try_deserialize().map_err(|e| MemoryError::configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), MemoryError> {
        if self.queue.fetch_batch_size == 0 {
            return Err(MemoryError::configuration("queue.fetch_batch_size must be greater than zero"));
        }
        if self.queue.max_attempts == 0 {
            return Err(MemoryError::configuration("queue.max_attempts must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let settings = Settings::load(Some(std::path::Path::new("/nonexistent/does-not-exist.toml"))).unwrap();
        assert_eq!(settings.queue.max_attempts, 3);
        assert_eq!(settings.content_storage_type, ContentStorageType::FileSystem);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "storage_root = \"/tmp/memory-data\"").unwrap();
        writeln!(file, "[queue]").unwrap();
        writeln!(file, "max_attempts = 7").unwrap();
        file.flush().unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.queue.max_attempts, 7);
        assert_eq!(settings.storage_root, PathBuf::from("/tmp/memory-data"));
    }

    #[test]
    fn zero_max_attempts_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queue]").unwrap();
        writeln!(file, "max_attempts = 0").unwrap();
        file.flush().unwrap();

        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, MemoryError::Configuration(_)));
    }
}
