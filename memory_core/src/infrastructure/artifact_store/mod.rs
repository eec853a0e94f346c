// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Filesystem Artifact Store
//!
//! Implements [`ArtifactStore`] (§4.B) over a plain directory tree: a
//! volume is `<root>/<index>/<document_id>/`, and a key within it is
//! just a relative file name. Writes replace-on-conflict via a
//! write-to-temp-then-rename so a reader never observes a half-written
//! file; reads of a missing key surface as `MemoryError::NotFound`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{ArtifactMetadata, ArtifactStore};
use semantic_memory_domain::value_objects::{DocumentId, IndexName};
use tokio::fs;

pub struct FileSystemArtifactStore {
    root: PathBuf,
}

impl FileSystemArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn volume_dir(&self, index: &IndexName, document_id: &DocumentId) -> PathBuf {
        self.root.join(index.as_str()).join(document_id.as_str())
    }

    fn file_path(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> PathBuf {
        self.volume_dir(index, document_id).join(file_name)
    }

    async fn guess_mime(file_name: &str) -> String {
        match Path::new(file_name).extension().and_then(|e| e.to_str()) {
            Some("txt") => "text/plain",
            Some("json") => "application/json",
            Some("pdf") => "application/pdf",
            Some("html" | "htm") => "text/html",
            _ => "application/octet-stream",
        }
        .to_string()
    }
}

#[async_trait]
impl ArtifactStore for FileSystemArtifactStore {
    async fn create_volume(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError> {
        fs::create_dir_all(self.volume_dir(index, document_id)).await?;
        Ok(())
    }

    async fn write_bytes(&self, index: &IndexName, document_id: &DocumentId, file_name: &str, bytes: &[u8]) -> Result<(), MemoryError> {
        let dir = self.volume_dir(index, document_id);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(file_name);
        let tmp = dir.join(format!(".{file_name}.tmp"));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_bytes(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> Result<Vec<u8>, MemoryError> {
        let path = self.file_path(index, document_id, file_name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MemoryError::not_found("artifact", file_name)),
            Err(e) => Err(e.into()),
        }
    }

    async fn metadata(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> Result<ArtifactMetadata, MemoryError> {
        let path = self.file_path(index, document_id, file_name);
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(MemoryError::not_found("artifact", file_name)),
            Err(e) => return Err(e.into()),
        };
        Ok(ArtifactMetadata { size: meta.len(), mime_type: Self::guess_mime(file_name).await })
    }

    async fn delete_file(&self, index: &IndexName, document_id: &DocumentId, file_name: &str) -> Result<(), MemoryError> {
        let path = self.file_path(index, document_id, file_name);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_file_names(&self, index: &IndexName, document_id: &DocumentId) -> Result<Vec<String>, MemoryError> {
        let dir = self.volume_dir(index, document_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                // Hidden temp files and the `__`-prefixed pipeline state
                // record live in the same directory but are not artifacts
                // a handler should see when listing a document's files.
                if !name.starts_with('.') && !name.starts_with("__") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_volume(&self, index: &IndexName, document_id: &DocumentId) -> Result<(), MemoryError> {
        let dir = self.volume_dir(index, document_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> IndexName {
        IndexName::new("personal").unwrap()
    }

    fn doc() -> DocumentId {
        DocumentId::new("doc-001").unwrap()
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemArtifactStore::new(dir.path());
        store.write_text(&index(), &doc(), "hello.txt", "hello world").await.unwrap();
        assert_eq!(store.read_text(&index(), &doc(), "hello.txt").await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn reading_a_missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemArtifactStore::new(dir.path());
        let err = store.read_bytes(&index(), &doc(), "missing.txt").await.unwrap_err();
        assert!(matches!(err, MemoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn writes_replace_on_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemArtifactStore::new(dir.path());
        store.write_text(&index(), &doc(), "hello.txt", "first").await.unwrap();
        store.write_text(&index(), &doc(), "hello.txt", "second").await.unwrap();
        assert_eq!(store.read_text(&index(), &doc(), "hello.txt").await.unwrap(), "second");
    }

    #[tokio::test]
    async fn delete_volume_removes_every_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemArtifactStore::new(dir.path());
        store.write_text(&index(), &doc(), "a.txt", "a").await.unwrap();
        store.write_text(&index(), &doc(), "b.txt", "b").await.unwrap();
        store.delete_volume(&index(), &doc()).await.unwrap();
        assert_eq!(store.list_file_names(&index(), &doc()).await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn list_file_names_hides_hidden_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSystemArtifactStore::new(dir.path());
        store.write_text(&index(), &doc(), "a.txt", "a").await.unwrap();
        let names = store.list_file_names(&index(), &doc()).await.unwrap();
        assert_eq!(names, vec!["a.txt".to_string()]);
    }
}
