// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File-Backed Queue
//!
//! Reference implementation of the [`Queue`] port (§4.A): one JSON file
//! per message under `<root>/<name>/`, poisoned messages moved to the
//! sibling directory `<root>/<name><poison_suffix>/`.
//!
//! ## Delivery protocol
//!
//! Two cooperative tasks run per bound, dequeue-enabled queue:
//!
//! - **Polling loop** scans the bound directory for visible messages
//!   (`schedule <= now && lock_until <= now`), claims up to
//!   `fetch_batch_size` of them by bumping `deliveries` and extending
//!   `lock_until`, persists the claim, and hands each message to the
//!   dispatch loop over a channel.
//! - **Dispatch loop** invokes the registered handler and resolves the
//!   outcome: `Success` deletes the message; `TransientError` clears the
//!   lock and reschedules with linear backoff unless the retry budget is
//!   exhausted, in which case (like `FatalError`) the message moves to
//!   the poison directory.
//!
//! Both loops share a process-wide advisory lock keyed by the bound
//! directory (see [`directory_lock`]), so cooperating `FileQueue`
//! instances pointing at the same storage root never double-claim the
//! same message file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use semantic_memory_bootstrap::shutdown::{CancellationToken, ShutdownCoordinator};
use semantic_memory_domain::error::MemoryError;
use semantic_memory_domain::services::{DequeueHandler, DequeueOutcome, Queue, QueueMessage, QueueOptions};
use tokio::fs;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// Suffix appended to a queue's directory name to get its poison sibling.
pub const POISON_SUFFIX: &str = "-poison";

/// Default tick interval between polling passes.
const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(200);

/// Process-wide advisory locks, one per bound queue directory. Guards
/// storage scans so two `FileQueue` instances (in this process, or in
/// cooperating processes sharing the filesystem) never claim the same
/// visible message twice.
static DIRECTORY_LOCKS: LazyLock<SyncMutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>> = LazyLock::new(|| SyncMutex::new(HashMap::new()));

fn directory_lock(dir: &Path) -> Arc<AsyncMutex<()>> {
    let mut locks = DIRECTORY_LOCKS.lock();
    locks.entry(dir.to_path_buf()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
}

struct Bound {
    name: String,
    options: QueueOptions,
    dir: PathBuf,
    poison_dir: PathBuf,
}

/// A file-backed [`Queue`]. One instance binds to exactly one name via
/// [`Queue::connect`]; construct one `FileQueue` per step queue, all
/// pointing at the same `storage_root` so they share the advisory lock
/// namespace.
pub struct FileQueue {
    storage_root: PathBuf,
    bound: AsyncMutex<Option<Bound>>,
    handler: AsyncMutex<Option<Arc<dyn DequeueHandler>>>,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
    disposed: AtomicBool,
    poll_interval: std::time::Duration,
}

impl FileQueue {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            bound: AsyncMutex::new(None),
            handler: AsyncMutex::new(None),
            tasks: AsyncMutex::new(Vec::new()),
            // `CancellationToken` itself has no public constructor outside
            // `semantic-memory-bootstrap`; a throwaway coordinator is the
            // supported way to mint one. The token's shared state outlives
            // the coordinator, which is dropped immediately.
            cancel: ShutdownCoordinator::default().token(),
            disposed: AtomicBool::new(false),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Overrides the default 200ms polling tick. Integration tests use a
    /// shorter interval so retry/backoff scenarios don't need
    /// multi-second sleeps.
    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn message_path(dir: &Path, id: &str) -> PathBuf {
        dir.join(format!("{id}.sqm.json"))
    }

    async fn read_messages(dir: &Path) -> Result<Vec<(PathBuf, QueueMessage)>, MemoryError> {
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(dir).await?;
                return Ok(out);
            }
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = match fs::read(&path).await {
                Ok(b) => b,
                // Deleted by a cooperating worker between listing and read.
                Err(_) => continue,
            };
            if let Ok(message) = serde_json::from_slice::<QueueMessage>(&bytes) {
                out.push((path, message));
            }
        }
        out.sort_by(|a, b| a.1.id.cmp(&b.1.id));
        Ok(out)
    }

    async fn persist(path: &Path, message: &QueueMessage) -> Result<(), MemoryError> {
        let bytes = serde_json::to_vec_pretty(message)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn poison(path: &Path, poison_dir: &Path, message: &QueueMessage) -> Result<(), MemoryError> {
        fs::create_dir_all(poison_dir).await?;
        let target = Self::message_path(poison_dir, &message.id);
        let bytes = serde_json::to_vec_pretty(message)?;
        fs::write(&target, &bytes).await?;
        let _ = fs::remove_file(path).await;
        Ok(())
    }

    fn linear_backoff(deliveries: u32) -> chrono::Duration {
        chrono::Duration::seconds(deliveries.max(1) as i64)
    }

    async fn poll_once(dir: &Path, options: &QueueOptions, tx: &mpsc::Sender<(PathBuf, QueueMessage)>) -> Result<(), MemoryError> {
        let lock = directory_lock(dir);
        let _guard = lock.lock().await;

        let now = chrono::Utc::now();
        let mut visible: Vec<_> = Self::read_messages(dir).await?.into_iter().filter(|(_, m)| m.is_visible_at(now)).collect();
        visible.truncate(options.fetch_batch_size);

        for (path, mut message) in visible {
            message.deliveries += 1;
            message.lock_until = now + chrono::Duration::seconds(options.fetch_lock_seconds as i64);
            Self::persist(&path, &message).await?;
            if tx.send((path, message)).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn run_poll_loop(dir: PathBuf, options: QueueOptions, tx: mpsc::Sender<(PathBuf, QueueMessage)>, cancel: CancellationToken, interval: std::time::Duration) {
        loop {
            if cancel.is_cancelled() {
                break;
            }
            if let Err(e) = Self::poll_once(&dir, &options, &tx).await {
                tracing::warn!(target: "queue", error = %e, queue_dir = %dir.display(), "poll tick failed, retrying next tick");
            }
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = cancel.cancelled() => break,
            }
        }
    }

    async fn run_dispatch_loop(mut rx: mpsc::Receiver<(PathBuf, QueueMessage)>, poison_dir: PathBuf, options: QueueOptions, handler: Arc<dyn DequeueHandler>) {
        while let Some((path, message)) = rx.recv().await {
            let outcome = handler.handle(&message.content).await;
            if let Err(e) = Self::resolve(&path, &poison_dir, message, &options, outcome).await {
                tracing::warn!(target: "queue", error = %e, "failed to resolve delivery outcome");
            }
        }
    }

    async fn resolve(path: &Path, poison_dir: &Path, mut message: QueueMessage, options: &QueueOptions, outcome: DequeueOutcome) -> Result<(), MemoryError> {
        match outcome {
            DequeueOutcome::Success => {
                let _ = fs::remove_file(path).await;
            }
            DequeueOutcome::FatalError => {
                Self::poison(path, poison_dir, &message).await?;
            }
            DequeueOutcome::TransientError => {
                if message.deliveries >= options.max_attempts {
                    Self::poison(path, poison_dir, &message).await?;
                } else {
                    let now = chrono::Utc::now();
                    message.lock_until = now;
                    message.schedule = now + Self::linear_backoff(message.deliveries);
                    message.last_error = Some("transient error".to_string());
                    Self::persist(path, &message).await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Queue for FileQueue {
    async fn connect(&self, name: &str, options: QueueOptions) -> Result<(), MemoryError> {
        let mut bound = self.bound.lock().await;
        if let Some(existing) = bound.as_ref() {
            if existing.name != name {
                return Err(MemoryError::configuration(format!(
                    "queue instance already bound to '{}', cannot rebind to '{name}'",
                    existing.name
                )));
            }
            return Ok(());
        }

        let dir = self.storage_root.join(name);
        let poison_dir = self.storage_root.join(format!("{name}{POISON_SUFFIX}"));
        fs::create_dir_all(&dir).await?;

        *bound = Some(Bound { name: name.to_string(), options, dir, poison_dir });
        Ok(())
    }

    async fn enqueue(&self, content: &str) -> Result<String, MemoryError> {
        let bound = self.bound.lock().await;
        let bound = bound.as_ref().ok_or_else(|| MemoryError::configuration("enqueue called before connect"))?;
        fs::create_dir_all(&bound.dir).await?;

        let id = ulid::Ulid::new().to_string();
        let now = chrono::Utc::now();
        let message = QueueMessage {
            id: id.clone(),
            content: content.to_string(),
            deliveries: 0,
            created: now,
            schedule: now,
            lock_until: chrono::DateTime::<chrono::Utc>::UNIX_EPOCH,
            last_error: None,
        };
        let path = Self::message_path(&bound.dir, &id);
        Self::persist(&path, &message).await?;
        Ok(id)
    }

    async fn on_dequeue(&self, handler: Arc<dyn DequeueHandler>) -> Result<(), MemoryError> {
        let mut handler_slot = self.handler.lock().await;
        if handler_slot.is_some() {
            return Err(MemoryError::configuration("a dequeue handler is already registered for this queue"));
        }

        let bound = self.bound.lock().await;
        let bound = bound.as_ref().ok_or_else(|| MemoryError::configuration("on_dequeue called before connect"))?;
        if !bound.options.dequeue_enabled {
            return Err(MemoryError::configuration(format!("queue '{}' was connected with dequeue_enabled=false", bound.name)));
        }

        let (tx, rx) = mpsc::channel(bound.options.fetch_batch_size.max(1));
        let poll_task = tokio::spawn(Self::run_poll_loop(bound.dir.clone(), bound.options, tx, self.cancel.clone(), self.poll_interval));
        let dispatch_task = tokio::spawn(Self::run_dispatch_loop(rx, bound.poison_dir.clone(), bound.options, handler.clone()));

        *handler_slot = Some(handler);
        self.tasks.lock().await.extend([poll_task, dispatch_task]);
        Ok(())
    }

    async fn dispose(&self) -> Result<(), MemoryError> {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.cancel();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            let _ = task.await;
        }
        Ok(())
    }
}

/// Default [`QueueFactory`] (§9 Open Question decision): one [`FileQueue`]
/// per step name, all rooted at the same directory so they share the
/// advisory-lock namespace in [`DIRECTORY_LOCKS`]. Connections are cached
/// and reused - the distributed orchestrator calls `queue_for` once per
/// handler registration and once per enqueue, and a queue must stay bound
/// across both for its dequeue loop to keep running.
pub struct FileSystemQueueFactory {
    storage_root: PathBuf,
    poll_interval: std::time::Duration,
    queues: AsyncMutex<HashMap<String, Arc<FileQueue>>>,
}

impl FileSystemQueueFactory {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            queues: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Overrides the default polling tick on every queue this factory
    /// hands out. Integration tests use a shorter interval.
    pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl crate::application::QueueFactory for FileSystemQueueFactory {
    async fn queue_for(&self, name: &str) -> Result<Arc<dyn Queue>, MemoryError> {
        let mut queues = self.queues.lock().await;
        if let Some(existing) = queues.get(name) {
            return Ok(existing.clone() as Arc<dyn Queue>);
        }

        let queue = Arc::new(FileQueue::new(self.storage_root.clone()).with_poll_interval(self.poll_interval));
        queue.connect(name, QueueOptions::default()).await?;
        queues.insert(name.to_string(), queue.clone());
        Ok(queue as Arc<dyn Queue>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct RecordingHandler {
        outcomes: SyncMutex<Vec<DequeueOutcome>>,
        seen: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DequeueHandler for RecordingHandler {
        async fn handle(&self, _content: &str) -> DequeueOutcome {
            self.seen.fetch_add(1, Ordering::SeqCst);
            let mut outcomes = self.outcomes.lock();
            if outcomes.is_empty() {
                DequeueOutcome::Success
            } else {
                outcomes.remove(0)
            }
        }
    }

    #[tokio::test]
    async fn enqueue_without_connect_errors() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(dir.path());
        assert!(queue.enqueue("hello").await.is_err());
    }

    #[tokio::test]
    async fn rebinding_to_a_different_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(dir.path());
        queue.connect("queue-extract", QueueOptions::default()).await.unwrap();
        assert!(queue.connect("queue-embed", QueueOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn connect_is_idempotent_for_the_same_name() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(dir.path());
        queue.connect("queue-extract", QueueOptions::default()).await.unwrap();
        assert!(queue.connect("queue-extract", QueueOptions::default()).await.is_ok());
    }

    #[tokio::test]
    async fn delivers_an_enqueued_message_and_deletes_it_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(dir.path()).with_poll_interval(Duration::from_millis(20));
        queue.connect("queue-extract", QueueOptions::default()).await.unwrap();
        queue.enqueue("payload").await.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(RecordingHandler { outcomes: SyncMutex::new(vec![]), seen: seen.clone() });
        queue.on_dequeue(handler).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.dispose().await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        let remaining = std::fs::read_dir(dir.path().join("queue-extract")).unwrap().count();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn transient_outcome_is_retried_then_poisoned_after_max_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(dir.path()).with_poll_interval(Duration::from_millis(20));
        let options = QueueOptions { max_attempts: 2, fetch_lock_seconds: 0, ..QueueOptions::default() };
        queue.connect("queue-partition", options).await.unwrap();
        queue.enqueue("payload").await.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(RecordingHandler {
            outcomes: SyncMutex::new(vec![DequeueOutcome::TransientError, DequeueOutcome::TransientError]),
            seen: seen.clone(),
        });
        queue.on_dequeue(handler).await.unwrap();

        tokio::time::sleep(Duration::from_millis(3500)).await;
        queue.dispose().await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        let remaining = std::fs::read_dir(dir.path().join("queue-partition")).unwrap().count();
        assert_eq!(remaining, 0);
        let poisoned = std::fs::read_dir(dir.path().join("queue-partition-poison")).unwrap().count();
        assert_eq!(poisoned, 1);
    }

    #[tokio::test]
    async fn fatal_outcome_poisons_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(dir.path()).with_poll_interval(Duration::from_millis(20));
        queue.connect("queue-save", QueueOptions::default()).await.unwrap();
        queue.enqueue("payload").await.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(RecordingHandler { outcomes: SyncMutex::new(vec![DequeueOutcome::FatalError]), seen: seen.clone() });
        queue.on_dequeue(handler).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.dispose().await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        let poisoned = std::fs::read_dir(dir.path().join("queue-save-poison")).unwrap().count();
        assert_eq!(poisoned, 1);
    }

    #[tokio::test]
    async fn registering_a_second_handler_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let queue = FileQueue::new(dir.path());
        queue.connect("queue-extract", QueueOptions::default()).await.unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(RecordingHandler { outcomes: SyncMutex::new(vec![]), seen });
        queue.on_dequeue(handler.clone()).await.unwrap();
        assert!(queue.on_dequeue(handler).await.is_err());
        queue.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn factory_caches_and_reuses_a_queue_for_the_same_name() {
        use crate::application::QueueFactory;

        let dir = tempfile::tempdir().unwrap();
        let factory = FileSystemQueueFactory::new(dir.path());
        let first = factory.queue_for("queue-extract").await.unwrap();
        let second = factory.queue_for("queue-extract").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let other = factory.queue_for("queue-embed").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
