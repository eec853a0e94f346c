// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Queue Port
//!
//! The at-least-once message transport the distributed orchestrator is
//! built on. A queue value is one named, visibility-locked FIFO-ish
//! channel; see §4.A for the full delivery protocol this trait's
//! implementations must honor.

use crate::error::MemoryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome a registered dequeue handler returns for one delivered message.
/// Converted by the queue implementation into a delete / retry / poison
/// decision - never surfaced to callers as an exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueOutcome {
    /// Delete the message; it will not be redelivered.
    Success,
    /// Clear the lock and reschedule with backoff, unless the retry
    /// budget is exhausted, in which case poison instead.
    TransientError,
    /// Move straight to the poison queue regardless of remaining budget.
    FatalError,
}

/// Tuning knobs for one bound queue name.
#[derive(Debug, Clone, Copy)]
pub struct QueueOptions {
    /// `false` yields a publish-only handle: `enqueue` works, but no
    /// polling or dispatch task is started.
    pub dequeue_enabled: bool,
    pub fetch_batch_size: usize,
    pub fetch_lock_seconds: u64,
    pub max_attempts: u32,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            dequeue_enabled: true,
            fetch_batch_size: 10,
            fetch_lock_seconds: 300,
            max_attempts: 3,
        }
    }
}

/// One message record as persisted by a queue implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    pub id: String,
    pub content: String,
    pub deliveries: u32,
    pub created: chrono::DateTime<chrono::Utc>,
    pub schedule: chrono::DateTime<chrono::Utc>,
    pub lock_until: chrono::DateTime<chrono::Utc>,
    pub last_error: Option<String>,
}

impl QueueMessage {
    /// A message is visible when both its schedule and its visibility
    /// lock have elapsed.
    pub fn is_visible_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.schedule <= now && self.lock_until <= now
    }
}

/// A single async handler a queue dispatches delivered messages to.
/// Registered once per bound queue name via [`Queue::on_dequeue`].
#[async_trait]
pub trait DequeueHandler: Send + Sync {
    async fn handle(&self, content: &str) -> DequeueOutcome;
}

/// An at-least-once, visibility-locked message channel.
///
/// Implementations guarantee: every enqueued message is eventually
/// delivered at least once; no ordering guarantee holds across
/// concurrent consumers; a message exceeding `max_attempts` moves to a
/// sibling poison queue (`<name><poison_suffix>`) and is deleted from the
/// original, never left in both.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Binds this instance to `name`. Idempotent for the same name;
    /// binding a second, different name on an already-bound instance is
    /// an error.
    async fn connect(&self, name: &str, options: QueueOptions) -> Result<(), MemoryError>;

    /// Appends a message. The returned id is lexicographically sortable
    /// by enqueue time.
    async fn enqueue(&self, content: &str) -> Result<String, MemoryError>;

    /// Registers the handler the queue invokes for each visible message.
    /// Starting a second handler on an already-dispatching instance is an
    /// error - one handler per bound name.
    async fn on_dequeue(&self, handler: Arc<dyn DequeueHandler>) -> Result<(), MemoryError>;

    /// Stops polling and dispatch. In-flight handler invocations are
    /// allowed to run to completion before this resolves.
    async fn dispose(&self) -> Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_not_visible_while_locked() {
        let now = chrono::Utc::now();
        let msg = QueueMessage {
            id: "01".into(),
            content: "{}".into(),
            deliveries: 1,
            created: now,
            schedule: now,
            lock_until: now + chrono::Duration::seconds(300),
            last_error: None,
        };
        assert!(!msg.is_visible_at(now));
        assert!(msg.is_visible_at(now + chrono::Duration::seconds(301)));
    }

    #[test]
    fn default_options_match_reference_policy() {
        let options = QueueOptions::default();
        assert_eq!(options.fetch_lock_seconds, 300);
        assert!(options.dequeue_enabled);
    }
}
