// /////////////////////////////////////////////////////////////////////////////
// Semantic Memory
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Prometheus counters, gauges, and a histogram for the orchestrator and
//! queue, registered under the `semantic_memory` namespace. Grounded on
//! the teacher's `MetricsService`: one `Registry`, one constructor that
//! builds and registers every metric up front, `gather()` rendering the
//! text exposition format for a scrape endpoint.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use semantic_memory_domain::error::MemoryError;
use std::sync::Arc;

#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    queue_depth: IntGauge,
    poison_queue_size: IntGauge,
    pipelines_completed_total: IntCounter,
    pipelines_failed_total: IntCounter,
    step_duration_seconds: Histogram,
    messages_enqueued_total: IntCounter,
    messages_poisoned_total: IntCounter,
}

impl MetricsService {
    pub fn new() -> Result<Self, MemoryError> {
        let registry = Registry::new();

        let queue_depth =
            IntGauge::with_opts(Opts::new("queue_depth", "Number of visible, undelivered messages").namespace("semantic_memory"))
                .map_err(|e| MemoryError::internal(format!("failed to create queue_depth metric: {e}")))?;

        let poison_queue_size =
            IntGauge::with_opts(Opts::new("poison_queue_size", "Number of messages in poison queues").namespace("semantic_memory"))
                .map_err(|e| MemoryError::internal(format!("failed to create poison_queue_size metric: {e}")))?;

        let pipelines_completed_total = IntCounter::with_opts(
            Opts::new("pipelines_completed_total", "Total pipelines that reached a terminal success state").namespace("semantic_memory"),
        )
        .map_err(|e| MemoryError::internal(format!("failed to create pipelines_completed_total metric: {e}")))?;

        let pipelines_failed_total = IntCounter::with_opts(
            Opts::new("pipelines_failed_total", "Total pipelines that reached a terminal failure state").namespace("semantic_memory"),
        )
        .map_err(|e| MemoryError::internal(format!("failed to create pipelines_failed_total metric: {e}")))?;

        let step_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("step_duration_seconds", "Time spent executing a single step handler")
                .namespace("semantic_memory")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
        )
        .map_err(|e| MemoryError::internal(format!("failed to create step_duration_seconds metric: {e}")))?;

        let messages_enqueued_total = IntCounter::with_opts(
            Opts::new("messages_enqueued_total", "Total messages enqueued").namespace("semantic_memory"),
        )
        .map_err(|e| MemoryError::internal(format!("failed to create messages_enqueued_total metric: {e}")))?;

        let messages_poisoned_total = IntCounter::with_opts(
            Opts::new("messages_poisoned_total", "Total messages moved to a poison queue").namespace("semantic_memory"),
        )
        .map_err(|e| MemoryError::internal(format!("failed to create messages_poisoned_total metric: {e}")))?;

        for metric in [
            Box::new(queue_depth.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(poison_queue_size.clone()),
            Box::new(pipelines_completed_total.clone()),
            Box::new(pipelines_failed_total.clone()),
            Box::new(step_duration_seconds.clone()),
            Box::new(messages_enqueued_total.clone()),
            Box::new(messages_poisoned_total.clone()),
        ] {
            registry.register(metric).map_err(|e| MemoryError::internal(format!("failed to register metric: {e}")))?;
        }

        Ok(Self {
            registry: Arc::new(registry),
            queue_depth,
            poison_queue_size,
            pipelines_completed_total,
            pipelines_failed_total,
            step_duration_seconds,
            messages_enqueued_total,
            messages_poisoned_total,
        })
    }

    pub fn set_queue_depth(&self, depth: i64) {
        self.queue_depth.set(depth);
    }

    pub fn set_poison_queue_size(&self, size: i64) {
        self.poison_queue_size.set(size);
    }

    pub fn record_pipeline_completed(&self) {
        self.pipelines_completed_total.inc();
    }

    pub fn record_pipeline_failed(&self) {
        self.pipelines_failed_total.inc();
    }

    pub fn observe_step_duration(&self, seconds: f64) {
        self.step_duration_seconds.observe(seconds);
    }

    pub fn record_message_enqueued(&self) {
        self.messages_enqueued_total.inc();
    }

    pub fn record_message_poisoned(&self) {
        self.messages_poisoned_total.inc();
    }

    /// Renders the Prometheus text exposition format for a scrape endpoint.
    pub fn gather(&self) -> Result<String, MemoryError> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer).map_err(|e| MemoryError::internal(format!("failed to encode metrics: {e}")))?;
        String::from_utf8(buffer).map_err(|e| MemoryError::internal(format!("metrics output was not valid utf-8: {e}")))
    }
}
