// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for worker pool lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Pool construction and shutdown
//! * Worker spawning and idle retirement
//! * Overflow handling when the pool is saturated

use crate::config::OverflowPolicy;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Worker pool constructed.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use the_chainwood::config::OverflowPolicy;
/// use the_chainwood::observability::messages::dispatcher::DispatcherStarted;
///
/// let msg = DispatcherStarted {
///     core_pool_size: 2,
///     max_pool_size: 4,
///     queue_capacity: 1024,
///     overflow_policy: OverflowPolicy::Abort,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct DispatcherStarted {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Display for DispatcherStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatcher started: core={}, max={}, queue_capacity={}, overflow={:?}",
            self.core_pool_size, self.max_pool_size, self.queue_capacity, self.overflow_policy
        )
    }
}

impl StructuredLog for DispatcherStarted {
    fn log(&self) {
        tracing::info!(
            core_pool_size = self.core_pool_size,
            max_pool_size = self.max_pool_size,
            queue_capacity = self.queue_capacity,
            overflow_policy = ?self.overflow_policy,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "dispatcher",
            span_name = name,
            core_pool_size = self.core_pool_size,
            max_pool_size = self.max_pool_size,
        )
    }
}

/// A new worker thread joined the pool.
///
/// # Log Level
/// `debug!` - Pool sizing detail
pub struct WorkerSpawned {
    pub worker_id: usize,
    pub live_workers: usize,
}

impl Display for WorkerSpawned {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker {} spawned ({} live)",
            self.worker_id, self.live_workers
        )
    }
}

impl StructuredLog for WorkerSpawned {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            live_workers = self.live_workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "worker",
            span_name = name,
            worker_id = self.worker_id,
        )
    }
}

/// A worker above the core size retired after sitting idle for the keep-alive.
///
/// # Log Level
/// `debug!` - Pool sizing detail
pub struct WorkerRetired {
    pub worker_id: usize,
    pub live_workers: usize,
    pub idle: std::time::Duration,
}

impl Display for WorkerRetired {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Worker {} retired after {:?} idle ({} live)",
            self.worker_id, self.idle, self.live_workers
        )
    }
}

impl StructuredLog for WorkerRetired {
    fn log(&self) {
        tracing::debug!(
            worker_id = self.worker_id,
            live_workers = self.live_workers,
            idle_ms = self.idle.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "worker_retired",
            span_name = name,
            worker_id = self.worker_id,
        )
    }
}

/// Pool saturated; the overflow policy decided the fate of a task.
///
/// # Log Level
/// `warn!` - Back-pressure the caller should know about
pub struct TaskOverflow {
    pub overflow_policy: OverflowPolicy,
    pub live_workers: usize,
    pub queue_capacity: usize,
}

impl Display for TaskOverflow {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatcher saturated ({} workers, queue capacity {}): applying {:?} policy",
            self.live_workers, self.queue_capacity, self.overflow_policy
        )
    }
}

impl StructuredLog for TaskOverflow {
    fn log(&self) {
        tracing::warn!(
            overflow_policy = ?self.overflow_policy,
            live_workers = self.live_workers,
            queue_capacity = self.queue_capacity,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "task_overflow",
            span_name = name,
            overflow_policy = ?self.overflow_policy,
        )
    }
}

/// A task escaped the worker with a panic; the worker keeps running.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct WorkerTaskPanicked<'a> {
    pub worker_id: usize,
    pub message: &'a str,
}

impl Display for WorkerTaskPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Worker {} task panicked: {}", self.worker_id, self.message)
    }
}

impl StructuredLog for WorkerTaskPanicked<'_> {
    fn log(&self) {
        tracing::error!(
            worker_id = self.worker_id,
            message = self.message,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "worker_task_panicked",
            span_name = name,
            worker_id = self.worker_id,
        )
    }
}

/// Pool shut down; queued tasks were dropped.
///
/// # Log Level
/// `info!` - Important operational event
pub struct DispatcherShutdown {
    pub live_workers: usize,
    pub dropped_tasks: usize,
}

impl Display for DispatcherShutdown {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatcher shut down: {} workers still finishing, {} queued tasks dropped",
            self.live_workers, self.dropped_tasks
        )
    }
}

impl StructuredLog for DispatcherShutdown {
    fn log(&self) {
        tracing::info!(
            live_workers = self.live_workers,
            dropped_tasks = self.dropped_tasks,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "dispatcher_shutdown",
            span_name = name,
            dropped_tasks = self.dropped_tasks,
        )
    }
}
