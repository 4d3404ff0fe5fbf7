// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounded worker pool that runs chain entry tasks.
//!
//! The pool grows the same way a classic core/max executor does:
//!
//! 1. Below `core_pool_size` live workers, every submission spawns a new worker that
//!    runs the task first.
//! 2. Otherwise the task is offered to the bounded queue.
//! 3. If the queue is full and the pool is below `max_pool_size`, a new worker is
//!    spawned for the task.
//! 4. Otherwise the [`OverflowPolicy`] decides.
//!
//! Workers above the core size retire after sitting idle for `keep_alive_ms`. A
//! `queue_capacity` of zero turns the queue into a hand-off: a task is accepted only
//! if an idle worker is waiting for it.
//!
//! # Threading
//!
//! Workers are plain named OS threads receiving from a `crossbeam_channel`. Tasks run
//! to completion on the worker that picked them up; a task that panics is logged and
//! the worker keeps serving the queue.

mod worker;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{DispatcherConfig, OverflowPolicy};
use crate::errors::ChainError;
use crate::observability::messages::dispatcher::{
    DispatcherShutdown, DispatcherStarted, TaskOverflow, WorkerSpawned,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{FnTask, Task};

pub type BoxedTask = Box<dyn Task>;

pub(crate) struct PoolShared {
    config: DispatcherConfig,
    sender: Mutex<Option<Sender<BoxedTask>>>,
    receiver: Receiver<BoxedTask>,
    live_workers: AtomicUsize,
    next_worker_id: AtomicUsize,
    shutdown: AtomicBool,
}

impl PoolShared {
    /// Claim a worker slot if fewer than `limit` workers are alive.
    fn try_reserve_worker(&self, limit: usize) -> bool {
        self.live_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < limit).then_some(live + 1)
            })
            .is_ok()
    }

    /// Give up a worker slot if more than `core_pool_size` workers are alive.
    pub(crate) fn try_retire_worker(&self) -> Option<usize> {
        let core = self.config.core_pool_size;
        self.live_workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live > core).then(|| live - 1)
            })
            .ok()
            .map(|previous| previous - 1)
    }

    pub(crate) fn release_worker(&self) {
        self.live_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub(crate) fn receiver(&self) -> &Receiver<BoxedTask> {
        &self.receiver
    }

    pub(crate) fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub(crate) fn shutdown_error(&self) -> ChainError {
        ChainError::WorkerRejected {
            policy: self.config.overflow_policy,
            reason: "dispatcher was shut down before the task started".to_string(),
        }
    }
}

/// The worker pool.
///
/// Dropping the dispatcher shuts it down.
pub struct Dispatcher {
    shared: Arc<PoolShared>,
}

impl Dispatcher {
    /// Build a pool for an already validated configuration. No worker starts until the
    /// first submission.
    pub fn new(config: DispatcherConfig) -> Self {
        let (sender, receiver) = bounded(config.queue_capacity);

        DispatcherStarted {
            core_pool_size: config.core_pool_size,
            max_pool_size: config.max_pool_size,
            queue_capacity: config.queue_capacity,
            overflow_policy: config.overflow_policy,
        }
        .log();

        Self {
            shared: Arc::new(PoolShared {
                config,
                sender: Mutex::new(Some(sender)),
                receiver,
                live_workers: AtomicUsize::new(0),
                next_worker_id: AtomicUsize::new(1),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.shared.config
    }

    pub fn live_workers(&self) -> usize {
        self.shared.live_workers.load(Ordering::Acquire)
    }

    pub fn queued_tasks(&self) -> usize {
        self.shared.receiver.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.is_shut_down()
    }

    /// Submit a closure.
    pub fn spawn<F>(&self, f: F) -> Result<(), ChainError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(Box::new(FnTask(f)))
    }

    /// Submit a task.
    ///
    /// `Ok` means the task was accepted, ran inline under `caller_runs`, or was dropped
    /// under `discard`. A dropped or refused task is always abandoned with the reason.
    pub fn submit(&self, task: BoxedTask) -> Result<(), ChainError> {
        if self.shared.is_shut_down() {
            let error = self.shared.shutdown_error();
            task.abandon(error.clone());
            return Err(error);
        }

        let config = &self.shared.config;
        if self.shared.try_reserve_worker(config.core_pool_size) {
            return self.spawn_worker(task);
        }

        let sender = self.shared.sender.lock().clone();
        let Some(sender) = sender else {
            let error = self.shared.shutdown_error();
            task.abandon(error.clone());
            return Err(error);
        };

        match sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(task)) => {
                if self.shared.try_reserve_worker(config.max_pool_size) {
                    self.spawn_worker(task)
                } else {
                    self.overflow(task)
                }
            }
            Err(TrySendError::Disconnected(task)) => {
                let error = self.shared.shutdown_error();
                task.abandon(error.clone());
                Err(error)
            }
        }
    }

    fn overflow(&self, task: BoxedTask) -> Result<(), ChainError> {
        let config = &self.shared.config;
        TaskOverflow {
            overflow_policy: config.overflow_policy,
            live_workers: self.live_workers(),
            queue_capacity: config.queue_capacity,
        }
        .log();

        let saturated = |policy| ChainError::WorkerRejected {
            policy,
            reason: format!(
                "{} workers busy and {} tasks queued",
                self.live_workers(),
                self.queued_tasks()
            ),
        };

        match config.overflow_policy {
            OverflowPolicy::Abort => {
                let error = saturated(OverflowPolicy::Abort);
                task.abandon(error.clone());
                Err(error)
            }
            OverflowPolicy::CallerRuns => {
                task.run();
                Ok(())
            }
            OverflowPolicy::Discard => {
                task.abandon(saturated(OverflowPolicy::Discard));
                Ok(())
            }
        }
    }

    /// Start a worker whose first job is `task`. The worker slot must already be reserved.
    fn spawn_worker(&self, task: BoxedTask) -> Result<(), ChainError> {
        let worker_id = self.shared.next_worker_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::clone(&self.shared);

        let spawned = std::thread::Builder::new()
            .name(format!("chainwood-worker-{worker_id}"))
            .spawn(move || worker::run(shared, worker_id, task));

        match spawned {
            Ok(_) => {
                WorkerSpawned {
                    worker_id,
                    live_workers: self.live_workers(),
                }
                .log();
                Ok(())
            }
            Err(error) => {
                // the closure, and the task inside it, was dropped by the failed spawn
                self.shared.release_worker();
                Err(ChainError::WorkerRejected {
                    policy: self.shared.config.overflow_policy,
                    reason: format!("failed to spawn worker thread: {error}"),
                })
            }
        }
    }

    /// Stop accepting work and abandon everything still queued.
    ///
    /// Tasks already running finish normally; idle workers exit once the queue is
    /// closed. Calling `shutdown` again does nothing.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        drop(self.shared.sender.lock().take());

        let mut dropped_tasks = 0;
        while let Ok(task) = self.shared.receiver.try_recv() {
            task.abandon(self.shared.shutdown_error());
            dropped_tasks += 1;
        }

        DispatcherShutdown {
            live_workers: self.live_workers(),
            dropped_tasks,
        }
        .log();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.shared.config)
            .field("live_workers", &self.live_workers())
            .field("queued_tasks", &self.queued_tasks())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn config(core: usize, max: usize, queue: usize, policy: OverflowPolicy) -> DispatcherConfig {
        DispatcherConfig {
            core_pool_size: core,
            max_pool_size: max,
            keep_alive_ms: 50,
            queue_capacity: queue,
            overflow_policy: policy,
        }
    }

    /// Records whether it ran or why it was abandoned.
    struct Probe {
        outcome: mpsc::Sender<Result<(), ChainError>>,
        hold: Option<mpsc::Receiver<()>>,
    }

    impl Task for Probe {
        fn run(self: Box<Self>) {
            if let Some(hold) = &self.hold {
                let _ = hold.recv_timeout(Duration::from_secs(5));
            }
            let _ = self.outcome.send(Ok(()));
        }

        fn abandon(self: Box<Self>, reason: ChainError) {
            let _ = self.outcome.send(Err(reason));
        }
    }

    fn blocker(dispatcher: &Dispatcher) -> mpsc::Sender<()> {
        let (release, hold) = mpsc::channel();
        let (outcome, _) = mpsc::channel();
        dispatcher
            .submit(Box::new(Probe {
                outcome,
                hold: Some(hold),
            }))
            .unwrap();
        release
    }

    #[test]
    fn test_runs_submitted_closures() {
        let dispatcher = Dispatcher::new(config(2, 4, 16, OverflowPolicy::Abort));
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            dispatcher.spawn(move || tx.send(i).unwrap()).unwrap();
        }

        let mut seen: Vec<i32> = (0..8)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        seen.sort();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
        assert!(dispatcher.live_workers() <= 2);
    }

    #[test]
    fn test_abort_policy_refuses_when_saturated() {
        let dispatcher = Dispatcher::new(config(1, 1, 0, OverflowPolicy::Abort));
        let release = blocker(&dispatcher);

        let (outcome, results) = mpsc::channel();
        let error = dispatcher
            .submit(Box::new(Probe {
                outcome,
                hold: None,
            }))
            .unwrap_err();

        assert!(matches!(
            error,
            ChainError::WorkerRejected {
                policy: OverflowPolicy::Abort,
                ..
            }
        ));
        assert!(matches!(results.recv().unwrap(), Err(ChainError::WorkerRejected { .. })));
        release.send(()).unwrap();
    }

    #[test]
    fn test_caller_runs_policy_runs_inline() {
        let dispatcher = Dispatcher::new(config(1, 1, 0, OverflowPolicy::CallerRuns));
        let release = blocker(&dispatcher);

        let caller = thread::current().id();
        let (tx, rx) = mpsc::channel();
        dispatcher
            .spawn(move || tx.send(thread::current().id()).unwrap())
            .unwrap();

        assert_eq!(rx.recv().unwrap(), caller);
        release.send(()).unwrap();
    }

    #[test]
    fn test_discard_policy_abandons_silently() {
        let dispatcher = Dispatcher::new(config(1, 1, 0, OverflowPolicy::Discard));
        let release = blocker(&dispatcher);

        let (outcome, results) = mpsc::channel();
        dispatcher
            .submit(Box::new(Probe {
                outcome,
                hold: None,
            }))
            .unwrap();

        assert!(matches!(
            results.recv().unwrap(),
            Err(ChainError::WorkerRejected {
                policy: OverflowPolicy::Discard,
                ..
            })
        ));
        release.send(()).unwrap();
    }

    #[test]
    fn test_grows_to_max_then_retires_idle_workers() {
        let dispatcher = Dispatcher::new(config(1, 3, 0, OverflowPolicy::Abort));
        let releases: Vec<_> = (0..3).map(|_| blocker(&dispatcher)).collect();
        assert_eq!(dispatcher.live_workers(), 3);

        for release in releases {
            release.send(()).unwrap();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while dispatcher.live_workers() > 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(dispatcher.live_workers(), 1);
    }

    #[test]
    fn test_shutdown_abandons_queued_tasks() {
        let dispatcher = Dispatcher::new(config(1, 1, 4, OverflowPolicy::Abort));
        let release = blocker(&dispatcher);

        let (outcome, results) = mpsc::channel();
        dispatcher
            .submit(Box::new(Probe {
                outcome,
                hold: None,
            }))
            .unwrap();
        assert_eq!(dispatcher.queued_tasks(), 1);

        dispatcher.shutdown();
        assert!(matches!(results.recv().unwrap(), Err(ChainError::WorkerRejected { .. })));
        assert!(dispatcher.spawn(|| {}).is_err());
        release.send(()).unwrap();
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let dispatcher = Dispatcher::new(config(1, 1, 8, OverflowPolicy::Abort));
        dispatcher.spawn(|| panic!("task blew up")).unwrap();

        let (tx, rx) = mpsc::channel();
        dispatcher.spawn(move || tx.send(7).unwrap()).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 7);
        assert_eq!(dispatcher.live_workers(), 1);
    }
}
