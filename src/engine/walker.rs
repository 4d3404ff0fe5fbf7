// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Drives one chain from its entry function to its finish node.
//!
//! The walk runs entirely on the worker thread that picked up the entry task:
//!
//! 1. Run the entry function and collect its settlement.
//! 2. Pop nodes front to back. A node whose kind matches the current signal runs; any
//!    other node is skipped and the signal passes through unchanged.
//! 3. A continuation that returns a nested chain splices it in place: the nested entry
//!    runs immediately and its nodes are pushed in front of the remaining outer nodes.
//! 4. An entry that defers its settlement parks the walk. The worker is released and
//!    the walk resumes on the thread that settles the deferred entry.
//! 5. At the finish node, call the uncaught hook if the chain is rejected and no
//!    failure continuation exists anywhere in it, run `finish`, then freeze the Root
//!    State and wake every waiter.
//!
//! Continuations run under `catch_unwind`; a panic becomes a rejection.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use crate::chain::node::{FinishFn, Node, StepResult};
use crate::chain::{await_deferred, run_entry, ChainParts, EntryOutcome, Signal, Step};
use crate::engine::registry::Registration;
use crate::engine::root_state::RootState;
use crate::engine::Runtime;
use crate::errors::{ChainError, Rejection};
use crate::observability::messages::chain::{
    ChainSettled, ChainWalkResumed, ChainWalkStarted, ChainWalkSuspended, NestedChainSpliced,
    StepPanicked, UncaughtRejection,
};
use crate::observability::messages::StructuredLog;
use crate::traits::Task;
use crate::utils::panic_message;

/// The dispatcher-facing wrapper around a dispatched chain.
///
/// If the task is abandoned, or dropped without running, the chain settles `Rejected`
/// so that nobody waits on it forever.
pub(crate) struct ChainTask {
    parts: Option<ChainParts>,
    runtime: Runtime,
    abandon_reason: Option<ChainError>,
}

impl ChainTask {
    pub(crate) fn new(parts: ChainParts, runtime: Runtime) -> Self {
        Self {
            parts: Some(parts),
            runtime,
            abandon_reason: None,
        }
    }
}

impl Task for ChainTask {
    fn run(mut self: Box<Self>) {
        if let Some(parts) = self.parts.take() {
            Walk::new(parts, self.runtime.clone()).run();
        }
    }

    fn abandon(mut self: Box<Self>, reason: ChainError) {
        self.abandon_reason = Some(reason);
    }
}

impl Drop for ChainTask {
    fn drop(&mut self) {
        let Some(parts) = self.parts.take() else {
            return;
        };
        let reason = self.abandon_reason.take().unwrap_or_else(|| ChainError::WorkerRejected {
            policy: self.runtime.config().overflow_policy,
            reason: "entry task was dropped before it ran".to_string(),
        });

        let ChainParts {
            root, registration, ..
        } = parts;
        let started = Instant::now();
        root.settle(Err(Rejection::from(reason)));
        ChainSettled {
            chain_id: root.id(),
            status: root.status(),
            duration: started.elapsed(),
        }
        .log();
        drop(registration);
    }
}

struct Walk {
    root: Arc<RootState>,
    runtime: Runtime,
    entry: Option<crate::chain::node::EntryFn>,
    nodes: VecDeque<Node>,
    has_failure_handler: bool,
    registration: Registration,
    started: Instant,
}

impl Walk {
    fn new(parts: ChainParts, runtime: Runtime) -> Self {
        Self {
            root: parts.root,
            runtime,
            entry: Some(parts.entry),
            nodes: parts.nodes.into(),
            has_failure_handler: parts.has_failure_handler,
            registration: parts.registration,
            started: Instant::now(),
        }
    }

    fn run(mut self) {
        let start_msg = ChainWalkStarted {
            chain_id: self.root.id(),
            node_count: self.nodes.len(),
        };
        let span = start_msg.span("chain_walk");
        let _guard = span.enter();
        start_msg.log();

        let outcome = match self.entry.take() {
            Some(entry) => run_entry(self.root.id(), entry),
            None => EntryOutcome::Ready(Signal::Rejected(Rejection::from(ChainError::Unsettled))),
        };
        self.proceed(outcome);
    }

    fn proceed(self, outcome: EntryOutcome) {
        match outcome {
            EntryOutcome::Ready(signal) => self.drive(signal),
            EntryOutcome::Deferred(slot) => {
                ChainWalkSuspended {
                    chain_id: self.root.id(),
                    pending_nodes: self.nodes.len(),
                }
                .log();
                if let Some((walk, signal)) = await_deferred(&slot, self, Walk::resume) {
                    walk.drive(signal);
                }
            }
        }
    }

    fn resume(self, signal: Signal) {
        let resumed = ChainWalkResumed {
            chain_id: self.root.id(),
            pending_nodes: self.nodes.len(),
        };
        let span = resumed.span("chain_walk");
        let _guard = span.enter();
        resumed.log();
        self.drive(signal);
    }

    fn drive(mut self, mut signal: Signal) {
        while let Some(node) = self.nodes.pop_front() {
            let outcome = match (node, signal) {
                (Node::OnFinish(finish), signal) => return self.complete(signal, Some(finish)),
                (Node::OnSuccess(f), Signal::Value(payload)) => {
                    let result = self.guarded("then continuation", move || f(payload));
                    self.advance(result)
                }
                (Node::OnSuccessVoid(f), Signal::Value(payload)) => {
                    EntryOutcome::Ready(match self.guarded("then continuation", move || f(payload)) {
                        Ok(()) => Signal::Value(Box::new(())),
                        Err(rejection) => Signal::Rejected(rejection),
                    })
                }
                (Node::OnFailure(f), Signal::Rejected(rejection)) => {
                    let result = self.guarded("fail continuation", move || f(rejection));
                    self.advance(result)
                }
                (Node::OnFailureVoid { handler, .. }, Signal::Rejected(rejection)) => {
                    EntryOutcome::Ready(
                        match self.guarded("fail continuation", move || handler(rejection)) {
                            Ok(payload) => Signal::Value(payload),
                            Err(rejection) => Signal::Rejected(rejection),
                        },
                    )
                }
                (Node::OnFailureVoid { lift, .. }, Signal::Value(payload)) => {
                    EntryOutcome::Ready(Signal::Value(lift(payload)))
                }
                (_, signal) => EntryOutcome::Ready(signal),
            };
            signal = match outcome {
                EntryOutcome::Ready(signal) => signal,
                deferred => return self.proceed(deferred),
            };
        }

        // only reachable for a chain without a finish node
        self.complete(signal, None);
    }

    /// Turn a continuation result into the next signal, splicing nested chains.
    fn advance(&mut self, result: StepResult) -> EntryOutcome {
        match result {
            Ok(Step::Value(payload)) => EntryOutcome::Ready(Signal::Value(payload)),
            Ok(Step::Chained(nested)) => self.splice(nested),
            Err(rejection) => EntryOutcome::Ready(Signal::Rejected(rejection)),
        }
    }

    fn splice(&mut self, nested: ChainParts) -> EntryOutcome {
        let ChainParts {
            root: nested_root,
            entry,
            nodes,
            has_failure_handler,
            registration,
        } = nested;

        NestedChainSpliced {
            chain_id: self.root.id(),
            nested_chain_id: nested_root.id(),
            nested_node_count: nodes.len(),
        }
        .log();

        // the nested chain's own state is now irrelevant; handles follow the outer chain
        drop(registration);
        nested_root.adopt_into(&self.root);
        self.has_failure_handler |= has_failure_handler;
        for node in nodes.into_iter().rev() {
            self.nodes.push_front(node);
        }

        run_entry(nested_root.id(), entry)
    }

    fn complete(self, signal: Signal, finish: Option<FinishFn>) {
        if let Signal::Rejected(rejection) = &signal {
            if !self.has_failure_handler {
                self.report_uncaught(rejection);
            }
        }

        if let Some(finish) = finish {
            self.guarded("finish continuation", finish);
        }

        let result = match signal {
            Signal::Value(payload) => Ok(payload),
            Signal::Rejected(rejection) => Err(rejection),
        };
        self.root.settle(result);

        ChainSettled {
            chain_id: self.root.id(),
            status: self.root.status(),
            duration: self.started.elapsed(),
        }
        .log();
        drop(self.registration);
    }

    fn report_uncaught(&self, rejection: &Rejection) {
        let error = ChainError::Uncaught(rejection.clone());
        let handler = self.runtime.uncaught_handler();

        UncaughtRejection {
            chain_id: self.root.id(),
            error: &error,
            handler_installed: handler.is_some(),
        }
        .log();

        if let Some(handler) = handler {
            self.guarded("uncaught handler", || handler.call(&error));
        }
    }

    /// Run user code, converting a panic into a rejection.
    fn guarded<R, F>(&self, step: &str, f: F) -> R
    where
        F: FnOnce() -> R,
        R: FromPanic,
    {
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => value,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                StepPanicked {
                    chain_id: self.root.id(),
                    step,
                    message: &message,
                }
                .log();
                R::from_panic(message)
            }
        }
    }
}

/// How the walker represents a panic in place of a continuation's return value.
trait FromPanic {
    fn from_panic(message: String) -> Self;
}

impl<T> FromPanic for Result<T, Rejection> {
    fn from_panic(message: String) -> Self {
        Err(Rejection::from(ChainError::Panicked(message)))
    }
}

impl FromPanic for () {
    fn from_panic(_message: String) -> Self {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Settler;
    use crate::config::DispatcherConfig;
    use crate::engine::Status;

    fn test_runtime() -> Runtime {
        Runtime::new(DispatcherConfig::default()).unwrap()
    }

    #[test]
    fn test_dropped_task_rejects_its_chain() {
        let runtime = test_runtime();
        let chain = runtime.chain(|settler| settler.resolve(1_u32)).finish(|| {});
        let handle = chain.handle();
        let id = chain.id();

        let parts = chain.take_parts_for_test();
        drop(ChainTask::new(parts, runtime.clone()));

        assert_eq!(handle.status(), Status::Rejected);
        assert!(!runtime.inflight().contains(id));
    }

    #[test]
    fn test_abandoned_task_keeps_reason() {
        let runtime = test_runtime();
        let chain = runtime.chain(|settler| settler.resolve(1_u32)).finish(|| {});
        let root = chain.handle().root();

        let task: Box<dyn Task> = Box::new(ChainTask::new(chain.take_parts_for_test(), runtime));
        task.abandon(ChainError::Unsupported);

        let inner = root.lock();
        let rejection = inner.result().unwrap().as_ref().err().unwrap().clone();
        assert!(matches!(
            rejection.downcast_ref::<ChainError>(),
            Some(ChainError::Unsupported)
        ));
    }

    #[test]
    fn test_deferred_entry_finishes_on_settling_thread() {
        let runtime = test_runtime();
        let parked = Arc::new(parking_lot::Mutex::new(None));
        let keep = Arc::clone(&parked);
        let chain = runtime
            .chain(move |settler: Settler<u32>| {
                *keep.lock() = Some(settler.defer());
            })
            .map(|v| v + 1)
            .finish(|| {});
        let id = chain.id();
        let root = chain.handle().root();

        let task: Box<dyn Task> =
            Box::new(ChainTask::new(chain.take_parts_for_test(), runtime.clone()));
        task.run();
        assert_eq!(root.status(), Status::Pending);
        assert!(runtime.inflight().contains(id));

        let settler = parked.lock().take().unwrap();
        std::thread::spawn(move || settler.resolve(9)).join().unwrap();

        let inner = root.lock();
        assert_eq!(inner.status(), Status::Fulfilled);
        let payload = inner.result().unwrap().as_ref().ok().unwrap();
        assert_eq!((**payload).downcast_ref::<u32>(), Some(&10));
        drop(inner);
        assert!(!runtime.inflight().contains(id));
    }

    #[test]
    fn test_walk_runs_inline_when_task_runs() {
        let runtime = test_runtime();
        let chain = runtime
            .chain(|settler| settler.resolve(2_u32))
            .map(|v| v * 21)
            .finish(|| {});
        let root = chain.handle().root();

        let task: Box<dyn Task> = Box::new(ChainTask::new(chain.take_parts_for_test(), runtime));
        task.run();

        let inner = root.lock();
        assert_eq!(inner.status(), Status::Fulfilled);
        let payload = inner.result().unwrap().as_ref().ok().unwrap();
        assert_eq!((**payload).downcast_ref::<u32>(), Some(&42));
    }
}
