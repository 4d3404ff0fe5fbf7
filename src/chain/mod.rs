// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Building chains.
//!
//! A [`Chain<T>`] starts from an entry function that settles a value of type `T`, then
//! grows one continuation at a time. Every builder method consumes the chain and returns
//! a chain typed by the value the *next* continuation will see, so the compiler checks
//! that adjacent continuations agree on their value types.
//!
//! [`Chain::finish`] appends the terminal node and returns an [`ExecutableChain`]. Once a
//! chain is executable no more continuations can be attached, which rules out appending
//! to a chain that is already running.
//!
//! ```text
//!   Chain::new(entry) --then/fail/...--> Chain<U> --finish--> ExecutableChain<U>
//!                                                                  | execute()
//!                                                                  v
//!                                                             WaitHandle<U>
//! ```
//!
//! # Example
//!
//! ```
//! use the_chainwood::chain::{Chain, Outcome};
//!
//! let chain = Chain::new(|settler| settler.resolve(20))
//!     .then(|value: i32| Ok(Outcome::Value(value + 1)))
//!     .map(|value| value * 2)
//!     .finish(|| {});
//!
//! let handle = chain.execute().unwrap();
//! assert_eq!(handle.get().unwrap(), 42);
//! ```

pub(crate) mod node;
mod outcome;
mod settler;

pub use node::Payload;
pub use outcome::Outcome;
pub use settler::{DeferredSettler, Settler};

pub(crate) use node::{ChainParts, Signal, Step};
pub(crate) use settler::{await_deferred, run_entry, EntryOutcome};

use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::chain::node::{take_payload, Node, SettleTarget};
use crate::engine::root_state::{ChainHandle, ChainId, RootState};
use crate::engine::{Runtime, Status, WaitHandle};
use crate::errors::{ChainError, Rejection};
use crate::observability::messages::chain::ChainDispatched;
use crate::observability::messages::StructuredLog;

/// A chain under construction.
///
/// Nothing runs until the chain is finished and executed. A chain that is dropped
/// before that simply disappears, together with its continuations.
pub struct Chain<T> {
    parts: ChainParts,
    runtime: Runtime,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Chain<T> {
    /// Start a chain on the process-wide runtime.
    ///
    /// `entry` runs on a worker thread once the chain is executed and must call
    /// [`Settler::resolve`] or [`Settler::reject`] before it returns.
    pub fn new<F>(entry: F) -> Self
    where
        F: FnOnce(Settler<T>) + Send + 'static,
    {
        Self::with_runtime(Runtime::global(), entry)
    }

    pub(crate) fn with_runtime<F>(runtime: &Runtime, entry: F) -> Self
    where
        F: FnOnce(Settler<T>) + Send + 'static,
    {
        let root = RootState::new();
        let registration = runtime.inflight().register(&root);
        Self {
            parts: ChainParts {
                root,
                entry: Box::new(move |target: SettleTarget| entry(Settler::new(target))),
                nodes: Vec::new(),
                has_failure_handler: false,
                registration,
            },
            runtime: runtime.clone(),
            _marker: PhantomData,
        }
    }

    /// A chain whose entry immediately resolves with `value`.
    pub fn resolved(value: T) -> Self {
        Self::new(move |settler| settler.resolve(value))
    }

    /// A chain whose entry immediately rejects with `error`.
    pub fn rejected<E>(error: E) -> Self
    where
        E: Into<Rejection>,
    {
        let rejection = error.into();
        Self::new(move |settler| settler.reject(rejection))
    }

    pub fn id(&self) -> ChainId {
        self.parts.root.id()
    }

    pub fn handle(&self) -> ChainHandle {
        ChainHandle::new(Arc::clone(&self.parts.root))
    }

    /// Continue with the value; the continuation may return a nested chain.
    pub fn then<U, F>(self, f: F) -> Chain<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<Outcome<U>, Rejection> + Send + 'static,
    {
        self.append(Node::OnSuccess(Box::new(move |payload: Payload| {
            let value = take_payload::<T>(payload)?;
            f(value).map(Outcome::into_step)
        })))
    }

    /// Transform the value with a continuation that cannot fail.
    pub fn map<U, F>(self, f: F) -> Chain<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |value| Ok(Outcome::Value(f(value))))
    }

    /// Consume the value; the chain continues with `()`.
    pub fn then_void<F>(self, f: F) -> Chain<()>
    where
        F: FnOnce(T) -> Result<(), Rejection> + Send + 'static,
    {
        self.append(Node::OnSuccessVoid(Box::new(move |payload: Payload| {
            f(take_payload::<T>(payload)?)
        })))
    }

    /// Run a step that ignores the value; the chain continues with `()`.
    pub fn then_run<F>(self, f: F) -> Chain<()>
    where
        F: FnOnce() -> Result<(), Rejection> + Send + 'static,
    {
        self.append(Node::OnSuccessVoid(Box::new(move |_: Payload| f())))
    }

    /// Handle a rejection.
    ///
    /// The handler's result resumes the success path: the following `then`
    /// continuations receive it. Returning `Err` keeps the chain on the failure path.
    pub fn fail<F>(self, f: F) -> Chain<T>
    where
        F: FnOnce(Rejection) -> Result<Outcome<T>, Rejection> + Send + 'static,
    {
        self.append(Node::OnFailure(Box::new(move |rejection: Rejection| {
            f(rejection).map(Outcome::into_step)
        })))
    }

    /// Observe a rejection without producing a replacement value.
    ///
    /// Successful values pass through as `Some`; a handled rejection continues as `None`.
    pub fn fail_void<F>(self, f: F) -> Chain<Option<T>>
    where
        F: FnOnce(Rejection) -> Result<(), Rejection> + Send + 'static,
    {
        self.append(Node::OnFailureVoid {
            handler: Box::new(move |rejection: Rejection| {
                f(rejection)?;
                Ok(Box::new(None::<T>) as Payload)
            }),
            lift: Box::new(|payload: Payload| match payload.downcast::<T>() {
                Ok(value) => Box::new(Some(*value)) as Payload,
                Err(other) => other,
            }),
        })
    }

    /// Append the terminal node. `f` runs on both paths, after any uncaught hook.
    pub fn finish<F>(mut self, f: F) -> ExecutableChain<T>
    where
        F: FnOnce() + Send + 'static,
    {
        self.parts.push(Node::OnFinish(Box::new(f)));
        ExecutableChain {
            root: Arc::clone(&self.parts.root),
            parts: Mutex::new(Some(self.parts)),
            runtime: self.runtime,
            _marker: PhantomData,
        }
    }

    fn append<U>(mut self, node: Node) -> Chain<U> {
        self.parts.push(node);
        Chain {
            parts: self.parts,
            runtime: self.runtime,
            _marker: PhantomData,
        }
    }
}

impl<T> Chain<T> {
    pub(crate) fn into_parts(self) -> ChainParts {
        self.parts
    }

    pub(crate) fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) fn root(&self) -> &Arc<RootState> {
        &self.parts.root
    }
}

impl<T> fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("id", &self.parts.root.id())
            .field("nodes", &self.parts.nodes.len())
            .field("has_failure_handler", &self.parts.has_failure_handler)
            .finish()
    }
}

/// A finished chain, ready to run exactly once.
///
/// `ExecutableChain` is `Sync`, so it can be shared between threads that race to
/// execute it; exactly one `execute()` call succeeds.
pub struct ExecutableChain<T> {
    root: Arc<RootState>,
    parts: Mutex<Option<ChainParts>>,
    runtime: Runtime,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> ExecutableChain<T> {
    /// Submit the chain to the dispatcher.
    ///
    /// Returns immediately with a handle for the result. Every call after the first
    /// fails with [`ChainError::InvalidState`]. Under the `abort` overflow policy a
    /// saturated dispatcher fails the call with [`ChainError::WorkerRejected`]; the
    /// chain is then settled `Rejected` with the same error.
    pub fn execute(&self) -> Result<WaitHandle<T>, ChainError> {
        let parts = {
            let mut parts = self.parts.lock();
            self.root.mark_dispatched()?;
            parts.take().ok_or_else(|| {
                ChainError::InvalidState(format!("chain {} has no nodes left to run", self.id()))
            })?
        };

        ChainDispatched {
            chain_id: self.root.id(),
            node_count: parts.nodes.len(),
        }
        .log();

        self.runtime.dispatch(parts)?;
        Ok(WaitHandle::new(Arc::clone(&self.root)))
    }
}

impl<T> ExecutableChain<T> {
    pub fn id(&self) -> ChainId {
        self.root.id()
    }

    pub fn status(&self) -> Status {
        self.root.status()
    }

    pub fn handle(&self) -> ChainHandle {
        ChainHandle::new(Arc::clone(&self.root))
    }

    #[cfg(test)]
    pub(crate) fn take_parts_for_test(&self) -> ChainParts {
        self.root.mark_dispatched().unwrap();
        self.parts.lock().take().unwrap()
    }
}

impl<T> fmt::Debug for ExecutableChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableChain")
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_counts_nodes_and_failure_handlers() {
        let chain = Chain::new(|settler| settler.resolve(1_u8))
            .map(|v| v + 1)
            .fail(|rejection| Err(rejection));
        assert_eq!(chain.parts.nodes.len(), 2);
        assert!(chain.parts.has_failure_handler);

        let chain = Chain::new(|settler| settler.resolve(1_u8)).then_run(|| Ok(()));
        assert!(!chain.parts.has_failure_handler);
    }

    #[test]
    fn test_unexecuted_chain_leaves_registry_on_drop() {
        let runtime = Runtime::new(Default::default()).unwrap();
        let chain = runtime.chain(|settler| settler.resolve(()));
        let id = chain.id();
        assert!(runtime.inflight().contains(id));

        drop(chain);
        assert!(!runtime.inflight().contains(id));
    }

    #[test]
    fn test_finished_chain_starts_pending_and_undispatched() {
        let chain = Chain::new(|settler| settler.resolve("x")).finish(|| {});
        assert_eq!(chain.status(), Status::Pending);
        assert!(!chain.handle().is_dispatched());
    }
}
