// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The single mutable record backing a whole chain.
//!
//! Every node of a chain, its executable handle, its wait handles and any
//! [`ChainHandle`] share one `RootState` through an `Arc`. All reads and writes of the
//! status, result and tag happen under the state's mutex; a thread that observes a
//! settled status after acquiring the lock also observes the final result and tag.
//!
//! # Lifecycle
//!
//! ```text
//!   Pending (building) --execute()--> Pending (dispatched) --finish--> Fulfilled | Rejected
//! ```
//!
//! The status moves out of `Pending` exactly once and the result is written exactly
//! once. A nested chain that is spliced into an outer chain is *adopted*: its own state
//! is abandoned and every handle pointing at it is redirected to the outer state.

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Waker;
use std::time::Instant;

use crate::chain::Payload;
use crate::errors::{ChainError, Rejection};

/// Process-unique chain identifier.
pub type ChainId = u64;

static NEXT_CHAIN_ID: AtomicU64 = AtomicU64::new(1);

/// Settlement status of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Fulfilled,
    Rejected,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Fulfilled => "fulfilled",
            Status::Rejected => "rejected",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, Status::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) type Tag = Arc<dyn Any + Send + Sync>;

/// Called once when a chain settles; receives the rejection if it settled `Rejected`.
pub(crate) type SettleCallback = Box<dyn FnOnce(Option<Rejection>) + Send>;

/// Something waiting to hear that a chain settled.
pub(crate) enum Observer {
    Waker(Waker),
    Callback(SettleCallback),
}

impl Observer {
    fn notify(self, rejection: Option<Rejection>) {
        match self {
            Observer::Waker(waker) => waker.wake(),
            Observer::Callback(callback) => callback(rejection),
        }
    }
}

pub(crate) struct RootInner {
    status: Status,
    result: Option<Result<Payload, Rejection>>,
    tag: Option<Tag>,
    dispatched: bool,
    observers: Vec<Observer>,
}

impl RootInner {
    pub(crate) fn status(&self) -> Status {
        self.status
    }

    pub(crate) fn dispatched(&self) -> bool {
        self.dispatched
    }

    pub(crate) fn has_tag(&self) -> bool {
        self.tag.is_some()
    }

    /// The frozen result; `None` while pending.
    pub(crate) fn result(&self) -> Option<&Result<Payload, Rejection>> {
        self.result.as_ref()
    }
}

pub(crate) struct RootState {
    id: ChainId,
    created_at: Instant,
    inner: Mutex<RootInner>,
    settled: Condvar,
    adopted_by: OnceCell<Arc<RootState>>,
}

impl RootState {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_CHAIN_ID.fetch_add(1, Ordering::Relaxed),
            created_at: Instant::now(),
            inner: Mutex::new(RootInner {
                status: Status::Pending,
                result: None,
                tag: None,
                dispatched: false,
                observers: Vec::new(),
            }),
            settled: Condvar::new(),
            adopted_by: OnceCell::new(),
        })
    }

    pub(crate) fn id(&self) -> ChainId {
        self.id
    }

    pub(crate) fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Follow adoption links to the state that is the source of truth for this chain.
    pub(crate) fn effective(self: &Arc<Self>) -> Arc<RootState> {
        let mut current = Arc::clone(self);
        while let Some(parent) = current.adopted_by.get() {
            let parent = Arc::clone(parent);
            current = parent;
        }
        current
    }

    /// Redirect this (nested) state to the outer chain's state.
    pub(crate) fn adopt_into(&self, outer: &Arc<RootState>) {
        self.inner.lock().dispatched = true;
        // a chain is consumed when spliced, so it is adopted at most once
        let adopted = self.adopted_by.set(Arc::clone(outer)).is_ok();
        debug_assert!(adopted, "chain {} adopted twice", self.id);
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RootInner> {
        self.inner.lock()
    }

    pub(crate) fn status(&self) -> Status {
        self.inner.lock().status
    }

    pub(crate) fn is_dispatched(&self) -> bool {
        self.inner.lock().dispatched
    }

    /// Flip the one-shot dispatch guard; fails if the chain already left the building state.
    pub(crate) fn mark_dispatched(&self) -> Result<(), ChainError> {
        let mut inner = self.inner.lock();
        if inner.status != Status::Pending || inner.dispatched {
            return Err(ChainError::InvalidState(format!(
                "chain {} has already been executed (status: {})",
                self.id, inner.status
            )));
        }
        inner.dispatched = true;
        Ok(())
    }

    /// Freeze the terminal status and result, then wake every waiter.
    ///
    /// Returns `false` (and changes nothing) if the chain had already settled.
    pub(crate) fn settle(&self, result: Result<Payload, Rejection>) -> bool {
        let (observers, rejection) = {
            let mut inner = self.inner.lock();
            if inner.status != Status::Pending {
                return false;
            }
            let rejection = result.as_ref().err().cloned();
            inner.status = if result.is_ok() {
                Status::Fulfilled
            } else {
                Status::Rejected
            };
            inner.result = Some(result);
            self.settled.notify_all();
            (std::mem::take(&mut inner.observers), rejection)
        };

        for observer in observers {
            observer.notify(rejection.clone());
        }
        true
    }

    /// Register an observer, or notify it immediately if the chain already settled.
    pub(crate) fn observe(&self, observer: Observer) {
        let rejection = {
            let mut inner = self.inner.lock();
            if inner.status == Status::Pending {
                inner.observers.push(observer);
                return;
            }
            match &inner.result {
                Some(Err(rejection)) => Some(rejection.clone()),
                _ => None,
            }
        };
        observer.notify(rejection);
    }

    /// Park a task waker until the chain settles; returns `true` if already settled.
    pub(crate) fn register_waker(&self, waker: &Waker) -> bool {
        let mut inner = self.inner.lock();
        if inner.status != Status::Pending {
            return true;
        }
        let already_parked = inner.observers.iter().any(|observer| match observer {
            Observer::Waker(parked) => parked.will_wake(waker),
            Observer::Callback(_) => false,
        });
        if !already_parked {
            inner.observers.push(Observer::Waker(waker.clone()));
        }
        false
    }

    /// Block until settled, or until `deadline` passes. The guard is returned either way.
    pub(crate) fn wait_settled(&self, deadline: Option<Instant>) -> MutexGuard<'_, RootInner> {
        let mut inner = self.inner.lock();
        while inner.status == Status::Pending {
            match deadline {
                Some(deadline) => {
                    if self.settled.wait_until(&mut inner, deadline).timed_out() {
                        break;
                    }
                }
                None => self.settled.wait(&mut inner),
            }
        }
        inner
    }

    pub(crate) fn tag(&self) -> Option<Tag> {
        self.inner.lock().tag.clone()
    }

    pub(crate) fn set_tag(&self, tag: Option<Tag>) {
        self.inner.lock().tag = tag;
    }
}

impl fmt::Debug for RootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RootState")
            .field("id", &self.id)
            .field("status", &inner.status)
            .field("dispatched", &inner.dispatched)
            .field("has_tag", &inner.tag.is_some())
            .finish()
    }
}

/// A cloneable, type-erased view of a chain's Root State.
///
/// Handles expose the status and the user tag of a chain from any thread. A handle
/// taken from a chain that was later returned as a nested chain follows the chain
/// into its outer chain, so it reports the outer chain's status and tag.
///
/// ```
/// use the_chainwood::chain::Chain;
/// use the_chainwood::engine::Status;
///
/// let chain = Chain::new(|settler| settler.resolve(5));
/// let handle = chain.handle();
/// handle.set_tag("building");
///
/// assert_eq!(handle.status(), Status::Pending);
/// assert_eq!(handle.tag::<&str>().as_deref(), Some(&"building"));
/// ```
#[derive(Clone)]
pub struct ChainHandle {
    root: Arc<RootState>,
}

impl ChainHandle {
    pub(crate) fn new(root: Arc<RootState>) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> Arc<RootState> {
        self.root.effective()
    }

    /// Identifier of the Root State currently backing this chain.
    pub fn id(&self) -> ChainId {
        self.root().id()
    }

    pub fn status(&self) -> Status {
        self.root().status()
    }

    pub fn is_dispatched(&self) -> bool {
        self.root().is_dispatched()
    }

    /// Read the tag if one is set and it has type `V`.
    pub fn tag<V>(&self) -> Option<Arc<V>>
    where
        V: Any + Send + Sync,
    {
        self.root().tag().and_then(|tag| tag.downcast::<V>().ok())
    }

    /// Attach metadata to the chain, replacing any previous tag.
    pub fn set_tag<V>(&self, tag: V)
    where
        V: Any + Send + Sync,
    {
        self.root().set_tag(Some(Arc::new(tag)));
    }

    pub fn clear_tag(&self) {
        self.root().set_tag(None);
    }
}

impl fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChainHandle").field(&self.root()).finish()
    }
}
