// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::chain::node::{EntryFn, SettleTarget, Signal};
use crate::engine::root_state::ChainId;
use crate::errors::{ChainError, Rejection};
use crate::observability::messages::chain::{LateSettlementIgnored, StepPanicked};
use crate::observability::messages::StructuredLog;
use crate::utils::panic_message;

/// Resumes a walk that was parked on a deferred entry.
pub(crate) type ResumeFn = Box<dyn FnOnce(Signal) + Send>;

/// Settlement state of one entry function.
///
/// * `Open` - the entry function is running and has not settled
/// * `Deferred` - the entry handed its settlement to a [`DeferredSettler`]
/// * `Awaiting` - the walk is parked; the next settlement resumes it
/// * `Settled` - the outcome, not yet collected by the walker
/// * `Closed` - collected; later settlements are ignored
pub(crate) enum SettleSlot {
    Open,
    Deferred,
    Awaiting(ResumeFn),
    Settled(Signal),
    Closed,
}

/// What the walker gets back from an entry function.
pub(crate) enum EntryOutcome {
    Ready(Signal),
    /// The entry deferred its settlement; the slot is `Deferred` or already `Settled`.
    Deferred(Arc<Mutex<SettleSlot>>),
}

/// The resolve/reject capability handed to a chain's entry function.
///
/// Both methods consume the settler, so an entry function can settle its chain at most
/// once. The settlement must happen before the entry function returns; an entry that
/// returns without settling rejects the chain with [`ChainError::Unsettled`], and a
/// settler that escapes the entry function and is used later is ignored with a warning.
/// An entry that completes on another thread calls [`Settler::defer`] instead.
///
/// ```
/// use the_chainwood::chain::Chain;
///
/// let chain = Chain::new(|settler| {
///     match "12".parse::<u32>() {
///         Ok(value) => settler.resolve(value),
///         Err(error) => settler.reject(error),
///     }
/// });
/// # drop(chain);
/// ```
pub struct Settler<T> {
    target: SettleTarget,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + 'static> Settler<T> {
    pub(crate) fn new(target: SettleTarget) -> Self {
        Self {
            target,
            _marker: PhantomData,
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.target.chain_id
    }

    /// Fulfil the chain with `value`.
    pub fn resolve(self, value: T) {
        deposit(&self.target, Signal::Value(Box::new(value)), "resolve");
    }

    /// Reject the chain; the rejection travels down the failure path.
    pub fn reject<E>(self, error: E)
    where
        E: Into<Rejection>,
    {
        deposit(&self.target, Signal::Rejected(error.into()), "reject");
    }

    /// Settle from a `Result`.
    pub fn settle(self, result: Result<T, Rejection>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(rejection) => self.reject(rejection),
        }
    }

    /// Let the entry function return before the chain is settled.
    ///
    /// The walk does not hold its worker while it waits: the rest of the chain runs on
    /// whichever thread settles the returned [`DeferredSettler`]. Dropping that settler
    /// without using it rejects the chain with [`ChainError::Unsettled`].
    ///
    /// ```
    /// use the_chainwood::chain::Chain;
    /// use std::thread;
    ///
    /// let chain = Chain::new(|settler| {
    ///     let settler = settler.defer();
    ///     thread::spawn(move || settler.resolve(7));
    /// })
    /// .finish(|| {});
    ///
    /// assert_eq!(chain.execute().unwrap().get().unwrap(), 7);
    /// ```
    pub fn defer(self) -> DeferredSettler<T> {
        {
            let mut slot = self.target.slot.lock();
            if matches!(*slot, SettleSlot::Open) {
                *slot = SettleSlot::Deferred;
            }
        }
        DeferredSettler {
            chain_id: self.target.chain_id,
            target: Some(self.target),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Settler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("chain_id", &self.target.chain_id)
            .finish()
    }
}

/// A settler that outlives its entry function. See [`Settler::defer`].
pub struct DeferredSettler<T> {
    chain_id: ChainId,
    target: Option<SettleTarget>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Send + 'static> DeferredSettler<T> {
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn resolve(mut self, value: T) {
        if let Some(target) = self.target.take() {
            deposit(&target, Signal::Value(Box::new(value)), "resolve");
        }
    }

    pub fn reject<E>(mut self, error: E)
    where
        E: Into<Rejection>,
    {
        if let Some(target) = self.target.take() {
            deposit(&target, Signal::Rejected(error.into()), "reject");
        }
    }

    pub fn settle(self, result: Result<T, Rejection>) {
        match result {
            Ok(value) => self.resolve(value),
            Err(rejection) => self.reject(rejection),
        }
    }
}

impl<T> Drop for DeferredSettler<T> {
    fn drop(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };
        let waiting = matches!(
            *target.slot.lock(),
            SettleSlot::Deferred | SettleSlot::Awaiting(_)
        );
        if waiting {
            let rejection = Rejection::from(ChainError::Unsettled);
            deposit(&target, Signal::Rejected(rejection), "drop");
        }
    }
}

impl<T> fmt::Debug for DeferredSettler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredSettler")
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

fn deposit(target: &SettleTarget, signal: Signal, action: &str) {
    let mut slot = target.slot.lock();
    match std::mem::replace(&mut *slot, SettleSlot::Closed) {
        SettleSlot::Open | SettleSlot::Deferred => *slot = SettleSlot::Settled(signal),
        SettleSlot::Awaiting(resume) => {
            drop(slot);
            resume(signal);
        }
        // the settler is consumed on use, only an escaped settler can get here
        previous @ (SettleSlot::Settled(_) | SettleSlot::Closed) => {
            *slot = previous;
            LateSettlementIgnored {
                chain_id: target.chain_id,
                action,
            }
            .log();
        }
    }
}

/// Run an entry function to completion and collect its settlement.
///
/// The slot is closed as soon as the entry returns, so a settler smuggled out of the
/// entry function cannot change the outcome afterwards. A deferred slot stays open.
pub(crate) fn run_entry(chain_id: ChainId, entry: EntryFn) -> EntryOutcome {
    let slot = Arc::new(Mutex::new(SettleSlot::Open));
    let target = SettleTarget {
        chain_id,
        slot: Arc::clone(&slot),
    };

    let returned = catch_unwind(AssertUnwindSafe(move || entry(target)));
    let settled = {
        let mut guard = slot.lock();
        let state = std::mem::replace(&mut *guard, SettleSlot::Closed);
        if matches!(state, SettleSlot::Deferred) && returned.is_ok() {
            *guard = SettleSlot::Deferred;
        }
        state
    };

    match (settled, returned) {
        (SettleSlot::Settled(signal), _) => EntryOutcome::Ready(signal),
        (SettleSlot::Deferred, Ok(())) => EntryOutcome::Deferred(slot),
        (_, Err(panic)) => {
            let message = panic_message(panic.as_ref());
            StepPanicked {
                chain_id,
                step: "entry function",
                message: &message,
            }
            .log();
            EntryOutcome::Ready(Signal::Rejected(Rejection::from(ChainError::Panicked(
                message,
            ))))
        }
        (_, Ok(())) => EntryOutcome::Ready(Signal::Rejected(Rejection::from(
            ChainError::Unsettled,
        ))),
    }
}

/// Park `state` on a deferred slot.
///
/// Hands `state` back with the signal if the entry already settled; otherwise
/// `resume(state, signal)` runs later on the thread that settles the slot.
pub(crate) fn await_deferred<S>(
    slot: &Mutex<SettleSlot>,
    state: S,
    resume: fn(S, Signal),
) -> Option<(S, Signal)>
where
    S: Send + 'static,
{
    let mut guard = slot.lock();
    match std::mem::replace(&mut *guard, SettleSlot::Closed) {
        SettleSlot::Settled(signal) => Some((state, signal)),
        _ => {
            *guard = SettleSlot::Awaiting(Box::new(move |signal: Signal| resume(state, signal)));
            None
        }
    }
}
