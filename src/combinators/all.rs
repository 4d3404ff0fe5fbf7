// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

use crate::chain::{Chain, DeferredSettler, ExecutableChain, Settler};
use crate::combinators::latch::BatchLatch;
use crate::engine::root_state::{ChainId, Observer};
use crate::engine::Status;
use crate::errors::{ChainError, Rejection};
use crate::observability::messages::combinator::{AllCompleted, AllDispatched};
use crate::observability::messages::StructuredLog;

/// Results of one `all` batch, indexed by input position.
struct AllBatch<T> {
    chain_id: ChainId,
    member_count: usize,
    started: Instant,
    values: Mutex<Vec<Option<T>>>,
    first_error: Mutex<Option<Rejection>>,
    latch: BatchLatch,
    settler: Mutex<Option<DeferredSettler<Vec<T>>>>,
}

impl<T: Send + 'static> AllBatch<T> {
    fn new(count: usize, settler: DeferredSettler<Vec<T>>) -> Self {
        Self {
            chain_id: settler.chain_id(),
            member_count: count,
            started: Instant::now(),
            values: Mutex::new((0..count).map(|_| None).collect()),
            first_error: Mutex::new(None),
            latch: BatchLatch::new(count),
            settler: Mutex::new(Some(settler)),
        }
    }

    fn record_value(&self, index: usize, value: T) {
        self.values.lock()[index] = Some(value);
    }

    fn record_error(&self, rejection: Rejection) {
        self.first_error.lock().get_or_insert(rejection);
    }

    /// Count one member as settled; the last one settles the combined chain.
    fn member_settled(&self) {
        if !self.latch.count_down() {
            return;
        }
        let Some(settler) = self.settler.lock().take() else {
            return;
        };
        let outcome = self.take_outcome();

        AllCompleted {
            chain_id: self.chain_id,
            member_count: self.member_count,
            failed: outcome.is_err(),
            duration: self.started.elapsed(),
        }
        .log();

        settler.settle(outcome);
    }

    fn take_outcome(&self) -> Result<Vec<T>, Rejection> {
        if let Some(rejection) = self.first_error.lock().take() {
            return Err(rejection);
        }
        let values = std::mem::take(&mut *self.values.lock());
        values
            .into_iter()
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| {
                Rejection::from(ChainError::InvalidState(
                    "a member chain settled without a value".to_string(),
                ))
            })
    }
}

/// Run every chain and collect their values in input order.
///
/// The returned chain, once executed, dispatches all members and settles when every
/// one of them has settled: `Fulfilled` with the values in input order, or `Rejected`
/// with the first rejection observed. A rejection does not stop the other members.
///
/// The combined chain does not occupy a worker while its members run: its entry
/// dispatches them and returns, and the member that settles last continues the
/// combined chain's walk. Batches can therefore be nested, and they make progress on a
/// single-worker dispatcher.
///
/// # Errors
///
/// * [`ChainError::EmptyCombinatorInput`] - `chains` is empty
/// * [`ChainError::InvalidState`] - a chain was already started elsewhere
///
/// # Example
///
/// ```
/// use the_chainwood::chain::Chain;
/// use the_chainwood::combinators::all;
///
/// let chains = vec![
///     Chain::new(|settler| settler.resolve(1)),
///     Chain::new(|settler| settler.resolve(2)),
/// ];
/// let combined = all(chains).unwrap().finish(|| {});
///
/// assert_eq!(combined.execute().unwrap().get().unwrap(), vec![1, 2]);
/// ```
pub fn all<T>(chains: Vec<Chain<T>>) -> Result<Chain<Vec<T>>, ChainError>
where
    T: Send + 'static,
{
    let Some(first) = chains.first() else {
        return Err(ChainError::EmptyCombinatorInput);
    };
    for chain in &chains {
        let root = chain.root();
        if root.is_dispatched() || root.status() != Status::Pending {
            return Err(ChainError::InvalidState(format!(
                "chain {} was already started and cannot join an all batch",
                root.id()
            )));
        }
    }

    let runtime = first.runtime().clone();
    let member_count = chains.len();

    Ok(runtime.chain(move |settler: Settler<Vec<T>>| {
        let batch = Arc::new(AllBatch::new(member_count, settler.defer()));

        let members: Vec<ExecutableChain<Option<()>>> = chains
            .into_iter()
            .enumerate()
            .map(|(index, chain)| {
                let on_value = Arc::clone(&batch);
                let on_error = Arc::clone(&batch);
                chain
                    .then_void(move |value| {
                        on_value.record_value(index, value);
                        Ok(())
                    })
                    .fail_void(move |rejection| {
                        on_error.record_error(rejection);
                        Ok(())
                    })
                    .finish(|| {})
            })
            .collect();

        for member in &members {
            let observer = Arc::clone(&batch);
            member.handle().root().observe(Observer::Callback(Box::new(
                move |rejection: Option<Rejection>| {
                    // only a member the dispatcher never ran settles rejected here
                    if let Some(rejection) = rejection {
                        observer.record_error(rejection);
                    }
                    observer.member_settled();
                },
            )));
        }

        let dispatched = AllDispatched {
            chain_id: batch.chain_id,
            member_count,
        };
        let span = dispatched.span("all_batch");
        let _guard = span.enter();
        dispatched.log();

        for member in &members {
            // a refused member has already settled and counted down
            let _ = member.execute();
        }
    }))
}
