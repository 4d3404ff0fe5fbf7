// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::combinators::latch::BatchLatch;
use crate::config::consts::DEFAULT_JOIN_INTERVAL_MS;
use crate::engine::root_state::Observer;
use crate::engine::Status;
use crate::errors::Rejection;
use crate::observability::messages::combinator::JoinDrained;
use crate::observability::messages::StructuredLog;
use crate::traits::Joinable;

/// Block until every chain has settled.
///
/// Executable chains that nobody dispatched yet are dispatched here. The caller sleeps
/// until a member settles, re-checking at least once per `interval`. Members that
/// fail to dispatch (for example under the `abort` overflow policy) are settled
/// `Rejected` by the dispatcher and count as done.
///
/// Results are not collected; read them from each chain's wait handle.
///
/// ```
/// use the_chainwood::chain::Chain;
/// use the_chainwood::combinators::join_all;
/// use the_chainwood::engine::Status;
///
/// let first = Chain::new(|settler| settler.resolve(1)).finish(|| {});
/// let second = Chain::new(|settler| settler.resolve(2)).finish(|| {});
///
/// join_all(&[&first, &second]);
/// assert_eq!(first.status(), Status::Fulfilled);
/// assert_eq!(second.status(), Status::Fulfilled);
/// ```
pub fn join(interval: Duration, chains: &[&dyn Joinable]) {
    let started = Instant::now();
    let latch = Arc::new(BatchLatch::new(chains.len()));
    for chain in chains {
        let latch = Arc::clone(&latch);
        chain
            .chain_handle()
            .root()
            .observe(Observer::Callback(Box::new(move |_: Option<Rejection>| {
                latch.count_down();
            })));
    }

    let mut auto_dispatched = 0;
    for chain in chains {
        if let Ok(true) = chain.dispatch_if_idle() {
            auto_dispatched += 1;
        }
    }

    while !latch.wait_timeout(interval) {
        let pending = chains
            .iter()
            .filter(|chain| chain.chain_handle().status() == Status::Pending)
            .count();
        if pending == 0 {
            break;
        }
    }

    JoinDrained {
        handle_count: chains.len(),
        auto_dispatched,
        duration: started.elapsed(),
    }
    .log();
}

/// [`join`] with the default 10 ms re-check interval.
pub fn join_all(chains: &[&dyn Joinable]) {
    join(Duration::from_millis(DEFAULT_JOIN_INTERVAL_MS), chains);
}
