// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Counts member chains down to zero; waiters sleep until it gets there.
pub(crate) struct BatchLatch {
    remaining: Mutex<usize>,
    drained: Condvar,
}

impl BatchLatch {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            drained: Condvar::new(),
        }
    }

    /// Returns `true` for the call that brought the count to zero.
    pub(crate) fn count_down(&self) -> bool {
        let mut remaining = self.remaining.lock();
        let last = *remaining == 1;
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.drained.notify_all();
        }
        last
    }

    pub(crate) fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.drained.wait(&mut remaining);
        }
    }

    /// Wait at most `timeout`; returns `true` if the count reached zero.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.wait();
            return true;
        };
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self.drained.wait_until(&mut remaining, deadline).timed_out() {
                break;
            }
        }
        *remaining == 0
    }
}
