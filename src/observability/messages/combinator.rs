// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for `all` and `join` batches.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// An `all` batch dispatched its member chains.
///
/// # Log Level
/// `debug!` - Per-batch operational detail
pub struct AllDispatched {
    pub chain_id: u64,
    pub member_count: usize,
}

impl Display for AllDispatched {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Combinator chain {} dispatched {} member chains",
            self.chain_id, self.member_count
        )
    }
}

impl StructuredLog for AllDispatched {
    fn log(&self) {
        tracing::debug!(
            chain_id = self.chain_id,
            member_count = self.member_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "all",
            span_name = name,
            chain_id = self.chain_id,
            member_count = self.member_count,
        )
    }
}

/// Every member of an `all` batch left `Pending`.
///
/// # Log Level
/// `debug!` - Per-batch operational detail
///
/// # Example
/// ```
/// use the_chainwood::observability::messages::combinator::AllCompleted;
/// use std::time::Duration;
///
/// let msg = AllCompleted {
///     chain_id: 9,
///     member_count: 3,
///     failed: true,
///     duration: Duration::from_millis(40),
/// };
///
/// assert!(msg.to_string().contains("first error wins"));
/// ```
pub struct AllCompleted {
    pub chain_id: u64,
    pub member_count: usize,
    pub failed: bool,
    pub duration: std::time::Duration,
}

impl Display for AllCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let outcome = if self.failed {
            "rejected (first error wins)"
        } else {
            "fulfilled"
        };
        write!(
            f,
            "Combinator chain {} {} after {} members settled in {:?}",
            self.chain_id, outcome, self.member_count, self.duration
        )
    }
}

impl StructuredLog for AllCompleted {
    fn log(&self) {
        tracing::debug!(
            chain_id = self.chain_id,
            member_count = self.member_count,
            failed = self.failed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "all_completed",
            span_name = name,
            chain_id = self.chain_id,
            failed = self.failed,
        )
    }
}

/// A `join` drain returned.
///
/// # Log Level
/// `debug!` - Per-batch operational detail
pub struct JoinDrained {
    pub handle_count: usize,
    pub auto_dispatched: usize,
    pub duration: std::time::Duration,
}

impl Display for JoinDrained {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Joined {} chains ({} dispatched by join) in {:?}",
            self.handle_count, self.auto_dispatched, self.duration
        )
    }
}

impl StructuredLog for JoinDrained {
    fn log(&self) {
        tracing::debug!(
            handle_count = self.handle_count,
            auto_dispatched = self.auto_dispatched,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "join",
            span_name = name,
            handle_count = self.handle_count,
        )
    }
}
