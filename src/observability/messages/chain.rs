// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for chain lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Chain dispatch onto the worker pool and the start of its walk
//! * Nested chain splicing during the walk
//! * Terminal settlement and uncaught rejections
//! * Contract violations by entry functions and panicking continuations

use crate::engine::Status;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Chain handed to the dispatcher.
///
/// # Log Level
/// `debug!` - Per-chain operational detail
///
/// # Example
/// ```
/// use the_chainwood::observability::messages::chain::ChainDispatched;
///
/// let msg = ChainDispatched {
///     chain_id: 1,
///     node_count: 4,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct ChainDispatched {
    pub chain_id: u64,
    pub node_count: usize,
}

impl Display for ChainDispatched {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} dispatched with {} continuation nodes",
            self.chain_id, self.node_count
        )
    }
}

impl StructuredLog for ChainDispatched {
    fn log(&self) {
        tracing::debug!(
            chain_id = self.chain_id,
            node_count = self.node_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "chain_dispatched",
            span_name = name,
            chain_id = self.chain_id,
            node_count = self.node_count,
        )
    }
}

/// A worker picked up the chain and is about to run its entry function.
///
/// # Log Level
/// `trace!` - Per-chain fine detail
pub struct ChainWalkStarted {
    pub chain_id: u64,
    pub node_count: usize,
}

impl Display for ChainWalkStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} walk started ({} nodes)",
            self.chain_id, self.node_count
        )
    }
}

impl StructuredLog for ChainWalkStarted {
    fn log(&self) {
        tracing::trace!(
            chain_id = self.chain_id,
            node_count = self.node_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "chain_walk",
            span_name = name,
            chain_id = self.chain_id,
        )
    }
}

/// The entry deferred its settlement; the walk released its worker.
///
/// # Log Level
/// `trace!` - Per-chain fine detail
pub struct ChainWalkSuspended {
    pub chain_id: u64,
    pub pending_nodes: usize,
}

impl Display for ChainWalkSuspended {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} walk suspended on a deferred entry ({} nodes pending)",
            self.chain_id, self.pending_nodes
        )
    }
}

impl StructuredLog for ChainWalkSuspended {
    fn log(&self) {
        tracing::trace!(
            chain_id = self.chain_id,
            pending_nodes = self.pending_nodes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "chain_walk_suspended",
            span_name = name,
            chain_id = self.chain_id,
        )
    }
}

/// A deferred entry settled and its walk continues on the settling thread.
///
/// # Log Level
/// `trace!` - Per-chain fine detail
pub struct ChainWalkResumed {
    pub chain_id: u64,
    pub pending_nodes: usize,
}

impl Display for ChainWalkResumed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} walk resumed ({} nodes pending)",
            self.chain_id, self.pending_nodes
        )
    }
}

impl StructuredLog for ChainWalkResumed {
    fn log(&self) {
        tracing::trace!(
            chain_id = self.chain_id,
            pending_nodes = self.pending_nodes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "chain_walk",
            span_name = name,
            chain_id = self.chain_id,
        )
    }
}

/// A continuation returned a nested chain that is now part of the outer walk.
///
/// # Log Level
/// `debug!` - Per-chain operational detail
pub struct NestedChainSpliced {
    pub chain_id: u64,
    pub nested_chain_id: u64,
    pub nested_node_count: usize,
}

impl Display for NestedChainSpliced {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} spliced nested chain {} ({} nodes)",
            self.chain_id, self.nested_chain_id, self.nested_node_count
        )
    }
}

impl StructuredLog for NestedChainSpliced {
    fn log(&self) {
        tracing::debug!(
            chain_id = self.chain_id,
            nested_chain_id = self.nested_chain_id,
            nested_node_count = self.nested_node_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "nested_chain_spliced",
            span_name = name,
            chain_id = self.chain_id,
            nested_chain_id = self.nested_chain_id,
        )
    }
}

/// Chain reached its finish node and froze its Root State.
///
/// # Log Level
/// `debug!` - Per-chain operational detail
///
/// # Example
/// ```
/// use the_chainwood::engine::Status;
/// use the_chainwood::observability::messages::chain::ChainSettled;
/// use std::time::Duration;
///
/// let msg = ChainSettled {
///     chain_id: 3,
///     status: Status::Fulfilled,
///     duration: Duration::from_millis(12),
/// };
///
/// assert_eq!(msg.to_string(), "Chain 3 settled as fulfilled after 12ms");
/// ```
pub struct ChainSettled {
    pub chain_id: u64,
    pub status: Status,
    pub duration: std::time::Duration,
}

impl Display for ChainSettled {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} settled as {} after {:?}",
            self.chain_id, self.status, self.duration
        )
    }
}

impl StructuredLog for ChainSettled {
    fn log(&self) {
        tracing::debug!(
            chain_id = self.chain_id,
            status = %self.status,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "chain_settled",
            span_name = name,
            chain_id = self.chain_id,
            status = %self.status,
            duration = ?self.duration,
        )
    }
}

/// A rejection reached the finish node with no `fail` continuation anywhere in the chain.
///
/// # Log Level
/// `warn!` - Unhandled failure, still delivered to `finish`
pub struct UncaughtRejection<'a> {
    pub chain_id: u64,
    pub error: &'a dyn Display,
    pub handler_installed: bool,
}

impl Display for UncaughtRejection<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} rejected without a fail continuation: {}",
            self.chain_id, self.error
        )
    }
}

impl StructuredLog for UncaughtRejection<'_> {
    fn log(&self) {
        tracing::warn!(
            chain_id = self.chain_id,
            error = %self.error,
            handler_installed = self.handler_installed,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "uncaught_rejection",
            span_name = name,
            chain_id = self.chain_id,
            error = %self.error,
        )
    }
}

/// An entry function, continuation or hook panicked.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct StepPanicked<'a> {
    pub chain_id: u64,
    pub step: &'a str,
    pub message: &'a str,
}

impl Display for StepPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} {} panicked: {}",
            self.chain_id, self.step, self.message
        )
    }
}

impl StructuredLog for StepPanicked<'_> {
    fn log(&self) {
        tracing::error!(
            chain_id = self.chain_id,
            step = self.step,
            message = self.message,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "step_panicked",
            span_name = name,
            chain_id = self.chain_id,
            step = self.step,
        )
    }
}

/// A settler was used after its entry function had already returned.
///
/// # Log Level
/// `warn!` - Caller contract violation, ignored
pub struct LateSettlementIgnored<'a> {
    pub chain_id: u64,
    pub action: &'a str,
}

impl Display for LateSettlementIgnored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Chain {} ignored late {}: the entry function had already returned",
            self.chain_id, self.action
        )
    }
}

impl StructuredLog for LateSettlementIgnored<'_> {
    fn log(&self) {
        tracing::warn!(
            chain_id = self.chain_id,
            action = self.action,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "late_settlement_ignored",
            span_name = name,
            chain_id = self.chain_id,
            action = self.action,
        )
    }
}

/// One line of an in-flight registry dump.
///
/// # Log Level
/// `info!` - Requested diagnostic output
pub struct InflightChainReport {
    pub chain_id: u64,
    pub status: Status,
    pub dispatched: bool,
    pub age_ms: u64,
}

impl Display for InflightChainReport {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let stage = if self.dispatched { "dispatched" } else { "building" };
        write!(
            f,
            "In-flight chain {}: {} ({}), age {}ms",
            self.chain_id, self.status, stage, self.age_ms
        )
    }
}

impl StructuredLog for InflightChainReport {
    fn log(&self) {
        tracing::info!(
            chain_id = self.chain_id,
            status = %self.status,
            dispatched = self.dispatched,
            age_ms = self.age_ms,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "inflight_chain",
            span_name = name,
            chain_id = self.chain_id,
        )
    }
}
