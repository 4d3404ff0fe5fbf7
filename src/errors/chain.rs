// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors surfaced by chain construction, dispatch, waiting and the combinators.

use std::time::Duration;
use thiserror::Error;

use crate::config::OverflowPolicy;
use crate::errors::Rejection;

/// Every error the chain engine reports to callers.
///
/// Only [`ChainError::Execution`] carries a real rejection produced by user code; the
/// remaining variants describe misuse of the engine or conditions of the waiting caller.
/// In particular [`ChainError::Timeout`] never means the chain failed, only that the
/// caller stopped waiting.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// The operation is not valid for the chain's current lifecycle state
    /// (double `execute()`, an already-dispatched chain passed to `all`).
    #[error("Invalid chain state: {0}")]
    InvalidState(String),

    /// `all` was called without any chains.
    #[error("Combinator input must contain at least one chain")]
    EmptyCombinatorInput,

    /// A bounded wait elapsed before the chain settled.
    #[error("Timed out after {0:?} waiting for chain result")]
    Timeout(Duration),

    /// The chain settled on its failure path; wraps the original rejection.
    #[error("Chain rejected: {0}")]
    Execution(Rejection),

    /// A rejection reached the finish stage without any `fail` continuation in the chain.
    #[error("Uncaught chain rejection: {0}")]
    Uncaught(Rejection),

    /// The dispatcher refused the chain's entry task.
    #[error("Dispatcher rejected work under {policy:?} policy: {reason}")]
    WorkerRejected {
        policy: OverflowPolicy,
        reason: String,
    },

    /// Wait handles cannot be cancelled.
    #[error("Operation not supported: chains cannot be cancelled once dispatched")]
    Unsupported,

    /// The entry function returned without resolving or rejecting its settler.
    #[error("Entry function returned without resolving or rejecting")]
    Unsettled,

    /// An entry function or continuation panicked.
    #[error("Chain step panicked: {0}")]
    Panicked(String),
}

impl ChainError {
    /// The user rejection behind an `Execution` or `Uncaught` error.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ChainError::Execution(rejection) | ChainError::Uncaught(rejection) => Some(rejection),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ChainError::Timeout(_))
    }
}
