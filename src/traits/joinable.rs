// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::chain::ExecutableChain;
use crate::engine::{ChainHandle, WaitHandle};
use crate::errors::ChainError;

/// Anything `join` can wait on.
pub trait Joinable: Send + Sync {
    fn chain_handle(&self) -> ChainHandle;

    /// Start the chain if nobody has started it yet.
    ///
    /// Returns `Ok(true)` only when this call performed the dispatch.
    fn dispatch_if_idle(&self) -> Result<bool, ChainError>;
}

impl<T: Send + 'static> Joinable for ExecutableChain<T> {
    fn chain_handle(&self) -> ChainHandle {
        self.handle()
    }

    fn dispatch_if_idle(&self) -> Result<bool, ChainError> {
        if self.handle().is_dispatched() {
            return Ok(false);
        }
        match self.execute() {
            Ok(_) => Ok(true),
            // lost a race with another dispatcher of the same chain
            Err(ChainError::InvalidState(_)) => Ok(false),
            Err(error) => Err(error),
        }
    }
}

impl<T> Joinable for WaitHandle<T> {
    fn chain_handle(&self) -> ChainHandle {
        self.handle()
    }

    fn dispatch_if_idle(&self) -> Result<bool, ChainError> {
        Ok(false)
    }
}
