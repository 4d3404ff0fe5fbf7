// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::ChainError;

/// A unit of work the dispatcher can run on a worker thread.
///
/// Every task is either run or abandoned, never both. `abandon` is called when the
/// dispatcher refuses or drops the task, with the error describing why.
pub trait Task: Send {
    fn run(self: Box<Self>);

    fn abandon(self: Box<Self>, reason: ChainError);
}

/// Adapts a closure into a [`Task`] that does nothing when abandoned.
pub struct FnTask<F>(pub F);

impl<F> Task for FnTask<F>
where
    F: FnOnce() + Send,
{
    fn run(self: Box<Self>) {
        (self.0)()
    }

    fn abandon(self: Box<Self>, _reason: ChainError) {}
}
