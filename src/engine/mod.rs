// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Chain execution: shared state, the walker, waiting, and runtime services.

pub mod registry;
pub mod root_state;
pub mod runtime;
pub mod wait_handle;
pub(crate) mod walker;
#[cfg(test)]
pub mod integration_tests;

pub use registry::{InflightChain, InflightRegistry};
pub use root_state::{ChainHandle, ChainId, Status};
pub use runtime::{
    clear_uncaught_exception_handler, set_uncaught_exception_handler, Runtime, UncaughtHandler,
};
pub use wait_handle::{Settled, WaitHandle};
