// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod chain;       // chain builder, settler, continuations
pub mod combinators; // all + join
pub mod config;      // dispatcher config loading
pub mod dispatcher;  // worker pool
pub mod engine;      // root state, walker, wait handles, runtime
pub mod errors;      // error handling
pub mod observability;
pub mod traits;      // task + joinable abstractions
pub mod utils;

pub use chain::{Chain, DeferredSettler, ExecutableChain, Outcome, Settler};
pub use combinators::{all, join, join_all};
pub use engine::{ChainHandle, Runtime, Status, WaitHandle};
pub use errors::{ChainError, Rejection};
