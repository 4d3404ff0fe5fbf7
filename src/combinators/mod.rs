// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Combining several chains.
//!
//! * [`all`] builds one chain that runs every member and settles with all of their
//!   values in input order, or with the first rejection observed.
//! * [`join`] blocks the calling thread until every given chain has settled,
//!   dispatching the ones nobody started yet.

mod all;
mod join;
mod latch;

pub use all::all;
pub use join::{join, join_all};
