// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging throughout The Chainwood. Message types follow a struct-based pattern
//! with `Display` trait implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep field names consistent between the human-readable line and structured fields
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::chain` - chain dispatch, splicing and settlement events
//! * `messages::dispatcher` - worker pool lifecycle and overflow events
//! * `messages::combinator` - `all` / `join` batch events
//!
//! # Usage
//!
//! ```rust
//! use the_chainwood::observability::messages::{chain::ChainDispatched, StructuredLog};
//!
//! let msg = ChainDispatched {
//!     chain_id: 7,
//!     node_count: 3,
//! };
//!
//! msg.log();
//! ```

pub mod messages;
