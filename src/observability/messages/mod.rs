// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit it at its documented level with the same data attached
//! as structured `tracing` fields.
//!
//! # Organization
//!
//! * `chain` - chain dispatch, splicing and settlement events
//! * `dispatcher` - worker pool lifecycle and overflow events
//! * `combinator` - `all` / `join` batch events

use tracing::Span;

pub mod chain;
pub mod combinator;
pub mod dispatcher;

/// A message that knows its own log level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a `tracing` event.
    fn log(&self);

    /// Build a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
