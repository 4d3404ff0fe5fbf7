// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The error value carried down a chain's failure path.

use std::fmt;
use std::sync::Arc;

/// A rejection flowing through a chain.
///
/// `Rejection` wraps an [`anyhow::Error`] behind an `Arc` so the same failure can be
/// handed to a `fail` continuation, stored in the Root State, and returned from every
/// `WaitHandle::get` call without losing the original cause.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into a `Rejection`, which
/// lets continuations use `?` on ordinary fallible calls:
///
/// ```
/// use the_chainwood::errors::Rejection;
///
/// fn parse(text: &str) -> Result<u32, Rejection> {
///     Ok(text.trim().parse::<u32>()?)
/// }
///
/// assert_eq!(parse(" 42 ").unwrap(), 42);
/// assert!(parse("forty-two").is_err());
/// ```
#[derive(Clone)]
pub struct Rejection(Arc<anyhow::Error>);

impl Rejection {
    /// Build a rejection from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(anyhow::Error::msg(message)))
    }

    /// Wrap an existing [`anyhow::Error`], keeping its context chain.
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    /// Borrow the underlying error.
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }

    /// Attempt to view the original cause as a concrete error type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// The innermost error in the cause chain.
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.0.root_cause()
    }
}

impl<E> From<E> for Rejection
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self(Arc::new(anyhow::Error::new(error)))
    }
}


impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Rejection").field(&self.0.to_string()).finish()
    }
}
