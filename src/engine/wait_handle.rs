// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use crate::engine::root_state::{ChainHandle, RootInner, RootState};
use crate::engine::Status;
use crate::errors::ChainError;

/// The caller's view of an executed chain.
///
/// `get` blocks until the chain settles and returns a clone of the final value, so it
/// can be called any number of times from any number of threads. Waiting is passive:
/// the caller sleeps on the Root State's condition variable until the finish stage
/// wakes it.
///
/// # Errors
///
/// * [`ChainError::Execution`] - the chain settled `Rejected`
/// * [`ChainError::Timeout`] - a bounded wait elapsed; the chain keeps running
pub struct WaitHandle<T> {
    root: Arc<RootState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> WaitHandle<T> {
    pub(crate) fn new(root: Arc<RootState>) -> Self {
        Self {
            root,
            _marker: PhantomData,
        }
    }

    pub fn status(&self) -> Status {
        self.root.status()
    }

    /// `true` once the chain left `Pending`, on either path.
    pub fn is_done(&self) -> bool {
        self.status().is_settled()
    }

    pub fn handle(&self) -> ChainHandle {
        ChainHandle::new(Arc::clone(&self.root))
    }

    /// Chains cannot be interrupted; always fails with [`ChainError::Unsupported`].
    pub fn cancel(&self) -> Result<(), ChainError> {
        Err(ChainError::Unsupported)
    }

    pub fn is_cancelled(&self) -> bool {
        false
    }
}

impl<T: Clone + 'static> WaitHandle<T> {
    /// Block until the chain settles.
    pub fn get(&self) -> Result<T, ChainError> {
        let inner = self.root.wait_settled(None);
        read_result::<T>(&inner).unwrap_or_else(|| {
            Err(ChainError::InvalidState(
                "chain woke its waiters without settling".to_string(),
            ))
        })
    }

    /// Block for at most `timeout`.
    ///
    /// A timeout too large to express as a deadline waits without bound.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T, ChainError> {
        let inner = self.root.wait_settled(Instant::now().checked_add(timeout));
        read_result::<T>(&inner).unwrap_or(Err(ChainError::Timeout(timeout)))
    }

    /// The result if the chain already settled.
    pub fn try_get(&self) -> Option<Result<T, ChainError>> {
        read_result::<T>(&self.root.lock())
    }

    /// A future that resolves when the chain settles, for callers inside an async runtime.
    pub fn settled(&self) -> Settled<T> {
        Settled {
            root: Arc::clone(&self.root),
            _marker: PhantomData,
        }
    }
}

fn read_result<T: Clone + 'static>(inner: &RootInner) -> Option<Result<T, ChainError>> {
    let result = inner.result()?;
    Some(match result {
        Ok(payload) => (**payload).downcast_ref::<T>().cloned().ok_or_else(|| {
            ChainError::InvalidState(format!(
                "chain result is not a {}",
                std::any::type_name::<T>()
            ))
        }),
        Err(rejection) => Err(ChainError::Execution(rejection.clone())),
    })
}

impl<T> Clone for WaitHandle<T> {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.root))
    }
}

impl<T> fmt::Debug for WaitHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WaitHandle").field(&self.root).finish()
    }
}

/// Future returned by [`WaitHandle::settled`].
pub struct Settled<T> {
    root: Arc<RootState>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + 'static> Future for Settled<T> {
    type Output = Result<T, ChainError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.root.register_waker(cx.waker()) {
            return Poll::Pending;
        }
        match read_result::<T>(&self.root.lock()) {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Rejection;
    use std::thread;

    fn settle_later(root: &Arc<RootState>, after: Duration, value: u32) -> thread::JoinHandle<()> {
        let root = Arc::clone(root);
        thread::spawn(move || {
            thread::sleep(after);
            root.settle(Ok(Box::new(value)));
        })
    }

    #[test]
    fn test_get_is_repeatable() {
        let root = RootState::new();
        root.settle(Ok(Box::new(String::from("done"))));
        let handle = WaitHandle::<String>::new(root);

        assert_eq!(handle.get().unwrap(), "done");
        assert_eq!(handle.get().unwrap(), "done");
        assert!(handle.is_done());
    }

    #[test]
    fn test_get_reports_rejection() {
        let root = RootState::new();
        root.settle(Err(Rejection::msg("broken")));
        let handle = WaitHandle::<u32>::new(root);

        match handle.get() {
            Err(ChainError::Execution(rejection)) => assert_eq!(rejection.to_string(), "broken"),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_get_timeout_then_get() {
        let root = RootState::new();
        let handle = WaitHandle::<u32>::new(Arc::clone(&root));
        let worker = settle_later(&root, Duration::from_millis(100), 5);

        let error = handle.get_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(error.is_timeout());
        assert_eq!(handle.status(), Status::Pending);

        assert_eq!(handle.get().unwrap(), 5);
        worker.join().unwrap();
    }

    #[test]
    fn test_unbounded_timeout_waits_for_settlement() {
        let root = RootState::new();
        let handle = WaitHandle::<u32>::new(Arc::clone(&root));
        let worker = settle_later(&root, Duration::from_millis(20), 11);

        assert_eq!(handle.get_timeout(Duration::MAX).unwrap(), 11);
        worker.join().unwrap();
    }

    #[test]
    fn test_try_get_and_cancel() {
        let root = RootState::new();
        let handle = WaitHandle::<u32>::new(Arc::clone(&root));
        assert!(handle.try_get().is_none());
        assert!(matches!(handle.cancel(), Err(ChainError::Unsupported)));
        assert!(!handle.is_cancelled());

        root.settle(Ok(Box::new(1_u32)));
        assert_eq!(handle.try_get().unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_settled_future_resolves() {
        let root = RootState::new();
        let handle = WaitHandle::<u32>::new(Arc::clone(&root));
        let worker = settle_later(&root, Duration::from_millis(20), 11);

        assert_eq!(handle.settled().await.unwrap(), 11);
        worker.join().unwrap();
    }
}
