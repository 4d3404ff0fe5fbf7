// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::any::Any;
use std::thread;
use std::time::Duration;

use crate::chain::Chain;

/// A chain that resolves with `()` after blocking its worker for `duration`.
///
/// Useful as a nested chain to delay the rest of an outer chain:
///
/// ```
/// use std::time::{Duration, Instant};
/// use the_chainwood::chain::{Chain, Outcome};
/// use the_chainwood::utils::sleep;
///
/// let started = Instant::now();
/// let chain = Chain::new(|settler| settler.resolve(1))
///     .then(|value: i32| Ok(Outcome::Chained(sleep(Duration::from_millis(20)).map(move |_| value))))
///     .finish(|| {});
///
/// assert_eq!(chain.execute().unwrap().get().unwrap(), 1);
/// assert!(started.elapsed() >= Duration::from_millis(20));
/// ```
pub fn sleep(duration: Duration) -> Chain<()> {
    Chain::new(move |settler| {
        thread::sleep(duration);
        settler.resolve(());
    })
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
