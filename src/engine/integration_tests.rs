// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::chain::{Chain, Outcome, Settler};
use crate::combinators::{all, join_all};
use crate::config::{DispatcherConfig, OverflowPolicy};
use crate::engine::{Runtime, Status};
use crate::errors::{ChainError, Rejection};
use crate::utils::sleep;

/// End-to-end behaviour of chains running on a real dispatcher
#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> Runtime {
        Runtime::new(DispatcherConfig {
            core_pool_size: 4,
            max_pool_size: 8,
            keep_alive_ms: 1_000,
            ..DispatcherConfig::default()
        })
        .expect("valid dispatcher config")
    }

    /// Append-only log shared between continuations.
    #[derive(Clone, Default)]
    struct Trace(Arc<Mutex<Vec<String>>>);

    impl Trace {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    fn wait_until_registry_empty(runtime: &Runtime) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !runtime.inflight().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_continuations_run_once_in_construction_order() {
        let runtime = runtime();
        let trace = Trace::default();
        let (t1, t2, t3, t4) = (trace.clone(), trace.clone(), trace.clone(), trace.clone());

        let chain = runtime
            .chain(move |settler| {
                t1.push("entry");
                settler.resolve(1_i32)
            })
            .then(move |v| {
                t2.push(format!("then {v}"));
                Ok(Outcome::Value(v + 1))
            })
            .then_void(move |v| {
                t3.push(format!("then_void {v}"));
                Ok(())
            })
            .finish(move || t4.push("finish"));

        chain.execute().unwrap().get().unwrap();
        assert_eq!(
            trace.entries(),
            vec!["entry", "then 1", "then_void 2", "finish"]
        );
    }

    #[test]
    fn test_fail_is_skipped_when_entry_resolves() {
        let runtime = runtime();
        let trace = Trace::default();
        let (then_trace, fail_trace, finish_trace) = (trace.clone(), trace.clone(), trace.clone());

        let chain = runtime
            .chain(|settler| settler.resolve(10_u32))
            .then(move |v| {
                then_trace.push("a");
                Ok(Outcome::Value(v))
            })
            .fail(move |rejection| {
                fail_trace.push("b");
                Err(rejection)
            })
            .finish(move || finish_trace.push("c"));

        assert_eq!(chain.execute().unwrap().get().unwrap(), 10);
        assert_eq!(trace.entries(), vec!["a", "c"]);
    }

    #[test]
    fn test_fail_value_resumes_success_path() {
        let runtime = runtime();
        let chain = runtime
            .chain(|settler: Settler<i32>| settler.reject(Rejection::msg("boom")))
            .map(|v| v * 100)
            .fail(|rejection| {
                assert_eq!(rejection.to_string(), "boom");
                Ok(Outcome::Value(7))
            })
            .map(|v| v + 1)
            .finish(|| {});

        let handle = chain.execute().unwrap();
        assert_eq!(handle.get().unwrap(), 8);
        assert_eq!(handle.status(), Status::Fulfilled);
    }

    #[test]
    fn test_fail_void_yields_none_then_continues() {
        let runtime = runtime();
        let chain = runtime
            .chain(|settler: Settler<u8>| settler.reject(Rejection::msg("lost")))
            .fail_void(|_| Ok(()))
            .map(|value: Option<u8>| value.is_none())
            .finish(|| {});
        assert!(chain.execute().unwrap().get().unwrap());

        let chain = runtime
            .chain(|settler| settler.resolve(4_u8))
            .fail_void(|_| Ok(()))
            .finish(|| {});
        assert_eq!(chain.execute().unwrap().get().unwrap(), Some(4));
    }

    #[test]
    fn test_uncaught_hook_runs_once_before_finish() {
        let runtime = runtime();
        let trace = Trace::default();
        let hook_trace = trace.clone();
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&hook_calls);
        runtime.set_uncaught_exception_handler(move |error| {
            calls.fetch_add(1, Ordering::SeqCst);
            assert!(matches!(error, ChainError::Uncaught(_)));
            hook_trace.push("hook");
        });

        let finish_trace = trace.clone();
        let chain = runtime
            .chain(|settler: Settler<()>| settler.reject(Rejection::msg("unhandled")))
            .then_run(|| Ok(()))
            .finish(move || finish_trace.push("finish"));

        let handle = chain.execute().unwrap();
        match handle.get() {
            Err(ChainError::Execution(rejection)) => {
                assert_eq!(rejection.to_string(), "unhandled")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        assert_eq!(trace.entries(), vec!["hook", "finish"]);
    }

    #[test]
    fn test_hook_not_called_when_any_fail_exists() {
        let runtime = runtime();
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&hook_calls);
        runtime.set_uncaught_exception_handler(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        });

        // the fail node rethrows, so the chain still settles rejected
        let chain = runtime
            .chain(|settler: Settler<u8>| settler.reject(Rejection::msg("handled elsewhere")))
            .fail(|rejection| Err(rejection))
            .finish(|| {});

        assert!(chain.execute().unwrap().get().is_err());
        assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_nested_chain_value_flows_to_outer_nodes() {
        let runtime = runtime();
        let trace = Trace::default();
        let (nested_trace, after_trace) = (trace.clone(), trace.clone());

        let chain = runtime
            .chain(|settler| settler.resolve(5_u64))
            .then(move |value| {
                let nested = Chain::new(move |settler| {
                    thread::sleep(Duration::from_millis(30));
                    nested_trace.push("nested entry");
                    settler.resolve(value * 2)
                })
                .map(|v| v + 1);
                Ok(Outcome::Chained(nested))
            })
            .map(move |value| {
                after_trace.push(format!("outer saw {value}"));
                value
            })
            .finish(|| {});

        assert_eq!(chain.execute().unwrap().get().unwrap(), 11);
        assert_eq!(trace.entries(), vec!["nested entry", "outer saw 11"]);
    }

    #[test]
    fn test_nested_rejection_switches_outer_to_failure_path() {
        let runtime = runtime();
        let chain = runtime
            .chain(|settler| settler.resolve(1_i32))
            .then(|_| {
                Ok(Outcome::Chained(Chain::rejected(Rejection::msg(
                    "nested failure",
                ))))
            })
            .map(|v: i32| v + 1000)
            .fail(|rejection| {
                assert_eq!(rejection.to_string(), "nested failure");
                Ok(Outcome::Value(-1))
            })
            .finish(|| {});

        assert_eq!(chain.execute().unwrap().get().unwrap(), -1);
    }

    #[test]
    fn test_nested_handle_follows_outer_chain() {
        let runtime = runtime();
        let nested = sleep(Duration::from_millis(10)).map(|_| "tagged");
        let nested_handle = nested.handle();
        let nested_id = nested.id();

        let chain = runtime
            .chain(|settler| settler.resolve(()))
            .then(move |_| Ok(Outcome::Chained(nested)))
            .finish(|| {});
        let outer_id = chain.id();
        let handle = chain.execute().unwrap();
        handle.handle().set_tag(3_u16);

        assert_eq!(handle.get().unwrap(), "tagged");
        assert_eq!(nested_handle.id(), outer_id);
        assert_eq!(nested_handle.status(), Status::Fulfilled);
        assert!(!runtime.inflight().contains(nested_id));
        assert!(!Runtime::global().inflight().contains(nested_id));
    }

    #[test]
    fn test_get_timeout_is_not_the_eventual_value() {
        let runtime = runtime();
        let chain = runtime
            .chain(|settler| {
                thread::sleep(Duration::from_millis(200));
                settler.resolve(99_u32)
            })
            .finish(|| {});
        let handle = chain.execute().unwrap();

        let error = handle.get_timeout(Duration::from_millis(50)).unwrap_err();
        assert!(matches!(error, ChainError::Timeout(d) if d == Duration::from_millis(50)));
        assert!(error.rejection().is_none());
        assert_eq!(handle.get().unwrap(), 99);
    }

    #[test]
    fn test_all_rejects_with_member_error_and_siblings_finish() {
        let runtime = runtime();
        let completed = Arc::new(AtomicUsize::new(0));
        let (c1_done, c3_done) = (Arc::clone(&completed), Arc::clone(&completed));

        let c1 = runtime.chain(move |settler| {
            thread::sleep(Duration::from_millis(40));
            c1_done.fetch_add(1, Ordering::SeqCst);
            settler.resolve(1_u8)
        });
        let c2 = runtime.chain(|settler: Settler<u8>| settler.reject(Rejection::msg("c2 failed")));
        let c3 = runtime.chain(move |settler| {
            thread::sleep(Duration::from_millis(60));
            c3_done.fetch_add(1, Ordering::SeqCst);
            settler.resolve(3_u8)
        });

        let combined = all(vec![c1, c2, c3]).unwrap().finish(|| {});
        match combined.execute().unwrap().get() {
            Err(ChainError::Execution(rejection)) => {
                assert_eq!(rejection.to_string(), "c2 failed")
            }
            other => panic!("expected c2's rejection, got {other:?}"),
        }
        assert_eq!(completed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_nested_all_settles_with_one_worker() {
        let runtime = Runtime::new(DispatcherConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            ..DispatcherConfig::default()
        })
        .unwrap();
        let member = |value: u32| runtime.chain(move |settler| settler.resolve(value));

        let inner = all(vec![member(1), member(2)]).unwrap();
        let outer = all(vec![inner, all(vec![member(3)]).unwrap()])
            .unwrap()
            .finish(|| {});

        let values = outer
            .execute()
            .unwrap()
            .get_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(values, vec![vec![1, 2], vec![3]]);
        wait_until_registry_empty(&runtime);
        assert!(runtime.inflight().is_empty());
    }

    #[test]
    fn test_delayed_resolve_then_increment() {
        let runtime = runtime();
        let started = Instant::now();
        let chain = runtime
            .chain(|settler| {
                thread::sleep(Duration::from_millis(50));
                settler.resolve(1_i32)
            })
            .then(|v| Ok(Outcome::Value(v + 1)))
            .finish(|| {});

        let handle = chain.execute().unwrap();
        assert_eq!(handle.get().unwrap(), 2);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_second_and_later_execute_are_invalid() {
        let runtime = runtime();
        let chain = runtime.chain(|settler| settler.resolve(())).finish(|| {});

        let handle = chain.execute().unwrap();
        for _ in 0..3 {
            assert!(matches!(chain.execute(), Err(ChainError::InvalidState(_))));
        }
        handle.get().unwrap();
        assert!(matches!(chain.execute(), Err(ChainError::InvalidState(_))));
    }

    #[test]
    fn test_concurrent_execute_has_one_winner() {
        let runtime = runtime();
        let chain = Arc::new(runtime.chain(|settler| settler.resolve(1_u8)).finish(|| {}));

        let winners: usize = (0..8)
            .map(|_| {
                let chain = Arc::clone(&chain);
                thread::spawn(move || chain.execute().is_ok())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|racer| racer.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
    }

    #[test]
    fn test_continuation_error_and_panic_reject_the_rest() {
        let runtime = runtime();
        let chain = runtime
            .chain(|settler| settler.resolve("12x".to_string()))
            .then(|text| Ok(Outcome::Value(text.parse::<u32>()?)))
            .finish(|| {});
        let error = chain.execute().unwrap().get().unwrap_err();
        assert!(error
            .rejection()
            .and_then(|r| r.downcast_ref::<std::num::ParseIntError>())
            .is_some());

        let chain = runtime
            .chain(|settler| settler.resolve(0_u8))
            .map(|_| -> u8 { panic!("bad continuation") })
            .finish(|| {});
        match chain.execute().unwrap().get() {
            Err(ChainError::Execution(rejection)) => assert!(matches!(
                rejection.downcast_ref::<ChainError>(),
                Some(ChainError::Panicked(message)) if message.contains("bad continuation")
            )),
            other => panic!("expected panic rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_unsettled_entry_rejects_instead_of_hanging() {
        let runtime = runtime();
        let chain = runtime.chain(|_settler: Settler<u8>| {}).finish(|| {});
        match chain.execute().unwrap().get_timeout(Duration::from_secs(2)) {
            Err(ChainError::Execution(rejection)) => assert!(matches!(
                rejection.downcast_ref::<ChainError>(),
                Some(ChainError::Unsettled)
            )),
            other => panic!("expected unsettled rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_finish_side_effects_visible_after_get() {
        let runtime = runtime();
        let finished = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&finished);
        let chain = runtime
            .chain(|settler| settler.resolve(()))
            .finish(move || {
                flag.store(1, Ordering::SeqCst);
            });

        chain.execute().unwrap().get().unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_tracks_chain_until_settled() {
        let runtime = runtime();
        let (release, hold) = std::sync::mpsc::channel::<()>();
        let chain = runtime
            .chain(move |settler| {
                let _ = hold.recv_timeout(Duration::from_secs(5));
                settler.resolve(())
            })
            .finish(|| {});
        let id = chain.id();
        let handle = chain.execute().unwrap();

        let snapshot = runtime.inflight().snapshot();
        let entry = snapshot.iter().find(|c| c.id == id).expect("registered");
        assert!(entry.dispatched);
        assert_eq!(entry.status, Status::Pending);

        release.send(()).unwrap();
        handle.get().unwrap();
        wait_until_registry_empty(&runtime);
        assert!(!runtime.inflight().contains(id));
    }

    #[test]
    fn test_abort_policy_settles_refused_chain() {
        let runtime = Runtime::new(DispatcherConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            queue_capacity: 0,
            overflow_policy: OverflowPolicy::Abort,
            ..DispatcherConfig::default()
        })
        .unwrap();

        let (release, hold) = std::sync::mpsc::channel::<()>();
        let busy = runtime
            .chain(move |settler| {
                let _ = hold.recv_timeout(Duration::from_secs(5));
                settler.resolve(())
            })
            .finish(|| {});
        let busy_handle = busy.execute().unwrap();

        let refused = runtime.chain(|settler| settler.resolve(1_u8)).finish(|| {});
        let refused_handle = refused.handle();
        assert!(matches!(
            refused.execute(),
            Err(ChainError::WorkerRejected {
                policy: OverflowPolicy::Abort,
                ..
            })
        ));
        assert_eq!(refused_handle.status(), Status::Rejected);

        release.send(()).unwrap();
        busy_handle.get().unwrap();
    }

    #[test]
    fn test_discard_policy_rejects_through_wait_handle() {
        let runtime = Runtime::new(DispatcherConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            queue_capacity: 0,
            overflow_policy: OverflowPolicy::Discard,
            ..DispatcherConfig::default()
        })
        .unwrap();

        let (release, hold) = std::sync::mpsc::channel::<()>();
        let busy = runtime
            .chain(move |settler| {
                let _ = hold.recv_timeout(Duration::from_secs(5));
                settler.resolve(())
            })
            .finish(|| {});
        let busy_handle = busy.execute().unwrap();

        let dropped = runtime.chain(|settler| settler.resolve(1_u8)).finish(|| {});
        let dropped_handle = dropped.execute().unwrap();
        match dropped_handle.get() {
            Err(ChainError::Execution(rejection)) => assert!(matches!(
                rejection.downcast_ref::<ChainError>(),
                Some(ChainError::WorkerRejected {
                    policy: OverflowPolicy::Discard,
                    ..
                })
            )),
            other => panic!("expected discard rejection, got {other:?}"),
        }

        release.send(()).unwrap();
        busy_handle.get().unwrap();
    }

    #[test]
    fn test_caller_runs_policy_walks_on_caller_thread() {
        let runtime = Runtime::new(DispatcherConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            queue_capacity: 0,
            overflow_policy: OverflowPolicy::CallerRuns,
            ..DispatcherConfig::default()
        })
        .unwrap();

        let (release, hold) = std::sync::mpsc::channel::<()>();
        let busy = runtime
            .chain(move |settler| {
                let _ = hold.recv_timeout(Duration::from_secs(5));
                settler.resolve(())
            })
            .finish(|| {});
        let busy_handle = busy.execute().unwrap();

        let caller = thread::current().id();
        let inline = runtime
            .chain(|settler| settler.resolve(thread::current().id()))
            .finish(|| {});
        let handle = inline.execute().unwrap();
        assert!(handle.is_done());
        assert_eq!(handle.get().unwrap(), caller);

        release.send(()).unwrap();
        busy_handle.get().unwrap();
    }

    #[test]
    fn test_join_drains_mixed_batch() {
        let runtime = runtime();
        let trace = Trace::default();
        let (a, b) = (trace.clone(), trace.clone());

        let first = runtime
            .chain(move |settler| {
                thread::sleep(Duration::from_millis(20));
                a.push("first");
                settler.resolve(())
            })
            .finish(|| {});
        let second = runtime
            .chain(move |settler: Settler<()>| {
                b.push("second");
                settler.reject(Rejection::msg("second failed"))
            })
            .fail_void(|_| Ok(()))
            .finish(|| {});
        let second_handle = second.execute().unwrap();

        join_all(&[&first, &second_handle]);

        assert_eq!(first.status(), Status::Fulfilled);
        assert_eq!(second_handle.get().unwrap(), None);
        let mut entries = trace.entries();
        entries.sort();
        assert_eq!(entries, vec!["first", "second"]);
    }

    #[test]
    fn test_tag_is_visible_across_threads() {
        let runtime = runtime();
        let chain = runtime
            .chain(|settler| settler.resolve(()))
            .finish(|| {});
        let handle = chain.handle();
        handle.set_tag(String::from("request-17"));

        let waiter = chain.execute().unwrap();
        waiter.get().unwrap();
        let seen = thread::spawn(move || handle.tag::<String>())
            .join()
            .unwrap();
        assert_eq!(seen.as_deref().map(String::as_str), Some("request-17"));
    }

    #[tokio::test]
    async fn test_wait_handle_can_be_awaited() {
        let runtime = runtime();
        let chain = runtime
            .chain(|settler| {
                thread::sleep(Duration::from_millis(20));
                settler.resolve(vec![1, 2, 3])
            })
            .finish(|| {});

        let values = chain.execute().unwrap().settled().await.unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
