// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use the_chainwood::chain::{Outcome, Settler};
use the_chainwood::combinators::{all, join_all};
use the_chainwood::config::{load_and_validate_config, Config};
use the_chainwood::engine::Runtime;
use the_chainwood::errors::Rejection;
use the_chainwood::utils::sleep;
use tracing_subscriber::EnvFilter;

/// One runnable walkthrough of the chain engine.
struct Scenario {
    title: &'static str,
    description: &'static str,
    run: fn(&Runtime) -> anyhow::Result<()>,
}

fn wait_for_keypress(prompt: &str) -> io::Result<()> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let interactive = args.iter().any(|arg| arg == "--demo-mode");
    let config_file = args.iter().skip(1).find(|arg| !arg.starts_with("--"));

    let config = match config_file {
        Some(path) => load_and_validate_config(path)?,
        None => Config::default(),
    };
    let runtime = Runtime::global();
    runtime.init(config.dispatcher.clone())?;

    println!("🔗 Chainwood Deferred Computation Demo");
    println!("═══════════════════════════════════════");
    println!(
        "⚙️  Dispatcher: core={} max={} queue={} overflow={:?}",
        config.dispatcher.core_pool_size,
        config.dispatcher.max_pool_size,
        config.dispatcher.queue_capacity,
        config.dispatcher.overflow_policy
    );
    println!();

    let scenarios = scenarios();
    for (i, scenario) in scenarios.iter().enumerate() {
        if i > 0 {
            println!("\n{}", "─".repeat(80));
        }
        println!("Scenario {}: {}", i + 1, scenario.title);
        println!("📖 {}", scenario.description);
        if interactive {
            wait_for_keypress("Press Enter to run it... ")?;
        }

        let started = Instant::now();
        match (scenario.run)(runtime) {
            Ok(()) => println!("✅ Completed in {:?}", started.elapsed()),
            Err(e) => eprintln!("❌ Scenario failed: {}", e),
        }
    }

    println!("\n📋 Chains still in flight: {}", runtime.inflight().len());
    runtime.shutdown();
    println!("🎉 Demo complete!");
    Ok(())
}

fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            title: "Linear chain",
            description: "An entry value flows through typed continuations into finish",
            run: linear_chain,
        },
        Scenario {
            title: "Failure recovery",
            description: "A fail continuation turns a rejection back into a value",
            run: failure_recovery,
        },
        Scenario {
            title: "Nested chain",
            description: "A continuation returns a chain that is spliced into the walk",
            run: nested_chain,
        },
        Scenario {
            title: "All combinator",
            description: "Three chains run concurrently; values come back in input order",
            run: all_combinator,
        },
        Scenario {
            title: "Timeouts and uncaught rejections",
            description: "A bounded wait gives up early; an unhandled rejection reaches the hook",
            run: timeout_and_uncaught,
        },
    ]
}

fn linear_chain(runtime: &Runtime) -> anyhow::Result<()> {
    let chain = runtime
        .chain(|settler| settler.resolve("hello world".to_string()))
        .map(|text: String| text.to_uppercase())
        .then(|text| Ok(Outcome::Value(text.len())))
        .finish(|| println!("   🏁 finish ran"));

    let length = chain.execute()?.get()?;
    println!("   Result: {}", length);
    Ok(())
}

fn failure_recovery(runtime: &Runtime) -> anyhow::Result<()> {
    let chain = runtime
        .chain(|settler: Settler<u32>| {
            settler.reject(Rejection::msg("sensor offline"))
        })
        .map(|reading| reading * 2)
        .fail(|rejection| {
            println!("   ⚠️  Recovering from: {}", rejection);
            Ok(Outcome::Value(0))
        })
        .map(|reading| reading + 1)
        .finish(|| {});

    println!("   Result: {}", chain.execute()?.get()?);
    Ok(())
}

fn nested_chain(runtime: &Runtime) -> anyhow::Result<()> {
    let chain = runtime
        .chain(|settler| settler.resolve(1_u64))
        .then(|value| {
            let delayed = sleep(Duration::from_millis(50)).map(move |_| value + 1);
            Ok(Outcome::Chained(delayed))
        })
        .finish(|| {});

    let started = Instant::now();
    let value = chain.execute()?.get()?;
    println!("   Result: {} after {:?}", value, started.elapsed());
    Ok(())
}

fn all_combinator(runtime: &Runtime) -> anyhow::Result<()> {
    let chains = (1..=3_u64)
        .map(|i| {
            runtime.chain(move |settler| {
                std::thread::sleep(Duration::from_millis(30 * (4 - i)));
                settler.resolve(i * 10);
            })
        })
        .collect();

    let combined = all(chains)?.finish(|| {});
    println!("   Values: {:?}", combined.execute()?.get()?);
    Ok(())
}

fn timeout_and_uncaught(runtime: &Runtime) -> anyhow::Result<()> {
    let uncaught = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&uncaught);
    runtime.set_uncaught_exception_handler(move |error| {
        counter.fetch_add(1, Ordering::SeqCst);
        println!("   🚨 Uncaught: {}", error);
    });

    let slow = runtime
        .chain(|settler| {
            std::thread::sleep(Duration::from_millis(200));
            settler.resolve(())
        })
        .finish(|| {});
    let handle = slow.execute()?;
    match handle.get_timeout(Duration::from_millis(50)) {
        Err(e) if e.is_timeout() => println!("   ⏱️  {}", e),
        other => println!("   Unexpected: {:?}", other),
    }

    let failing = runtime
        .chain(|settler: Settler<()>| settler.reject(Rejection::msg("nobody listens")))
        .finish(|| {});
    join_all(&[&handle, &failing]);

    println!("   Uncaught rejections reported: {}", uncaught.load(Ordering::SeqCst));
    runtime.clear_uncaught_exception_handler();
    Ok(())
}
