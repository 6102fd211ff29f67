use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use runctl::{
    ControlConfig, Debouncer, Object, Throttler, Value, deep_clone, memoize, retry_async,
    run_limited,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ControlConfig::from_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => ControlConfig::default(),
    };
    tracing::info!(name = ?config.name, version = %config.version, "runctl demo starting");

    // Debounce: five quick keystrokes, one save.
    let saves = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&saves);
    let save = Debouncer::new(
        move |text: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            tracing::info!(%text, "debounced save");
        },
        config.debounce,
    )?;
    for text in ["h", "he", "hel", "hell", "hello"] {
        save.call(text.to_string());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    save.flush();

    // Throttle: a scroll storm.
    let scroll = Throttler::new(
        |offset: u32| tracing::info!(offset, "throttled scroll"),
        config.throttle,
    )?;
    for offset in 0..20 {
        scroll.call(offset * 10);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Bounded fan-out with per-task retry.
    let retry = config.retry;
    let tasks: Vec<_> = (0..8u64)
        .map(|i| {
            move || async move {
                retry_async(&retry, move |attempt| async move {
                    if i == 3 && attempt == 0 {
                        return Err(format!("task {i} flaked"));
                    }
                    tokio::time::sleep(Duration::from_millis(10 * (8 - i))).await;
                    Ok(i * i)
                })
                .await
                .into_result()
            }
        })
        .collect();
    let squares = run_limited(tasks, config.limiter.limit())
        .await
        .map_err(anyhow::Error::msg)?;
    tracing::info!(?squares, "bounded batch finished");

    // Memoization.
    let slow_len = memoize(|s: String| s.chars().count());
    for _ in 0..3 {
        slow_len.get("memoized".to_string());
    }
    tracing::info!(stats = ?slow_len.stats(), "memo stats");

    // Deep clone of a cyclic graph.
    let node = Object::plain();
    node.set("label", "root");
    node.set("self", node.clone());
    let copy = deep_clone(&Value::from(node.clone()));
    let copy_is_cyclic = copy
        .as_object()
        .is_some_and(|c| c.get("self") == Value::from(c.clone()));
    tracing::info!(copy_is_cyclic, shares_source = copy == runctl::Value::from(node), "deep clone done");

    tracing::info!(saves = saves.load(Ordering::SeqCst), "runctl demo finished");
    Ok(())
}
