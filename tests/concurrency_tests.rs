//! Concurrency tests for the bounded runner, semaphores and shared memo
//! caches, exercised through the umbrella crate.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use runctl::{ControlConfig, RetryConfig, Semaphore, memoize, retry_async, run_limited};
use tokio::time::sleep;

#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

fn limit(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn staggered_batch_keeps_input_order_on_worker_threads() {
    let gauge = Arc::new(Gauge::default());
    let specs = [("A", 40u64), ("B", 5), ("C", 25), ("D", 10)];

    let tasks: Vec<_> = specs
        .iter()
        .map(|&(name, delay)| {
            let gauge = Arc::clone(&gauge);
            move || async move {
                gauge.enter();
                sleep(Duration::from_millis(delay)).await;
                gauge.exit();
                Ok::<_, String>(name)
            }
        })
        .collect();

    let results = run_limited(tasks, limit(2)).await.unwrap();
    assert_eq!(results, vec!["A", "B", "C", "D"]);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(gauge.active.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn large_batch_with_config_limit() {
    let config = ControlConfig::from_yaml_str("version: \"1.0\"\nlimiter:\n  max_concurrency: 3\n")
        .unwrap();
    let gauge = Arc::new(Gauge::default());

    let tasks: Vec<_> = (0..50u64)
        .map(|i| {
            let gauge = Arc::clone(&gauge);
            move || async move {
                gauge.enter();
                sleep(Duration::from_millis((i * 7) % 13 + 1)).await;
                gauge.exit();
                Ok::<_, std::convert::Infallible>(i)
            }
        })
        .collect();

    let results = run_limited(tasks, config.limiter.limit()).await.unwrap();
    assert_eq!(results, (0..50).collect::<Vec<_>>());
    assert_eq!(gauge.peak.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn flaky_tasks_recover_with_retry_inside_the_batch() {
    let retry = RetryConfig::default()
        .with_base_delay(Duration::from_millis(5))
        .with_jitter(false);
    let attempts = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<_> = (0..6u32)
        .map(|i| {
            let attempts = Arc::clone(&attempts);
            move || async move {
                retry_async(&retry, move |attempt| {
                    let attempts = Arc::clone(&attempts);
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        if i % 2 == 0 && attempt < 2 {
                            Err(format!("task {i} attempt {attempt} failed"))
                        } else {
                            Ok(i)
                        }
                    }
                })
                .await
                .into_result()
            }
        })
        .collect();

    let results = run_limited(tasks, limit(2)).await.unwrap();
    assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
    // Three even tasks take three attempts each, three odd ones take one.
    assert_eq!(attempts.load(Ordering::SeqCst), 12);
}

#[tokio::test(start_paused = true)]
async fn keyed_semaphores_bound_each_upstream_independently() {
    let yaml = r#"
version: "1.0"
limiter:
  default_permits: 2
  semaphores:
    slow-api: 1
"#;
    let config = ControlConfig::from_yaml_str(yaml).unwrap();
    let manager = Arc::new(config.limiter.semaphore_manager());
    let slow = Arc::new(Gauge::default());
    let fast = Arc::new(Gauge::default());

    let mut handles = Vec::new();
    for i in 0..8 {
        let (key, gauge) = if i % 2 == 0 {
            ("slow-api", Arc::clone(&slow))
        } else {
            ("fast-api", Arc::clone(&fast))
        };
        let semaphore = manager.get_or_create(key);
        handles.push(tokio::spawn(async move {
            semaphore
                .run(async {
                    gauge.enter();
                    sleep(Duration::from_millis(10)).await;
                    gauge.exit();
                })
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(slow.peak.load(Ordering::SeqCst), 1);
    assert_eq!(fast.peak.load(Ordering::SeqCst), 2);
    assert!(manager.stats().iter().all(|s| s.in_use() == 0));
}

#[tokio::test(start_paused = true)]
async fn permits_are_returned_when_a_holder_panics() {
    let semaphore = Semaphore::new(1);
    let cloned = semaphore.clone();
    let result = tokio::spawn(async move {
        let _permit = cloned.acquire().await.unwrap();
        if cloned.available_permits() == 0 {
            panic!("holder failed");
        }
    })
    .await;
    assert!(result.is_err());
    assert_eq!(semaphore.available_permits(), 1);
    assert!(semaphore.try_acquire().is_ok());
}

#[test]
fn memo_cache_is_shared_across_threads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let square = Arc::new(memoize(move |n: u64| {
        seen.fetch_add(1, Ordering::SeqCst);
        n * n
    }));

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8u64)
        .map(|t| {
            let square = Arc::clone(&square);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                (0..100u64).map(|n| square.get((n + t) % 10)).sum::<u64>()
            })
        })
        .collect();

    let sums: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let expected: u64 = (0..10u64).map(|n| n * n).sum::<u64>() * 10;
    assert!(sums.iter().all(|&s| s == expected));
    assert_eq!(square.len(), 10);

    // Racing misses may compute a key twice, never more than once per thread.
    let calls = calls.load(Ordering::SeqCst);
    assert!((10..=80).contains(&calls), "calls = {calls}");
    let stats = square.stats();
    assert_eq!(stats.hits + stats.misses, 800);
}
