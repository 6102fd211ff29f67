//! Bounded task runner.
//!
//! Starts at most `limit` tasks at a time from a batch and collects their
//! values in input order. The first failure ends the batch:
//!
//! - its error is returned unchanged;
//! - tasks already running are detached and keep running, their values are
//!   discarded;
//! - tasks not yet started are never started.
//!
//! Callers that want every task to run and every error collected should make
//! each task infallible (e.g. return `Result<Result<T, E>, Infallible>`).

use std::future::Future;
use std::num::NonZeroUsize;

use futures::stream::{FuturesUnordered, StreamExt};

/// Run `tasks` with at most `limit` in flight and return their values in
/// input order.
///
/// Each task is a closure producing the future to run; the closure is called
/// when the task is started, not before. A task that panics re-raises its
/// panic in the caller.
///
/// # Example
///
/// ```
/// use std::num::NonZeroUsize;
/// use limiter::run_limited;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tasks: Vec<_> = (1..=4u32)
///     .map(|n| move || async move { Ok::<_, String>(n * n) })
///     .collect();
///
/// let squares = run_limited(tasks, NonZeroUsize::new(2).unwrap()).await;
/// assert_eq!(squares, Ok(vec![1, 4, 9, 16]));
/// # }
/// ```
pub async fn run_limited<F, Fut, T, E>(tasks: Vec<F>, limit: NonZeroUsize) -> Result<Vec<T>, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let total = tasks.len();
    let mut queue = tasks.into_iter();
    let mut results: Vec<Option<T>> = std::iter::repeat_with(|| None).take(total).collect();
    let mut in_flight = FuturesUnordered::new();
    let mut cursor = 0usize;

    loop {
        while in_flight.len() < limit.get() {
            let Some(task) = queue.next() else {
                break;
            };
            let index = cursor;
            cursor += 1;
            tracing::trace!(index, active = in_flight.len() + 1, "starting task");

            let handle = tokio::spawn(task());
            in_flight.push(async move { (index, handle.await) });
        }

        let Some((index, joined)) = in_flight.next().await else {
            break;
        };
        match joined {
            Ok(Ok(value)) => results[index] = Some(value),
            Ok(Err(err)) => {
                tracing::debug!(
                    index,
                    in_flight = in_flight.len(),
                    not_started = total - cursor,
                    "task failed; abandoning batch"
                );
                return Err(err);
            }
            Err(join_err) => match join_err.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(join_err) => panic!("task {index} did not complete: {join_err}"),
            },
        }
    }

    tracing::debug!(total, "batch complete");
    Ok(results.into_iter().flatten().collect())
}
