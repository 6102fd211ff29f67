//! # runctl concurrency limiting
//!
//! - [`run_limited`]: run a batch of async tasks with a bounded number in
//!   flight, results in input order, fail-fast on the first error.
//! - [`Semaphore`]: FIFO counting semaphore with RAII permits.
//! - [`SemaphoreManager`]: one semaphore per key, created on demand.
//! - [`retry_async`]: exponential backoff for individual tasks.
//!
//! "Concurrency" here is logical: tasks are tokio tasks and may or may not run
//! on several threads depending on the runtime flavor. The invariants
//! (in-flight count never above the limit, ordered results) hold either way.

mod error;
mod registry;
mod retry;
mod runner;
mod semaphore;

pub use error::LimiterError;
pub use registry::{SemaphoreManager, SemaphoreStats};
pub use retry::{retry_async, retry_async_if, RetryConfig, RetryOutcome};
pub use runner::run_limited;
pub use semaphore::{OwnedPermit, Permit, Semaphore};
