//! Workspace umbrella crate for runctl.
//!
//! Re-exports the component crates so callers can depend on one crate:
//!
//! - [`timing`]: [`Debouncer`] and [`Throttler`] on the tokio timer
//! - [`limiter`]: [`run_limited`], [`Semaphore`], keyed semaphores, retry
//! - [`memo`]: [`memoize`] with a per-argument key trie
//! - [`graph`]: dynamic values and the cycle-safe [`deep_clone`]
//!
//! It also owns the combined YAML configuration ([`ControlConfig`]).

pub mod config;

pub use config::{ConfigLoadError, ControlConfig, LimiterYamlConfig};

pub use graph::{
    Function, HostHandle, Object, ObjectKind, Property, PropertyKey, Symbol, Value, deep_clone,
    deep_equal,
};
pub use limiter::{
    LimiterError, OwnedPermit, Permit, RetryConfig, RetryOutcome, Semaphore, SemaphoreManager,
    SemaphoreStats, retry_async, retry_async_if, run_limited,
};
pub use memo::{MemoStats, Memoized, memoize, memoize_with, try_memoize, try_memoize_with};
pub use timing::{DebounceConfig, Debouncer, ThrottleConfig, Throttler, TimingError};

pub use graph;
pub use limiter;
pub use memo;
pub use timing;
