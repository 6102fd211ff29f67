//! # runctl timing primitives
//!
//! Debounce and throttle wrappers driven by the tokio timer.
//!
//! Both wrappers own an explicit state struct (pending arguments, call and
//! invocation instants, the armed timer) instead of closing over mutable
//! variables. The state lock is never held while the wrapped function runs,
//! and the wrapped function sits behind its own lock, so there is never more
//! than one invocation in flight.
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use timing::{DebounceConfig, Debouncer};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let save = Debouncer::new(
//!     |text: String| println!("saving {text}"),
//!     DebounceConfig::new(Duration::from_millis(50)),
//! )
//! .unwrap();
//!
//! save.call("h".into());
//! save.call("hello".into());
//! assert_eq!(save.flush(), Some(()));
//! # }
//! ```

pub mod config;
mod debounce;
pub mod serde_millis;
mod throttle;

pub use config::{DebounceConfig, ThrottleConfig, TimingError};
pub use debounce::Debouncer;
pub use throttle::Throttler;
