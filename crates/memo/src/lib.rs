//! # runctl memoization
//!
//! Caches a function's results per argument key. Keys are stored in a trie
//! with one level per argument position, so `("ab", "c")` and `("a", "bc")`
//! never collide the way string-joined keys would.
//!
//! - Scalars and strings are keyed by value (floats with SameValueZero:
//!   all NaNs are one key, `-0.0` equals `0.0`).
//! - `Arc<T>` arguments are keyed by pointer identity; use
//!   [`memoize_with`] and a resolver to key them by content instead.
//! - Only successful results are cached ([`try_memoize`]).

mod key;
mod memoize;
mod trie;

pub use key::{Identity, KeySegment, KeyTuple, ToKeySegment};
pub use memoize::{memoize, memoize_with, try_memoize, try_memoize_with, MemoStats, Memoized};
