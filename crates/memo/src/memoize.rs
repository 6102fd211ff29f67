//! Memoized function wrappers over the argument trie.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::key::{KeySegment, KeyTuple, ToKeySegment};
use crate::trie::KeyTrie;

type Func<A, V, E> = Box<dyn Fn(A) -> Result<V, E> + Send + Sync>;
type Resolver<A> = Box<dyn Fn(&A) -> Vec<KeySegment> + Send + Sync>;

/// A function whose successful results are cached per argument key.
///
/// The cache lock is released while the wrapped function runs, so a memoized
/// function may call itself (through a `static` or an `Arc`). Two threads
/// missing on the same key at the same moment may both compute it; the
/// at-most-once guarantee holds for callers on a single thread.
pub struct Memoized<A, V, E = Infallible> {
    func: Func<A, V, E>,
    resolver: Resolver<A>,
    cache: Mutex<KeyTrie<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

/// Counters for a [`Memoized`] function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl MemoStats {
    /// Share of calls answered from the cache (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Memoize `f`, keyed by its full argument tuple.
///
/// ```
/// let square = memo::memoize(|(a, b): (u64, u64)| a * b);
/// assert_eq!(square.get((3, 4)), 12);
/// assert_eq!(square.stats().misses, 1);
/// ```
pub fn memoize<A, V, F>(f: F) -> Memoized<A, V>
where
    A: KeyTuple + 'static,
    V: 'static,
    F: Fn(A) -> V + Send + Sync + 'static,
{
    try_memoize(move |args| Ok(f(args)))
}

/// Memoize `f`, keyed by a single segment computed from the arguments.
///
/// Use this to normalize arguments that would otherwise be distinct keys,
/// e.g. two `Arc`s holding equal data.
pub fn memoize_with<A, V, K, F, R>(f: F, resolver: R) -> Memoized<A, V>
where
    A: 'static,
    V: 'static,
    F: Fn(A) -> V + Send + Sync + 'static,
    R: Fn(&A) -> K + Send + Sync + 'static,
    K: ToKeySegment + 'static,
{
    try_memoize_with(move |args| Ok(f(args)), resolver)
}

/// Memoize a fallible `f`. Only `Ok` results are cached; an `Err` is returned
/// as-is and the next call with the same key runs `f` again.
pub fn try_memoize<A, V, E, F>(f: F) -> Memoized<A, V, E>
where
    A: KeyTuple + 'static,
    V: 'static,
    E: 'static,
    F: Fn(A) -> Result<V, E> + Send + Sync + 'static,
{
    Memoized::from_parts(Box::new(f), Box::new(|args: &A| args.key_path()))
}

/// Fallible variant of [`memoize_with`].
pub fn try_memoize_with<A, V, E, K, F, R>(f: F, resolver: R) -> Memoized<A, V, E>
where
    A: 'static,
    V: 'static,
    E: 'static,
    F: Fn(A) -> Result<V, E> + Send + Sync + 'static,
    R: Fn(&A) -> K + Send + Sync + 'static,
    K: ToKeySegment + 'static,
{
    Memoized::from_parts(
        Box::new(f),
        Box::new(move |args: &A| vec![resolver(args).to_segment()]),
    )
}

impl<A, V, E> Memoized<A, V, E> {
    fn from_parts(func: Func<A, V, E>, resolver: Resolver<A>) -> Self {
        Self {
            func,
            resolver,
            cache: Mutex::new(KeyTrie::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, KeyTrie<V>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value for `args`, or run the function and cache an
    /// `Ok` result.
    pub fn call(&self, args: A) -> Result<V, E>
    where
        V: Clone,
    {
        let path = (self.resolver)(&args);
        if let Some(value) = self.lock().get(&path) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(depth = path.len(), "memo miss");
        let value = (self.func)(args)?;
        self.lock().insert(path, value.clone());
        Ok(value)
    }

    /// Evict every cached entry. Counters are kept.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Evict the entry for `args`, returning it if present.
    pub fn forget(&self, args: &A) -> Option<V> {
        let path = (self.resolver)(args);
        self.lock().remove(&path)
    }

    pub fn contains(&self, args: &A) -> bool {
        let path = (self.resolver)(args);
        self.lock().get(&path).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl<A, V> Memoized<A, V, Infallible> {
    /// [`call`](Self::call) for infallible functions.
    pub fn get(&self, args: A) -> V
    where
        V: Clone,
    {
        match self.call(args) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}
