//! Named semaphores, one per key (host, tenant, provider...).

use dashmap::DashMap;

use crate::semaphore::Semaphore;

/// Snapshot of one keyed semaphore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemaphoreStats {
    pub key: String,
    pub capacity: usize,
    pub available: usize,
}

impl SemaphoreStats {
    /// Permits currently held.
    pub fn in_use(&self) -> usize {
        self.capacity.saturating_sub(self.available)
    }
}

/// Registry handing out a shared [`Semaphore`] per key, created on first use.
#[derive(Debug)]
pub struct SemaphoreManager {
    semaphores: DashMap<String, Semaphore>,
    default_permits: usize,
}

impl SemaphoreManager {
    pub fn new(default_permits: usize) -> Self {
        Self {
            semaphores: DashMap::new(),
            default_permits,
        }
    }

    /// Get or create the semaphore for `key` with the default permit count.
    pub fn get_or_create(&self, key: &str) -> Semaphore {
        self.get_or_create_with_permits(key, self.default_permits)
    }

    /// Get or create the semaphore for `key`. `permits` only applies when the
    /// semaphore does not exist yet.
    pub fn get_or_create_with_permits(&self, key: &str, permits: usize) -> Semaphore {
        if let Some(existing) = self.semaphores.get(key) {
            return existing.clone();
        }
        self.semaphores
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!(key, permits, "creating keyed semaphore");
                Semaphore::new(permits)
            })
            .clone()
    }

    pub fn get(&self, key: &str) -> Option<Semaphore> {
        self.semaphores.get(key).map(|s| s.clone())
    }

    /// Stats for every key, sorted by key.
    pub fn stats(&self) -> Vec<SemaphoreStats> {
        let mut stats: Vec<_> = self
            .semaphores
            .iter()
            .map(|entry| {
                let (key, sem) = entry.pair();
                SemaphoreStats {
                    key: key.clone(),
                    capacity: sem.capacity(),
                    available: sem.available_permits(),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    /// Forget every semaphore. Permits already handed out stay valid on the
    /// old semaphores; new callers get fresh ones.
    pub fn reset_all(&self) {
        self.semaphores.clear();
    }

    pub fn len(&self) -> usize {
        self.semaphores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.semaphores.is_empty()
    }
}

impl Default for SemaphoreManager {
    fn default() -> Self {
        Self::new(4)
    }
}
