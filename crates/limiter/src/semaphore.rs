//! Counting semaphore with RAII permits.
//!
//! Waiters are served first-in first-out. A permit is released when it is
//! dropped, so an early return or a panic inside the guarded scope cannot
//! leak it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, SemaphorePermit, TryAcquireError};

use crate::error::LimiterError;

/// Counting semaphore. Cloning shares the same permit pool.
#[derive(Debug, Clone)]
pub struct Semaphore {
    inner: Arc<tokio::sync::Semaphore>,
    capacity: usize,
}

/// A permit borrowed from a [`Semaphore`]; released on drop.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct Permit<'a> {
    _permit: SemaphorePermit<'a>,
}

/// A permit that keeps its [`Semaphore`] alive; released on drop.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct OwnedPermit {
    _permit: OwnedSemaphorePermit,
}

impl Permit<'_> {
    /// Give the permit back now and wake the oldest waiter.
    pub fn release(self) {}
}

impl OwnedPermit {
    /// Give the permit back now and wake the oldest waiter.
    pub fn release(self) {}
}

impl Semaphore {
    /// Create a semaphore with `permits` permits, capped at tokio's maximum.
    pub fn new(permits: usize) -> Self {
        let capacity = permits.min(tokio::sync::Semaphore::MAX_PERMITS);
        Self {
            inner: Arc::new(tokio::sync::Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a permit.
    pub async fn acquire(&self) -> Result<Permit<'_>, LimiterError> {
        let permit = self.inner.acquire().await.map_err(|_| LimiterError::Closed)?;
        Ok(Permit { _permit: permit })
    }

    /// Wait for a permit that can be moved into a spawned task.
    pub async fn acquire_owned(&self) -> Result<OwnedPermit, LimiterError> {
        let permit = Arc::clone(&self.inner)
            .acquire_owned()
            .await
            .map_err(|_| LimiterError::Closed)?;
        Ok(OwnedPermit { _permit: permit })
    }

    /// Take a permit only if one is free right now.
    pub fn try_acquire(&self) -> Result<Permit<'_>, LimiterError> {
        match self.inner.try_acquire() {
            Ok(permit) => Ok(Permit { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(LimiterError::NoPermits),
            Err(TryAcquireError::Closed) => Err(LimiterError::Closed),
        }
    }

    /// Run `fut` while holding a permit.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, LimiterError>
    where
        F: Future,
    {
        let _permit = self.acquire().await?;
        Ok(fut.await)
    }

    /// Close the semaphore. Pending and future acquires fail with
    /// [`LimiterError::Closed`]; permits already handed out stay valid.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn available_permits(&self) -> usize {
        self.inner.available_permits()
    }

    /// Total number of permits this semaphore was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
