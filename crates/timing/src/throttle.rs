//! Throttle: at most one invocation per fixed window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{ThrottleConfig, TimingError};

type Callback<A> = Box<dyn FnMut(A) + Send>;

/// Rate-limited wrapper around a function.
///
/// A window opens on the first call after the previous one has closed. With
/// `leading` the opening call runs immediately; with `trailing` the latest
/// call seen inside the window runs once when it closes, which also opens the
/// next window. With both disabled the function never runs: that is a caller
/// error and is logged, not corrected.
///
/// There is no cancellation: a scheduled trailing call always runs.
pub struct Throttler<A> {
    shared: Arc<Shared<A>>,
}

struct Shared<A> {
    config: ThrottleConfig,
    runtime: Handle,
    state: Mutex<State<A>>,
    callback: Mutex<Callback<A>>,
}

struct State<A> {
    pending: Option<A>,
    window_start: Option<Instant>,
    timer: Option<(u64, JoinHandle<()>)>,
    next_epoch: u64,
}

impl<A> Clone for Throttler<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A> Throttler<A>
where
    A: Send + 'static,
{
    /// Wrap `f`. Must be called from within a tokio runtime.
    pub fn new<F>(f: F, config: ThrottleConfig) -> Result<Self, TimingError>
    where
        F: FnMut(A) + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| TimingError::NoRuntime)?;
        if let Err(err) = config.validate() {
            tracing::warn!(%err, "throttler will never invoke its function");
        }

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                runtime,
                state: Mutex::new(State {
                    pending: None,
                    window_start: None,
                    timer: None,
                    next_epoch: 0,
                }),
                callback: Mutex::new(Box::new(f)),
            }),
        })
    }

    pub fn call(&self, args: A) {
        let shared = &self.shared;
        let config = shared.config;
        let now = Instant::now();
        let mut state = shared.lock_state();

        let window_open = state.timer.is_none()
            && state
                .window_start
                .is_none_or(|start| now.saturating_duration_since(start) >= config.wait);

        if window_open {
            state.window_start = Some(now);
            if config.leading {
                drop(state);
                shared.invoke(args, "leading");
            } else if config.trailing {
                state.pending = Some(args);
                shared.arm(&mut state, config.wait);
            }
            return;
        }

        if config.trailing {
            state.pending = Some(args);
            if state.timer.is_none() {
                let elapsed = state
                    .window_start
                    .map(|start| now.saturating_duration_since(start))
                    .unwrap_or_default();
                shared.arm(&mut state, config.wait.saturating_sub(elapsed));
            }
        }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.shared.config
    }
}

impl<A> Shared<A>
where
    A: Send + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, State<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn arm(self: &Arc<Self>, state: &mut State<A>, delay: Duration) {
        let epoch = state.next_epoch;
        state.next_epoch = state.next_epoch.wrapping_add(1);

        let shared = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            shared.on_window_end(epoch);
        });
        state.timer = Some((epoch, handle));
    }

    fn on_window_end(&self, epoch: u64) {
        let mut state = self.lock_state();
        if state.timer.as_ref().map(|(e, _)| *e) != Some(epoch) {
            return;
        }
        state.timer = None;
        if let Some(args) = state.pending.take() {
            state.window_start = Some(Instant::now());
            drop(state);
            self.invoke(args, "trailing");
        }
    }

    fn invoke(&self, args: A, edge: &'static str) {
        tracing::debug!(edge, "throttled invocation");
        let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        (callback)(args)
    }
}
