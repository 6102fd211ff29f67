//! Debounce: coalesce a burst of calls into one trailing (and optionally
//! leading) invocation after a quiet period.
//!
//! The timer runs as a tokio task. Every armed timer carries an epoch; when
//! the state is reset or a new timer replaces it, the old task observes a
//! stale epoch on wake-up and exits without touching anything.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{DebounceConfig, TimingError};

type Callback<A, R> = Box<dyn FnMut(A) -> R + Send>;

/// Debounced wrapper around a function.
///
/// Cloning the handle shares the same burst state. Calling the debouncer
/// from inside its own wrapped function is not supported.
///
/// Without [`max_wait`](DebounceConfig::max_wait), a caller that never stops
/// calling postpones the trailing invocation indefinitely. That is the
/// intended trade-off of a pure debounce; set `max_wait` to bound it.
pub struct Debouncer<A, R> {
    shared: Arc<Shared<A, R>>,
}

struct Shared<A, R> {
    config: DebounceConfig,
    max_wait: Option<Duration>,
    runtime: Handle,
    state: Mutex<State<A>>,
    callback: Mutex<Callback<A, R>>,
}

struct State<A> {
    pending: Option<A>,
    last_call: Option<Instant>,
    last_invoke: Option<Instant>,
    timer: Option<Timer>,
    next_epoch: u64,
}

struct Timer {
    epoch: u64,
    handle: JoinHandle<()>,
}

enum TimerStep {
    Reschedule(Duration),
    Done,
}

impl<A, R> Clone for Debouncer<A, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A, R> Debouncer<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    /// Wrap `f`. Must be called from within a tokio runtime.
    pub fn new<F>(f: F, config: DebounceConfig) -> Result<Self, TimingError>
    where
        F: FnMut(A) -> R + Send + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| TimingError::NoRuntime)?;
        if let Err(err) = config.validate() {
            tracing::warn!(%err, "debouncer will never invoke its function");
        }

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                max_wait: config.effective_max_wait(),
                runtime,
                state: Mutex::new(State {
                    pending: None,
                    last_call: None,
                    last_invoke: None,
                    timer: None,
                    next_epoch: 0,
                }),
                callback: Mutex::new(Box::new(f)),
            }),
        })
    }

    /// Record a call with `args`.
    ///
    /// Runs the wrapped function synchronously when this call opens a burst
    /// and `leading` is set, or when `max_wait` has been exceeded.
    pub fn call(&self, args: A) {
        let shared = &self.shared;
        let now = Instant::now();
        let mut state = shared.lock_state();

        let is_invoking = shared.should_invoke(&state, now);
        state.pending = Some(args);
        state.last_call = Some(now);

        if is_invoking {
            if state.timer.is_none() {
                // Leading edge: start a burst.
                state.last_invoke = Some(now);
                shared.arm(&mut state, shared.config.wait);
                if shared.config.leading {
                    if let Some(args) = state.pending.take() {
                        drop(state);
                        shared.invoke(args, "leading");
                    }
                }
                return;
            }
            if shared.max_wait.is_some() && (shared.config.leading || shared.config.trailing) {
                // A continuous stream hit max_wait.
                shared.arm(&mut state, shared.config.wait);
                if let Some(args) = state.pending.take() {
                    state.last_invoke = Some(now);
                    drop(state);
                    shared.invoke(args, "max_wait");
                }
                return;
            }
        }

        if state.timer.is_none() {
            shared.arm(&mut state, shared.config.wait);
        }
    }

    /// Drop any pending invocation and reset the burst.
    pub fn cancel(&self) {
        let mut state = self.shared.lock_state();
        if let Some(timer) = state.timer.take() {
            timer.handle.abort();
        }
        state.pending = None;
        state.last_call = None;
        state.last_invoke = None;
        tracing::trace!("debouncer cancelled");
    }

    /// Run a pending trailing invocation now.
    ///
    /// Returns `None` when no timer was armed or the burst has nothing left to
    /// deliver (e.g. `trailing` is off).
    pub fn flush(&self) -> Option<R> {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        let timer = state.timer.take()?;
        timer.handle.abort();

        let args = state.pending.take().filter(|_| shared.config.trailing)?;
        state.last_invoke = Some(Instant::now());
        drop(state);
        Some(shared.invoke(args, "flush"))
    }

    /// Whether a trailing timer is currently armed.
    pub fn is_pending(&self) -> bool {
        self.shared.lock_state().timer.is_some()
    }

    pub fn config(&self) -> &DebounceConfig {
        &self.shared.config
    }
}

impl<A, R> Shared<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, State<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn should_invoke(&self, state: &State<A>, now: Instant) -> bool {
        let Some(last_call) = state.last_call else {
            return true;
        };
        if now.saturating_duration_since(last_call) >= self.config.wait {
            return true;
        }
        match (self.max_wait, state.last_invoke) {
            (Some(_), None) => true,
            (Some(max), Some(last_invoke)) => now.saturating_duration_since(last_invoke) >= max,
            (None, _) => false,
        }
    }

    fn remaining_wait(&self, state: &State<A>, now: Instant) -> Duration {
        let since_call = state
            .last_call
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();
        let waiting = self.config.wait.saturating_sub(since_call);

        match (self.max_wait, state.last_invoke) {
            (Some(max), Some(last_invoke)) => {
                waiting.min(max.saturating_sub(now.saturating_duration_since(last_invoke)))
            }
            _ => waiting,
        }
    }

    /// Replace the armed timer (if any) with a new one firing after `delay`.
    fn arm(self: &Arc<Self>, state: &mut State<A>, delay: Duration) {
        if let Some(old) = state.timer.take() {
            old.handle.abort();
        }
        let epoch = state.next_epoch;
        state.next_epoch = state.next_epoch.wrapping_add(1);

        let shared = Arc::clone(self);
        let handle = self.runtime.spawn(async move {
            let mut delay = delay;
            loop {
                tokio::time::sleep(delay).await;
                match shared.on_timer(epoch) {
                    TimerStep::Reschedule(next) => {
                        tracing::trace!(?next, "debounce timer rescheduled");
                        delay = next;
                    }
                    TimerStep::Done => return,
                }
            }
        });
        state.timer = Some(Timer { epoch, handle });
    }

    fn on_timer(&self, epoch: u64) -> TimerStep {
        let now = Instant::now();
        let mut state = self.lock_state();
        if state.timer.as_ref().map(|t| t.epoch) != Some(epoch) {
            return TimerStep::Done;
        }
        if !self.should_invoke(&state, now) {
            return TimerStep::Reschedule(self.remaining_wait(&state, now));
        }

        // Trailing edge. Dropping our own handle only detaches this task.
        state.timer = None;
        let args = state.pending.take().filter(|_| self.config.trailing);
        if let Some(args) = args {
            state.last_invoke = Some(now);
            drop(state);
            let _ = self.invoke(args, "trailing");
        }
        TimerStep::Done
    }

    fn invoke(&self, args: A, edge: &'static str) -> R {
        tracing::debug!(edge, "debounced invocation");
        let mut callback = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        (callback)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    type Log = Arc<Mutex<Vec<(u32, Duration)>>>;

    fn recorder(start: Instant) -> (Log, impl FnMut(u32) -> u32 + Send + 'static) {
        let log: Log = Arc::default();
        let sink = Arc::clone(&log);
        let f = move |v: u32| {
            sink.lock().unwrap().push((v, start.elapsed()));
            v * 10
        };
        (log, f)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn requires_runtime() {
        let result = Debouncer::new(|_: ()| (), DebounceConfig::default());
        assert!(matches!(result, Err(TimingError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn trailing_uses_latest_args_after_quiet_period() {
        let start = Instant::now();
        let (log, f) = recorder(start);
        let d = Debouncer::new(f, DebounceConfig::new(ms(50))).unwrap();

        d.call(1);
        sleep(ms(10)).await;
        d.call(2);
        sleep(ms(10)).await;
        d.call(3);

        sleep(ms(49)).await;
        assert!(log.lock().unwrap().is_empty());

        sleep(ms(5)).await;
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].0, 3);
        assert!(log[0].1 >= ms(70) && log[0].1 <= ms(71), "{:?}", log[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn max_wait_bounds_a_continuous_stream() {
        let start = Instant::now();
        let (log, f) = recorder(start);
        let d = Debouncer::new(f, DebounceConfig::new(ms(50)).with_max_wait(ms(100))).unwrap();

        for i in 0..15 {
            d.call(i);
            sleep(ms(10)).await;
        }

        let log = log.lock().unwrap();
        assert!(!log.is_empty());
        assert!(log[0].1 <= ms(101), "first invocation at {:?}", log[0].1);
    }

    #[tokio::test(start_paused = true)]
    async fn leading_only_drops_rest_of_burst() {
        let start = Instant::now();
        let (log, f) = recorder(start);
        let cfg = DebounceConfig::new(ms(50))
            .with_leading(true)
            .with_trailing(false);
        let d = Debouncer::new(f, cfg).unwrap();

        d.call(1);
        d.call(2);
        sleep(ms(10)).await;
        d.call(3);
        sleep(ms(200)).await;

        let values: Vec<u32> = log.lock().unwrap().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![1]);

        // A new burst after the quiet period leads again.
        d.call(4);
        let values: Vec<u32> = log.lock().unwrap().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![1, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn leading_and_trailing_single_call_invokes_once() {
        let (log, f) = recorder(Instant::now());
        let cfg = DebounceConfig::new(ms(20)).with_leading(true);
        let d = Debouncer::new(f, cfg).unwrap();

        d.call(7);
        sleep(ms(100)).await;
        assert_eq!(log.lock().unwrap().len(), 1);

        d.call(8);
        d.call(9);
        sleep(ms(100)).await;
        let values: Vec<u32> = log.lock().unwrap().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![7, 8, 9]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending_call() {
        let (log, f) = recorder(Instant::now());
        let d = Debouncer::new(f, DebounceConfig::new(ms(30))).unwrap();

        d.call(1);
        assert!(d.is_pending());
        d.cancel();
        assert!(!d.is_pending());
        sleep(ms(100)).await;
        assert!(log.lock().unwrap().is_empty());

        d.call(2);
        sleep(ms(100)).await;
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_pending_invocation_now() {
        let (log, f) = recorder(Instant::now());
        let d = Debouncer::new(f, DebounceConfig::new(ms(30))).unwrap();

        assert_eq!(d.flush(), None);

        d.call(4);
        d.call(5);
        assert_eq!(d.flush(), Some(50));
        assert!(!d.is_pending());

        sleep(ms(100)).await;
        let values: Vec<u32> = log.lock().unwrap().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_in_callback_does_not_wedge_state() {
        let calls = Arc::new(Mutex::new(0u32));
        let seen = Arc::clone(&calls);
        let cfg = DebounceConfig::new(ms(10)).with_leading(true);
        let d = Debouncer::new(
            move |fail: bool| {
                *seen.lock().unwrap() += 1;
                if fail {
                    panic!("boom");
                }
            },
            cfg,
        )
        .unwrap();

        let outcome = catch_unwind(AssertUnwindSafe(|| d.call(true)));
        assert!(outcome.is_err());

        sleep(ms(50)).await;
        d.call(false);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn both_edges_disabled_ignores_max_wait() {
        let (log, f) = recorder(Instant::now());
        let cfg = DebounceConfig::new(ms(50))
            .with_leading(false)
            .with_trailing(false)
            .with_max_wait(ms(100));
        let d = Debouncer::new(f, cfg).unwrap();

        for i in 0..50 {
            d.call(i);
            sleep(ms(10)).await;
        }
        sleep(ms(500)).await;
        assert!(log.lock().unwrap().is_empty());
        assert!(!d.is_pending());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn invocations_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let cfg = DebounceConfig::new(ms(1)).with_leading(true);
        let d = Debouncer::new(
            move |_: u32| {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(ms(5));
                a.fetch_sub(1, Ordering::SeqCst);
            },
            cfg,
        )
        .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let d = d.clone();
                tokio::spawn(async move {
                    for i in 0..20 {
                        d.call(i);
                        sleep(ms(2)).await;
                    }
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        sleep(ms(50)).await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn clones_share_burst_state() {
        let (log, f) = recorder(Instant::now());
        let d = Debouncer::new(f, DebounceConfig::new(ms(20))).unwrap();
        let other = d.clone();

        d.call(1);
        other.call(2);
        sleep(ms(80)).await;

        let values: Vec<u32> = log.lock().unwrap().iter().map(|(v, _)| *v).collect();
        assert_eq!(values, vec![2]);
    }
}
