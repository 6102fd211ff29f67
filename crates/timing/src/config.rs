//! Configuration and error types for the timing primitives.
//!
//! Both configs are plain serde structs so they can be embedded in a larger
//! configuration file. Durations are (de)serialized as milliseconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Options for [`Debouncer`](crate::Debouncer).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiet period after the last call before the trailing invocation fires.
    #[serde(with = "crate::serde_millis")]
    pub wait: Duration,
    /// Invoke on the first call of a burst.
    pub leading: bool,
    /// Invoke once the burst has been quiet for `wait`.
    pub trailing: bool,
    /// Upper bound on how long invocation may be postponed by a continuous
    /// stream of calls. `None` lets a stream postpone forever.
    #[serde(with = "crate::serde_millis::option")]
    pub max_wait: Option<Duration>,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(100),
            leading: false,
            trailing: true,
            max_wait: None,
        }
    }
}

impl DebounceConfig {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            ..Self::default()
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// `max_wait` as actually enforced: never shorter than `wait`.
    pub fn effective_max_wait(&self) -> Option<Duration> {
        self.max_wait.map(|max| max.max(self.wait))
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), TimingError> {
        if !self.leading && !self.trailing {
            return Err(TimingError::InvalidConfig(
                "debounce needs at least one of leading/trailing".into(),
            ));
        }
        Ok(())
    }
}

/// Options for [`Throttler`](crate::Throttler).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Window length; at most one invocation happens per window.
    #[serde(with = "crate::serde_millis")]
    pub wait: Duration,
    /// Invoke immediately on the first call of a window.
    pub leading: bool,
    /// Invoke once at window end with the latest arguments seen inside it.
    pub trailing: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            wait: Duration::from_millis(100),
            leading: true,
            trailing: true,
        }
    }
}

impl ThrottleConfig {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            ..Self::default()
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_leading(mut self, leading: bool) -> Self {
        self.leading = leading;
        self
    }

    pub fn with_trailing(mut self, trailing: bool) -> Self {
        self.trailing = trailing;
        self
    }

    /// Validate configuration parameters.
    ///
    /// A throttler with both edges disabled never invokes its function. The
    /// constructor accepts it anyway; this check is for config loaders.
    pub fn validate(&self) -> Result<(), TimingError> {
        if !self.leading && !self.trailing {
            return Err(TimingError::InvalidConfig(
                "throttle needs at least one of leading/trailing".into(),
            ));
        }
        Ok(())
    }
}

/// Errors returned when constructing timing primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimingError {
    /// Timers are driven by tokio; construction must happen inside a runtime.
    #[error("no tokio runtime available to drive timers")]
    NoRuntime,
    #[error("invalid timing config: {0}")]
    InvalidConfig(String),
}
