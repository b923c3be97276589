//! Dispatcher configuration parameters
//!
//! All tunable parameters for one dispatcher instance.  Values can be
//! loaded from JSON (e.g. a platform settings file) and are validated before
//! a dispatcher accepts them.

use serde::{Deserialize, Serialize};

use crate::dispatch::request::RequestKind;
use crate::error::ConfigError;

/// Default delivery thread name.
pub const DEFAULT_DELIVERY_THREAD: &str = "bledispatch-delivery";

/// Capacity of [`DispatcherConfig::delivery_thread_name`].
pub const THREAD_NAME_CAPACITY: usize = 32;

const _: () = assert!(DEFAULT_DELIVERY_THREAD.len() <= THREAD_NAME_CAPACITY);

/// Default delivery stack.  Caller callbacks and panic unwinding run on it.
pub const DEFAULT_DELIVERY_STACK_KB: usize = 256;

/// Smallest delivery stack that still unwinds a panicking callback.
pub const MIN_DELIVERY_STACK_KB: usize = 64;

/// Extra attempts each request kind may make after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudgets {
    pub connect: u8,
    /// Must stay 0: a failed disconnect is reported, never repeated.
    pub disconnect: u8,
    pub read: u8,
    pub write: u8,
    pub subscribe: u8,
    pub unsubscribe: u8,
    pub read_rssi: u8,
}

impl RetryBudgets {
    /// Budget for a given kind.
    pub const fn for_kind(&self, kind: RequestKind) -> u8 {
        match kind {
            RequestKind::Connect => self.connect,
            RequestKind::Disconnect => self.disconnect,
            RequestKind::Read => self.read,
            RequestKind::Write => self.write,
            RequestKind::Subscribe => self.subscribe,
            RequestKind::Unsubscribe => self.unsubscribe,
            RequestKind::ReadRssi => self.read_rssi,
        }
    }

    /// All budgets zero: every failure is terminal.
    pub const fn none() -> Self {
        Self {
            connect: 0,
            disconnect: 0,
            read: 0,
            write: 0,
            subscribe: 0,
            unsubscribe: 0,
            read_rssi: 0,
        }
    }

    /// The same budget for every retryable kind.
    pub const fn uniform(retries: u8) -> Self {
        Self {
            connect: retries,
            disconnect: 0,
            read: retries,
            write: retries,
            subscribe: retries,
            unsubscribe: retries,
            read_rssi: retries,
        }
    }
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self::uniform(1)
    }
}

/// Core dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum pending requests (queued plus in flight).
    pub max_backlog: usize,
    /// Per-kind retry budgets.
    pub retry: RetryBudgets,
    /// Name of the callback delivery thread.
    pub delivery_thread_name: heapless::String<THREAD_NAME_CAPACITY>,
    /// Stack size of the delivery thread in KiB.
    pub delivery_stack_kb: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_backlog: 100,
            retry: RetryBudgets::default(),
            // Fits, see the assertion on THREAD_NAME_CAPACITY.
            delivery_thread_name: heapless::String::try_from(DEFAULT_DELIVERY_THREAD)
                .unwrap_or_default(),
            delivery_stack_kb: DEFAULT_DELIVERY_STACK_KB,
        }
    }
}

impl DispatcherConfig {
    /// Reject values the dispatcher cannot run with.
    ///
    /// Invalid ranges are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_backlog == 0 {
            return Err(ConfigError::ValidationFailed("max_backlog must be >= 1"));
        }
        if self.retry.disconnect != 0 {
            return Err(ConfigError::ValidationFailed(
                "retry.disconnect must be 0 (disconnect is not retryable)",
            ));
        }
        if self.delivery_thread_name.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "delivery_thread_name must not be empty",
            ));
        }
        if self.delivery_stack_kb < MIN_DELIVERY_STACK_KB {
            return Err(ConfigError::ValidationFailed("delivery_stack_kb must be >= 64"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.  Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Malformed)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder-style override of the backlog limit.
    pub fn with_max_backlog(mut self, max_backlog: usize) -> Self {
        self.max_backlog = max_backlog;
        self
    }

    /// Builder-style override of the retry budgets.
    pub fn with_retry(mut self, retry: RetryBudgets) -> Self {
        self.retry = retry;
        self
    }
}
