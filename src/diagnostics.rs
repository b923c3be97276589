//! Runtime diagnostics.
//!
//! Counters maintained by the dispatcher core as requests move through it.
//! A snapshot is cheap to take and serializes to JSON for whatever status
//! surface the embedder exposes.

use serde::{Deserialize, Serialize};

use crate::error::Code;

/// Cumulative request counters for one dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Requests handed to the dispatcher, admitted or not.
    pub submitted: u64,
    /// Operations handed to the executor (every attempt counts).
    pub dispatched: u64,
    /// Failed attempts that were put back at the front of the queue.
    pub retried: u64,
    /// Requests completed with `Success`.
    pub succeeded: u64,
    /// Requests completed with an executor-reported failure.
    pub failed: u64,
    /// Requests refused because the backlog was full.
    pub overflowed: u64,
    /// Requests refused because the radio was unsupported or disabled.
    pub unavailable: u64,
    /// Requests refused as malformed.
    pub illegal: u64,
    /// Requests still pending at shutdown.
    pub canceled: u64,
    /// Outcome reports that matched no in-flight attempt.
    pub stale_outcomes: u64,
    /// Callbacks run by the delivery thread.
    pub callbacks_run: u64,
    /// Callbacks that panicked (caught and logged).
    pub callback_panics: u64,
}

impl DispatchStats {
    /// Count a terminal outcome under the matching bucket.
    pub(crate) fn record_terminal(&mut self, code: Code) {
        match code {
            Code::Success => self.succeeded += 1,
            Code::Overflow => self.overflowed += 1,
            Code::TransportNotSupported | Code::TransportDisabled => self.unavailable += 1,
            Code::IllegalArgument => self.illegal += 1,
            Code::Canceled => self.canceled += 1,
            Code::Failed | Code::ServiceUnready | Code::TimedOut => self.failed += 1,
        }
    }

    /// Requests that reached a terminal outcome.
    pub fn completed(&self) -> u64 {
        self.succeeded
            + self.failed
            + self.overflowed
            + self.unavailable
            + self.illegal
            + self.canceled
    }

    /// Requests submitted but not yet completed.
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.completed())
    }
}
