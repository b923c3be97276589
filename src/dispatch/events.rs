//! Outbound dispatcher events.
//!
//! The [`DispatchCore`](super::machine::DispatchCore) emits these through
//! the [`EventSink`](super::ports::EventSink) port at every state change.
//! Adapters on the other side decide what to do with them: log to the
//! console, feed a telemetry counter, drive a test assertion.

use crate::error::Code;

use super::request::{RequestId, RequestKind, Ticket};

/// Structured events emitted by the dispatcher core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// A request passed admission and joined the back of the queue.
    Queued {
        id: RequestId,
        kind: RequestKind,
        backlog: usize,
    },

    /// A request moved into the current slot and went to the executor.
    Dispatched { ticket: Ticket, kind: RequestKind },

    /// An attempt failed and the request went back to the front.
    Retrying {
        ticket: Ticket,
        kind: RequestKind,
        code: Code,
        retries_left: u8,
    },

    /// A request reached its terminal outcome through the link.
    Completed {
        id: RequestId,
        kind: RequestKind,
        code: Code,
        attempts: u16,
    },

    /// A request was failed by admission control without reaching the link.
    Rejected {
        id: RequestId,
        kind: RequestKind,
        code: Code,
    },

    /// An outcome arrived that matches no in-flight attempt.
    StaleOutcome {
        ticket: Ticket,
        current: Option<Ticket>,
    },

    /// The dispatcher canceled everything and stopped.
    ShutDown { canceled: usize },
}
