//! Port traits: the boundary between the dispatcher and the outside world.
//!
//! ```text
//!   caller ──▶ Dispatcher ──▶ LinkExecutor ──(OutcomeReporter)──▶ Dispatcher
//!                  │  ▲
//!                  │  └── TransportPort (radio supported / enabled)
//!                  ├────▶ CompletionSink (delivery channel)
//!                  └────▶ EventSink (logging / telemetry)
//! ```
//!
//! Driven adapters implement these traits.  The dispatcher core consumes them
//! at call sites, so it never touches a radio stack, a thread or a logger
//! directly.

use super::events::DispatchEvent;
use super::request::{Completion, Operation};
use super::service::OutcomeReporter;

// ───────────────────────────────────────────────────────────────
// Executor binding (driven adapter: dispatcher → link)
// ───────────────────────────────────────────────────────────────

/// The component that performs one link operation at a time.
///
/// The dispatcher guarantees at most one operation is outstanding: a new
/// [`execute`](Self::execute) call only follows a reported outcome for the
/// previous one.  Implementations report back through the
/// [`OutcomeReporter`] received in [`bind`](Self::bind), from any thread,
/// and may do so synchronously from inside `execute`.
pub trait LinkExecutor: Send {
    /// Register the reporting handle.  Called once, before any `execute`.
    fn bind(&mut self, reporter: OutcomeReporter);

    /// Start running `operation`.  Must not block on link I/O.
    fn execute(&mut self, operation: Operation);
}

// ───────────────────────────────────────────────────────────────
// Transport availability (driven adapter: radio → dispatcher)
// ───────────────────────────────────────────────────────────────

/// Environment-level predicates checked before every dispatch.
pub trait TransportPort: Send + Sync {
    /// Whether the host has the radio at all.
    fn is_supported(&self) -> bool;

    /// Whether the radio is currently powered on.
    fn is_enabled(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Completion sink (driven adapter: dispatcher → delivery channel)
// ───────────────────────────────────────────────────────────────

/// Receives every terminal outcome, in order.
pub trait CompletionSink {
    fn push(&mut self, completion: Completion);
}

impl CompletionSink for Vec<Completion> {
    fn push(&mut self, completion: Completion) {
        Vec::push(self, completion);
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink (driven adapter: dispatcher → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`DispatchEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &DispatchEvent);
}

/// Sink that discards everything.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&mut self, _event: &DispatchEvent) {}
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn emit(&mut self, event: &DispatchEvent) {
        (**self).emit(event);
    }
}

impl EventSink for Vec<DispatchEvent> {
    fn emit(&mut self, event: &DispatchEvent) {
        self.push(event.clone());
    }
}
