//! Dispatcher state machine: pure logic with no I/O and no locks.
//!
//! [`DispatchCore`] owns the backlog queue and the single current slot.  It
//! decides what runs next, applies admission control and the retry policy,
//! and routes terminal outcomes to a [`CompletionSink`].
//!
//! ```text
//!            enqueue ──▶ ┌──────────┐  schedule_next  ┌─────────┐
//!                        │  queue   │ ───────────────▶│ current │──▶ Operation
//!  enqueue_with_priority │ (deque)  │                 │  slot   │    (to executor)
//!            ──────────▶ └──────────┘ ◀── retry ───── └─────────┘
//!                                                          │ on_outcome
//!                                                          ▼
//!                                                   CompletionSink
//! ```
//!
//! Every mutating method returns the [`Operation`] to hand to the executor,
//! if one was started.  The caller is responsible for actually calling
//! [`LinkExecutor::execute`](super::ports::LinkExecutor::execute); keeping
//! that call out of the core lets the threaded shell run it outside its lock.
//! At most one operation is ever returned between two outcomes.

use log::{debug, info, warn};

use crate::config::{DispatcherConfig, RetryBudgets};
use crate::diagnostics::DispatchStats;
use crate::error::Code;
use crate::peripheral::PeripheralAddr;

use super::events::DispatchEvent;
use super::ports::{CompletionSink, EventSink, TransportPort};
use super::queue::RequestQueue;
use super::request::{
    Callback, Command, Completion, LinkOutcome, Operation, Request, RequestId, RequestKind,
    ResponseValue, Ticket,
};

/// The dispatcher state machine for one peripheral.
#[derive(Debug)]
pub struct DispatchCore {
    addr: PeripheralAddr,
    max_backlog: usize,
    retry: RetryBudgets,
    queue: RequestQueue,
    /// The operation currently submitted to the executor.
    current: Option<Request>,
    next_id: u64,
    stats: DispatchStats,
    /// Set by [`cancel_all`](Self::cancel_all); refuses further work.
    closed: bool,
}

impl DispatchCore {
    /// Build a core from an already validated configuration.
    pub fn new(addr: PeripheralAddr, config: &DispatcherConfig) -> Self {
        Self {
            addr,
            max_backlog: config.max_backlog,
            retry: config.retry,
            queue: RequestQueue::new(config.max_backlog),
            current: None,
            next_id: 1,
            stats: DispatchStats::default(),
            closed: false,
        }
    }

    // ── Request construction ──────────────────────────────────

    /// Wrap a command in a request carrying the configured retry budget.
    pub fn new_request(&mut self, command: Command, callback: Option<Callback>) -> Request {
        let id = self.allocate_id();
        let retries = self.retry.for_kind(command.kind());
        Request::new(id, command, retries, callback)
    }

    /// Fail a request that could not even be built (malformed arguments).
    pub fn reject(
        &mut self,
        kind: RequestKind,
        code: Code,
        callback: Option<Callback>,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) -> RequestId {
        let id = self.allocate_id();
        self.stats.submitted += 1;
        self.stats.record_terminal(code);
        warn!("Dispatcher[{}]: {} {} rejected: {}", self.addr, kind, id, code);
        events.emit(&DispatchEvent::Rejected { id, kind, code });
        out.push(Completion::rejected(id, kind, code, callback));
        id
    }

    fn allocate_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    // ── Admission ─────────────────────────────────────────────

    /// Admit a new request at the back of the queue, or fail it with
    /// [`Code::Overflow`] when the backlog is full.
    pub fn enqueue(
        &mut self,
        request: Request,
        transport: &dyn TransportPort,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) -> Option<Operation> {
        self.stats.submitted += 1;

        if self.closed {
            self.admission_failure(request, Code::Canceled, out, events);
            return None;
        }

        if self.backlog() >= self.max_backlog {
            warn!(
                "Dispatcher[{}]: backlog full ({}), {} {} overflowed",
                self.addr,
                self.max_backlog,
                request.kind(),
                request.id()
            );
            self.admission_failure(request, Code::Overflow, out, events);
            return None;
        }

        let (id, kind) = (request.id(), request.kind());
        if let Err(request) = self.queue.push_back(request) {
            // Unreachable while queue capacity equals max_backlog.
            self.admission_failure(request, Code::Overflow, out, events);
            return None;
        }
        debug!("Dispatcher[{}]: queued {} {}", self.addr, kind, id);
        events.emit(&DispatchEvent::Queued {
            id,
            kind,
            backlog: self.backlog(),
        });

        self.schedule_next(transport, out, events)
    }

    /// Put a retried request back at the front of the queue.
    fn enqueue_with_priority(
        &mut self,
        request: Request,
        transport: &dyn TransportPort,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) -> Option<Operation> {
        self.queue.push_front(request);
        self.schedule_next(transport, out, events)
    }

    // ── Scheduling ────────────────────────────────────────────

    /// Start the next queued request if the link is idle.
    ///
    /// 1. Current slot occupied → nothing to do.
    /// 2. Queue empty → idle.
    /// 3. Pop the front request into the current slot.
    /// 4. Radio unsupported or disabled → fail it outright (no retry, no
    ///    executor call) and go back to 1.
    /// 5. Otherwise return its [`Operation`] for the executor.
    pub fn schedule_next(
        &mut self,
        transport: &dyn TransportPort,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) -> Option<Operation> {
        loop {
            if self.current.is_some() {
                return None;
            }
            let request = self.queue.pop_front()?;

            let unavailable = if !transport.is_supported() {
                Some(Code::TransportNotSupported)
            } else if !transport.is_enabled() {
                Some(Code::TransportDisabled)
            } else {
                None
            };

            if let Some(code) = unavailable {
                self.admission_failure(request, code, out, events);
                continue;
            }

            let operation = request.operation();
            debug!(
                "Dispatcher[{}]: dispatching {} {} (retries left {})",
                self.addr,
                request.kind(),
                operation.ticket,
                request.retries_remaining()
            );
            events.emit(&DispatchEvent::Dispatched {
                ticket: operation.ticket,
                kind: request.kind(),
            });
            self.stats.dispatched += 1;
            self.current = Some(request);
            return Some(operation);
        }
    }

    // ── Outcome handling ──────────────────────────────────────

    /// Apply the executor's report for `ticket`.
    ///
    /// Reports that do not match the current attempt are logged and
    /// dropped.  A report that finds the current slot empty still triggers
    /// scheduling, so queued work can never be left without a driver.
    pub fn on_outcome(
        &mut self,
        ticket: Ticket,
        outcome: LinkOutcome,
        transport: &dyn TransportPort,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) -> Option<Operation> {
        let current_ticket = self.current.as_ref().map(Request::ticket);

        if current_ticket != Some(ticket) {
            warn!(
                "Dispatcher[{}]: stray outcome for {} (current {:?}), ignored",
                self.addr, ticket, current_ticket
            );
            self.stats.stale_outcomes += 1;
            events.emit(&DispatchEvent::StaleOutcome {
                ticket,
                current: current_ticket,
            });
            if current_ticket.is_none() {
                return self.schedule_next(transport, out, events);
            }
            return None;
        }

        let mut request = self.current.take()?;

        match outcome {
            LinkOutcome::Success(value) => {
                self.complete(request, Code::Success, value, out, events);
            }
            LinkOutcome::Failure(code) if request.can_retry() => {
                let code = failure_code(code);
                request.retry();
                self.stats.retried += 1;
                debug!(
                    "Dispatcher[{}]: {} {} failed ({}), retrying as attempt {}",
                    self.addr,
                    request.kind(),
                    ticket,
                    code,
                    request.attempt()
                );
                events.emit(&DispatchEvent::Retrying {
                    ticket,
                    kind: request.kind(),
                    code,
                    retries_left: request.retries_remaining(),
                });
                return self.enqueue_with_priority(request, transport, out, events);
            }
            LinkOutcome::Failure(code) => {
                self.complete(request, failure_code(code), None, out, events);
            }
        }

        self.schedule_next(transport, out, events)
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Fail every pending request with [`Code::Canceled`] and refuse any
    /// further work.  The in-flight request, if any, completes first.
    /// Returns how many requests were canceled.
    pub fn cancel_all(
        &mut self,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) -> usize {
        self.closed = true;
        let mut canceled = 0;

        if let Some(request) = self.current.take() {
            self.complete(request, Code::Canceled, None, out, events);
            canceled += 1;
        }
        let pending: Vec<Request> = self.queue.drain().collect();
        for request in pending {
            self.complete(request, Code::Canceled, None, out, events);
            canceled += 1;
        }

        info!(
            "Dispatcher[{}]: shut down, {} pending request(s) canceled",
            self.addr, canceled
        );
        events.emit(&DispatchEvent::ShutDown { canceled });
        canceled
    }

    // ── Queries ───────────────────────────────────────────────

    pub const fn addr(&self) -> PeripheralAddr {
        self.addr
    }

    /// Pending requests: queued plus in flight.
    pub fn backlog(&self) -> usize {
        self.queue.len() + usize::from(self.current.is_some())
    }

    /// Requests waiting behind the current one.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Ticket of the attempt the executor is working on.
    pub fn current_ticket(&self) -> Option<Ticket> {
        self.current.as_ref().map(Request::ticket)
    }

    /// Queued request ids in dispatch order.
    pub fn queued_ids(&self) -> Vec<RequestId> {
        self.queue.ids().collect()
    }

    /// Nothing queued and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    pub const fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub const fn max_backlog(&self) -> usize {
        self.max_backlog
    }

    // ── Internal ──────────────────────────────────────────────

    /// Terminal outcome for a request that went through the link (or was
    /// canceled while pending).
    fn complete(
        &mut self,
        request: Request,
        code: Code,
        value: Option<ResponseValue>,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) {
        let (id, kind, attempts) = (request.id(), request.kind(), request.attempt());
        debug!(
            "Dispatcher[{}]: {} {} completed: {}",
            self.addr, kind, id, code
        );
        self.stats.record_terminal(code);
        events.emit(&DispatchEvent::Completed {
            id,
            kind,
            code,
            attempts,
        });
        out.push(request.finish(code, value));
    }

    /// Terminal outcome decided by admission control: never retried, never
    /// seen by the executor.
    fn admission_failure(
        &mut self,
        request: Request,
        code: Code,
        out: &mut impl CompletionSink,
        events: &mut impl EventSink,
    ) {
        let (id, kind) = (request.id(), request.kind());
        debug!(
            "Dispatcher[{}]: {} {} refused: {}",
            self.addr, kind, id, code
        );
        self.stats.record_terminal(code);
        events.emit(&DispatchEvent::Rejected { id, kind, code });
        out.push(request.finish(code, None));
    }

    /// Test hook: place a request in the queue without scheduling it.
    #[cfg(test)]
    fn stage(&mut self, request: Request) {
        self.stats.submitted += 1;
        let _ = self.queue.push_back(request);
    }
}

/// A failure must never surface as `Success`.
const fn failure_code(code: Code) -> Code {
    match code {
        Code::Success => Code::Failed,
        other => other,
    }
}
