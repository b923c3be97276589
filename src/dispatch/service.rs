//! Dispatcher service: the thread-safe shell around [`DispatchCore`].
//!
//! [`Dispatcher`] is what callers hold.  It owns the core behind one mutex,
//! the executor, the transport predicates and the delivery channel.  Every
//! public operation returns a [`RequestId`] immediately; the outcome arrives
//! later through the callback, on the delivery thread.
//!
//! ```text
//!  caller threads ──▶ ┌──────────────────────────┐ ──▶ LinkExecutor::execute
//!                     │        Dispatcher         │       (outside the lock)
//!  OutcomeReporter ──▶│  Mutex<DispatchCore> + pump│
//!                     └──────────────────────────┘ ──▶ DeliveryChannel
//! ```
//!
//! Executor calls never happen under the state lock.  The first thread that
//! produces an [`Operation`] while nobody else is pumping becomes the pump
//! and keeps handing operations over until none is left.  An executor that
//! reports from inside `execute` only queues the next operation for that
//! same pump.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info};

use crate::adapters::log_sink::LogEventSink;
use crate::config::DispatcherConfig;
use crate::delivery::{DeliveryChannel, DeliveryHandle};
use crate::diagnostics::DispatchStats;
use crate::error::Result;
use crate::peripheral::{CharacteristicRef, PeripheralAddr};

use super::machine::DispatchCore;
use super::ports::{EventSink, LinkExecutor, TransportPort};
use super::request::{
    Callback, Command, LinkOutcome, Operation, RequestId, RequestKind, Response, Ticket,
};

// ───────────────────────────────────────────────────────────────
// Shared state
// ───────────────────────────────────────────────────────────────

struct State {
    core: DispatchCore,
    events: Box<dyn EventSink + Send>,
    completions: DeliveryHandle,
    /// Operations produced but not yet handed to the executor.
    pending: VecDeque<Operation>,
    /// A thread is currently feeding the executor.
    pumping: bool,
}

struct Shared {
    state: Mutex<State>,
    executor: Mutex<Box<dyn LinkExecutor>>,
    transport: Arc<dyn TransportPort>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the core, then feed whatever operation it produced
    /// to the executor.
    fn with_core<R>(
        &self,
        f: impl FnOnce(
            &mut DispatchCore,
            &dyn TransportPort,
            &mut DeliveryHandle,
            &mut Box<dyn EventSink + Send>,
        ) -> (R, Option<Operation>),
    ) -> R {
        let mut state = self.lock_state();
        let (result, operation) = {
            let State {
                core,
                events,
                completions,
                ..
            } = &mut *state;
            f(core, self.transport.as_ref(), completions, events)
        };
        self.pump(state, operation);
        result
    }

    fn lock_executor(&self) -> MutexGuard<'_, Box<dyn LinkExecutor>> {
        self.executor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pump<'a>(&'a self, mut state: MutexGuard<'a, State>, operation: Option<Operation>) {
        state.pending.extend(operation);
        if state.pumping {
            return;
        }
        state.pumping = true;

        loop {
            let Some(operation) = state.pending.pop_front() else {
                state.pumping = false;
                return;
            };
            drop(state);

            // Lock order is executor, then state.  `close` cancels under the
            // same pair, so the check below cannot go stale before `execute`.
            let mut executor = self.lock_executor();
            if self.is_live(&operation) {
                executor.execute(operation);
            } else {
                debug!("Dispatcher: {} canceled before execute, dropped", operation.ticket);
            }
            drop(executor);
            state = self.lock_state();
        }
    }

    /// The operation still belongs to the in-flight request of an open core.
    fn is_live(&self, operation: &Operation) -> bool {
        let state = self.lock_state();
        !state.core.is_closed() && state.core.current_ticket() == Some(operation.ticket)
    }

    fn on_outcome(&self, ticket: Ticket, outcome: LinkOutcome) {
        self.with_core(|core, transport, out, events| {
            ((), core.on_outcome(ticket, outcome, transport, out, events))
        });
    }
}

// ───────────────────────────────────────────────────────────────
// OutcomeReporter
// ───────────────────────────────────────────────────────────────

/// Handle the executor uses to report the outcome of each operation.
///
/// Cheap to clone and usable from any thread.  Holds only a weak reference,
/// so reports arriving after the dispatcher is gone are dropped.
#[derive(Clone)]
pub struct OutcomeReporter {
    shared: Weak<Shared>,
}

impl OutcomeReporter {
    /// Report the outcome of the attempt identified by `ticket`.
    pub fn report(&self, ticket: Ticket, outcome: LinkOutcome) {
        match self.shared.upgrade() {
            Some(shared) => shared.on_outcome(ticket, outcome),
            None => debug!("Reporter: dispatcher gone, outcome for {} dropped", ticket),
        }
    }

    /// Whether the dispatcher behind this handle still exists.
    pub fn is_attached(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl core::fmt::Debug for OutcomeReporter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OutcomeReporter")
            .field("attached", &self.is_attached())
            .finish()
    }
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

/// Request dispatcher bound to one peripheral.
pub struct Dispatcher {
    addr: PeripheralAddr,
    shared: Arc<Shared>,
    delivery: DeliveryChannel,
}

impl Dispatcher {
    /// Build a dispatcher that logs its events through [`LogEventSink`].
    pub fn new(
        addr: PeripheralAddr,
        config: DispatcherConfig,
        executor: impl LinkExecutor + 'static,
        transport: Arc<dyn TransportPort>,
    ) -> Result<Self> {
        Self::with_event_sink(addr, config, executor, transport, LogEventSink::new())
    }

    /// Build a dispatcher with a caller-supplied event sink.
    ///
    /// Validates `config`, spawns the delivery thread and binds the executor.
    pub fn with_event_sink(
        addr: PeripheralAddr,
        config: DispatcherConfig,
        executor: impl LinkExecutor + 'static,
        transport: Arc<dyn TransportPort>,
        events: impl EventSink + Send + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let delivery =
            DeliveryChannel::spawn(config.delivery_thread_name.as_str(), config.delivery_stack_kb)?;

        let executor: Box<dyn LinkExecutor> = Box::new(executor);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                core: DispatchCore::new(addr, &config),
                events: Box::new(events),
                completions: delivery.handle(),
                pending: VecDeque::new(),
                pumping: false,
            }),
            executor: Mutex::new(executor),
            transport,
        });

        shared.lock_executor().bind(OutcomeReporter {
            shared: Arc::downgrade(&shared),
        });

        info!(
            "Dispatcher[{}]: ready (max_backlog={}, delivery='{}')",
            addr, config.max_backlog, config.delivery_thread_name
        );

        Ok(Self {
            addr,
            shared,
            delivery,
        })
    }

    // ── Operations ────────────────────────────────────────────

    /// Queue an arbitrary command.  The typed helpers below all end here.
    pub fn submit(&self, command: Command, callback: Option<Callback>) -> RequestId {
        self.shared.with_core(|core, transport, out, events| {
            let request = core.new_request(command, callback);
            let id = request.id();
            (id, core.enqueue(request, transport, out, events))
        })
    }

    pub fn connect(&self, callback: impl FnOnce(Response) + Send + 'static) -> RequestId {
        self.submit(Command::Connect, Some(Box::new(callback)))
    }

    pub fn disconnect(&self) -> RequestId {
        self.submit(Command::Disconnect, None)
    }

    pub fn read(
        &self,
        service: u128,
        characteristic: u128,
        callback: impl FnOnce(Response) + Send + 'static,
    ) -> RequestId {
        let target = CharacteristicRef::new(service, characteristic);
        self.submit(Command::Read(target), Some(Box::new(callback)))
    }

    /// Queue a write.  Payloads longer than
    /// [`MAX_ATTRIBUTE_LEN`](super::request::MAX_ATTRIBUTE_LEN) complete
    /// with `IllegalArgument` without being queued.
    pub fn write(
        &self,
        service: u128,
        characteristic: u128,
        payload: &[u8],
        callback: impl FnOnce(Response) + Send + 'static,
    ) -> RequestId {
        let target = CharacteristicRef::new(service, characteristic);
        let callback: Callback = Box::new(callback);
        match Command::write(target, payload) {
            Ok(command) => self.submit(command, Some(callback)),
            Err(code) => self.shared.with_core(|core, _, out, events| {
                let id = core.reject(RequestKind::Write, code, Some(callback), out, events);
                (id, None)
            }),
        }
    }

    pub fn subscribe(
        &self,
        service: u128,
        characteristic: u128,
        callback: impl FnOnce(Response) + Send + 'static,
    ) -> RequestId {
        let target = CharacteristicRef::new(service, characteristic);
        self.submit(Command::Subscribe(target), Some(Box::new(callback)))
    }

    pub fn unsubscribe(&self, service: u128, characteristic: u128) -> RequestId {
        let target = CharacteristicRef::new(service, characteristic);
        self.submit(Command::Unsubscribe(target), None)
    }

    pub fn read_rssi(&self, callback: impl FnOnce(Response) + Send + 'static) -> RequestId {
        self.submit(Command::ReadRssi, Some(Box::new(callback)))
    }

    // ── Queries ───────────────────────────────────────────────

    pub const fn addr(&self) -> PeripheralAddr {
        self.addr
    }

    /// Counter snapshot, including delivery-thread counters.
    pub fn stats(&self) -> DispatchStats {
        let mut stats = self.shared.lock_state().core.stats();
        stats.callbacks_run = self.delivery.delivered();
        stats.callback_panics = self.delivery.panicked();
        stats
    }

    /// Pending requests: queued plus in flight.
    pub fn backlog(&self) -> usize {
        self.shared.lock_state().core.backlog()
    }

    /// Ticket of the operation the executor is working on.
    pub fn current(&self) -> Option<Ticket> {
        self.shared.lock_state().core.current_ticket()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock_state().core.is_idle()
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Cancel everything pending, drain the delivery channel and stop its
    /// thread.  Dropping the dispatcher does the same.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        {
            // Held across the cancel so no pump can hand a canceled
            // operation to the link.
            let _executor = self.shared.lock_executor();
            let mut state = self.shared.lock_state();
            if !state.core.is_closed() {
                let State {
                    core,
                    events,
                    completions,
                    ..
                } = &mut *state;
                core.cancel_all(completions, events);
            }
            state.pending.clear();
        }
        self.delivery.close();
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("addr", &self.addr)
            .field("backlog", &self.backlog())
            .finish()
    }
}
