//! Simulated link executor for host builds and integration tests.
//!
//! [`SimulatedLink`] implements [`LinkExecutor`] without a radio.  Each
//! operation travels over an `embassy-sync` channel to a worker thread that
//! runs an `edge-executor` task, waits the configured latency on an
//! `async-io-mini` timer, and reports an outcome.
//!
//! ```text
//!  Dispatcher ──execute──▶ inbox (Channel) ──▶ ┌─────────────────────────┐
//!                                              │ sim-link thread         │
//!                                              │  LocalExecutor          │
//!                                              │   link_loop: latency ⏱  │
//!  Dispatcher ◀──────── OutcomeReporter ◀───── │   answer from script    │
//!                                              └─────────────────────────┘
//! ```
//!
//! Outcomes come from a [`LinkScript`]: queued outcomes are consumed first,
//! one per operation.  With the script empty every operation succeeds;
//! writes are remembered per characteristic and reads return the last value
//! written.

use core::time::Duration;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, info, warn};

use crate::dispatch::ports::LinkExecutor;
use crate::dispatch::request::{
    AttributeValue, Command, LinkOutcome, Operation, ResponseValue,
};
use crate::dispatch::service::OutcomeReporter;
use crate::error::{Code, Result};
use crate::peripheral::CharacteristicRef;

/// Inbox depth.  The dispatcher never has more than one operation out.
const INBOX_DEPTH: usize = 4;

/// Worker stack.  Reports run the dispatcher and its logging on it.
const WORKER_STACK_KB: usize = 128;

/// RSSI reported when the script does not say otherwise.
const DEFAULT_RSSI: i8 = -60;

enum LinkMsg {
    Bind(OutcomeReporter),
    Run(Operation),
    Stop,
}

type Inbox = Channel<CriticalSectionRawMutex, LinkMsg, INBOX_DEPTH>;

// ───────────────────────────────────────────────────────────────
// Script
// ───────────────────────────────────────────────────────────────

struct ScriptState {
    outcomes: VecDeque<LinkOutcome>,
    executed: Vec<Operation>,
    attributes: HashMap<CharacteristicRef, AttributeValue>,
    rssi: i8,
    in_flight: usize,
    peak_in_flight: usize,
}

/// Shared handle to the simulated link's behavior and history.
#[derive(Clone)]
pub struct LinkScript {
    state: Arc<Mutex<ScriptState>>,
}

impl LinkScript {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                outcomes: VecDeque::new(),
                executed: Vec::new(),
                attributes: HashMap::new(),
                rssi: DEFAULT_RSSI,
                in_flight: 0,
                peak_in_flight: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer the next operation with `outcome`.
    pub fn push(&self, outcome: LinkOutcome) {
        self.lock().outcomes.push_back(outcome);
    }

    /// Fail the next `count` operations with `code`.
    pub fn push_failures(&self, count: usize, code: Code) {
        let mut state = self.lock();
        for _ in 0..count {
            state.outcomes.push_back(LinkOutcome::Failure(code));
        }
    }

    pub fn set_rssi(&self, rssi: i8) {
        self.lock().rssi = rssi;
    }

    /// Operations received so far, in execution order.
    pub fn executed(&self) -> Vec<Operation> {
        self.lock().executed.clone()
    }

    /// Highest number of operations ever outstanding at once.
    pub fn peak_in_flight(&self) -> usize {
        self.lock().peak_in_flight
    }

    /// Scripted outcomes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lock().outcomes.len()
    }

    fn begin(&self, operation: &Operation) {
        let mut state = self.lock();
        state.executed.push(operation.clone());
        state.in_flight += 1;
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
    }

    fn answer(&self, operation: &Operation) -> LinkOutcome {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if let Some(outcome) = state.outcomes.pop_front() {
            return outcome;
        }
        match &operation.command {
            Command::Read(target) => {
                let value = state.attributes.get(target).cloned().unwrap_or_default();
                LinkOutcome::Success(Some(ResponseValue::Bytes(value)))
            }
            Command::Write { target, payload } => {
                state.attributes.insert(*target, payload.clone());
                LinkOutcome::ok()
            }
            Command::ReadRssi => LinkOutcome::Success(Some(ResponseValue::Rssi(state.rssi))),
            Command::Connect
            | Command::Disconnect
            | Command::Subscribe(_)
            | Command::Unsubscribe(_) => LinkOutcome::ok(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Executor
// ───────────────────────────────────────────────────────────────

/// [`LinkExecutor`] backed by a worker thread and a script.
pub struct SimulatedLink {
    inbox: Arc<Inbox>,
    script: LinkScript,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedLink {
    /// Spawn the worker thread.  Every operation takes `latency` to answer.
    pub fn spawn(latency: Duration) -> Result<Self> {
        let inbox: Arc<Inbox> = Arc::new(Channel::new());
        let script = LinkScript::new();

        let worker = {
            let inbox = inbox.clone();
            let script = script.clone();
            std::thread::Builder::new()
                .name("sim-link".into())
                .stack_size(WORKER_STACK_KB * 1024)
                .spawn(move || run_link(inbox, script, latency))?
        };
        info!("SimLink: started (latency={:?})", latency);

        Ok(Self {
            inbox,
            script,
            worker: Some(worker),
        })
    }

    /// Handle for scripting outcomes and inspecting history.
    pub fn script(&self) -> LinkScript {
        self.script.clone()
    }
}

impl LinkExecutor for SimulatedLink {
    fn bind(&mut self, reporter: OutcomeReporter) {
        if self.inbox.try_send(LinkMsg::Bind(reporter)).is_err() {
            warn!("SimLink: inbox full, bind dropped");
        }
    }

    fn execute(&mut self, operation: Operation) {
        let ticket = operation.ticket;
        self.script.begin(&operation);
        if self.inbox.try_send(LinkMsg::Run(operation)).is_err() {
            warn!("SimLink: inbox full, {} not run", ticket);
        }
    }
}

impl Drop for SimulatedLink {
    fn drop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        if worker.thread().id() == std::thread::current().id() {
            // Dropped from inside a report; the loop exits on Stop.
            let _ = self.inbox.try_send(LinkMsg::Stop);
            return;
        }
        futures_lite::future::block_on(self.inbox.send(LinkMsg::Stop));
        if worker.join().is_err() {
            warn!("SimLink: worker exited with a panic");
        }
    }
}

// ── Worker ───────────────────────────────────────────────────

async fn link_loop(inbox: Arc<Inbox>, script: LinkScript, latency: Duration) {
    let mut reporter: Option<OutcomeReporter> = None;
    loop {
        match inbox.receive().await {
            LinkMsg::Bind(r) => reporter = Some(r),
            LinkMsg::Run(operation) => {
                if !latency.is_zero() {
                    async_io_mini::Timer::after(latency).await;
                }
                let outcome = script.answer(&operation);
                debug!("SimLink: {} -> {:?}", operation.ticket, outcome);
                match &reporter {
                    Some(r) => r.report(operation.ticket, outcome),
                    None => warn!("SimLink: {} finished before bind", operation.ticket),
                }
            }
            LinkMsg::Stop => break,
        }
    }
    debug!("SimLink: stopped");
}

fn run_link(inbox: Arc<Inbox>, script: LinkScript, latency: Duration) {
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let task = executor.spawn(link_loop(inbox, script, latency));
    futures_lite::future::block_on(executor.run(task));
}
