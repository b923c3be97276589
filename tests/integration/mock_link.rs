//! Mock link executor and callback recorder for integration tests.
//!
//! [`MockLink`] records every operation it is handed.  In manual mode the
//! test answers each one through [`MockHandle::respond`]; in inline mode the
//! mock reports from inside `execute`, the way a synchronous platform stack
//! would.

use bledispatch::{LinkExecutor, LinkOutcome, Operation, OutcomeReporter, Response};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── MockLink ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Operations wait for `MockHandle::respond`.
    Manual,
    /// Operations are answered from the script inside `execute`.
    Inline,
}

struct MockState {
    mode: Mode,
    reporter: Option<OutcomeReporter>,
    executed: Vec<Operation>,
    outstanding: Option<Operation>,
    overlaps: usize,
    script: VecDeque<LinkOutcome>,
    binds: usize,
}

pub struct MockLink {
    state: Arc<Mutex<MockState>>,
}

#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockLink {
    pub fn new(mode: Mode) -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState {
            mode,
            reporter: None,
            executed: Vec::new(),
            outstanding: None,
            overlaps: 0,
            script: VecDeque::new(),
            binds: 0,
        }));
        (
            Self {
                state: state.clone(),
            },
            MockHandle { state },
        )
    }

    pub fn manual() -> (Self, MockHandle) {
        Self::new(Mode::Manual)
    }

    pub fn inline() -> (Self, MockHandle) {
        Self::new(Mode::Inline)
    }
}

impl LinkExecutor for MockLink {
    fn bind(&mut self, reporter: OutcomeReporter) {
        let mut s = self.state.lock().unwrap();
        s.reporter = Some(reporter);
        s.binds += 1;
    }

    fn execute(&mut self, operation: Operation) {
        let inline = {
            let mut s = self.state.lock().unwrap();
            s.executed.push(operation.clone());
            if s.outstanding.is_some() {
                s.overlaps += 1;
            }
            match s.mode {
                Mode::Manual => {
                    s.outstanding = Some(operation);
                    None
                }
                Mode::Inline => {
                    let outcome = s.script.pop_front().unwrap_or(LinkOutcome::ok());
                    Some((s.reporter.clone().unwrap(), operation, outcome))
                }
            }
        };
        // Report outside our own lock, still inside `execute`.
        if let Some((reporter, operation, outcome)) = inline {
            reporter.report(operation.ticket, outcome);
        }
    }
}

#[allow(dead_code)]
impl MockHandle {
    /// Answer the outstanding operation.  Panics if there is none.
    pub fn respond(&self, outcome: LinkOutcome) -> Operation {
        let (reporter, operation) = {
            let mut s = self.state.lock().unwrap();
            let op = s.outstanding.take().expect("no outstanding operation");
            (s.reporter.clone().unwrap(), op)
        };
        reporter.report(operation.ticket, outcome);
        operation
    }

    /// Report directly through the bound reporter, bypassing bookkeeping.
    pub fn reporter(&self) -> OutcomeReporter {
        self.state.lock().unwrap().reporter.clone().unwrap()
    }

    pub fn script(&self, outcomes: impl IntoIterator<Item = LinkOutcome>) {
        self.state.lock().unwrap().script.extend(outcomes);
    }

    pub fn outstanding(&self) -> Option<Operation> {
        self.state.lock().unwrap().outstanding.clone()
    }

    pub fn executed(&self) -> Vec<Operation> {
        self.state.lock().unwrap().executed.clone()
    }

    /// Times `execute` was called while an operation was still outstanding.
    pub fn overlaps(&self) -> usize {
        self.state.lock().unwrap().overlaps
    }

    pub fn binds(&self) -> usize {
        self.state.lock().unwrap().binds
    }
}

// ── Callback recorder ─────────────────────────────────────────

/// Collects responses together with the name of the thread that ran them.
pub struct Recorder {
    tx: mpsc::Sender<(Response, String)>,
    rx: mpsc::Receiver<(Response, String)>,
}

#[allow(dead_code)]
impl Recorder {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn callback(&self) -> impl FnOnce(Response) + Send + 'static {
        let tx = self.tx.clone();
        move |resp: Response| {
            let thread = std::thread::current().name().unwrap_or("").to_string();
            let _ = tx.send((resp, thread));
        }
    }

    /// Wait for exactly `n` callbacks.
    pub fn take(&self, n: usize) -> Vec<(Response, String)> {
        (0..n)
            .map(|i| {
                self.rx
                    .recv_timeout(Duration::from_secs(5))
                    .unwrap_or_else(|_| panic!("callback {} of {} never arrived", i + 1, n))
            })
            .collect()
    }

    pub fn responses(&self, n: usize) -> Vec<Response> {
        self.take(n).into_iter().map(|(r, _)| r).collect()
    }

    /// No further callback within a short grace period.
    pub fn assert_quiet(&self) {
        if let Ok((resp, _)) = self.rx.recv_timeout(Duration::from_millis(100)) {
            panic!("unexpected callback: {:?}", resp);
        }
    }
}
