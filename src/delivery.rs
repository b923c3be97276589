//! Completion delivery: the single ordered path back to caller callbacks.
//!
//! Runs in a dedicated thread using `edge-executor`, parked on an
//! `embassy-sync` [`Signal`] between batches.  Producers push completions
//! into an unbounded deque and raise the signal; they never block on the
//! consumer and nothing is ever dropped.
//!
//! ```text
//!  dispatcher (any thread)            delivery thread
//!  ┌──────────────────────┐          ┌───────────────────────────────┐
//!  │ DeliveryHandle::push │──deque──▶│ futures_lite::block_on        │
//!  │        │             │          │  └ LocalExecutor              │
//!  │        └─ signal ────┼─────────▶│     └ delivery_loop           │
//!  └──────────────────────┘          │        wait ▸ drain ▸ invoke  │
//!                                    └───────────────────────────────┘
//! ```
//!
//! Callbacks run one at a time, in push order.  A panicking callback is
//! caught and logged; the next completion still runs.

use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use crate::dispatch::ports::CompletionSink;
use crate::dispatch::request::Completion;
use crate::error::Result;

// ── Shared state ─────────────────────────────────────────────

struct Mailbox {
    queue: Mutex<VecDeque<Completion>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
    closed: AtomicBool,
    delivered: AtomicU64,
    panicked: AtomicU64,
}

impl Mailbox {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            wake: Signal::new(),
            closed: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
        }
    }

    fn push(&self, completion: Completion) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(completion);
        self.wake.signal(());
    }

    fn take_batch(&self) -> VecDeque<Completion> {
        core::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn is_empty(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

// ── Producer side ────────────────────────────────────────────

/// Cloneable producer handle.  Implements [`CompletionSink`].
#[derive(Clone)]
pub struct DeliveryHandle {
    mailbox: Arc<Mailbox>,
}

impl CompletionSink for DeliveryHandle {
    fn push(&mut self, completion: Completion) {
        if self.mailbox.closed.load(Ordering::Acquire) {
            // Late arrivals after close still run, inline.
            warn!(
                "Delivery: channel closed, running {} inline",
                completion.response().id
            );
            deliver_guarded(&self.mailbox, completion);
            return;
        }
        self.mailbox.push(completion);
    }
}

// ── Consumer thread ──────────────────────────────────────────

/// Owner of the delivery thread.
pub struct DeliveryChannel {
    mailbox: Arc<Mailbox>,
    thread: Option<JoinHandle<()>>,
}

impl DeliveryChannel {
    /// Spawn the delivery thread.
    pub fn spawn(name: &str, stack_kb: usize) -> Result<Self> {
        let mailbox = Arc::new(Mailbox::new());
        let worker = mailbox.clone();

        info!("Spawning '{}' (stack={}KB)", name, stack_kb);
        let thread = std::thread::Builder::new()
            .name(name.into())
            .stack_size(stack_kb * 1024)
            .spawn(move || run_delivery(worker))?;

        Ok(Self {
            mailbox,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> DeliveryHandle {
        DeliveryHandle {
            mailbox: self.mailbox.clone(),
        }
    }

    /// Callbacks run so far.
    pub fn delivered(&self) -> u64 {
        self.mailbox.delivered.load(Ordering::Relaxed)
    }

    /// Callbacks that panicked.
    pub fn panicked(&self) -> u64 {
        self.mailbox.panicked.load(Ordering::Relaxed)
    }

    /// Stop accepting completions, let the thread drain what was pushed,
    /// and join it.
    ///
    /// Called from a callback (i.e. on the delivery thread itself) the join
    /// is skipped; the thread exits on its own once drained.
    pub fn close(&mut self) {
        self.mailbox.closed.store(true, Ordering::Release);
        self.mailbox.wake.signal(());

        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == std::thread::current().id() {
            debug!("Delivery: close called from delivery thread, not joining");
            return;
        }
        if thread.join().is_err() {
            warn!("Delivery: thread exited with a panic");
        }
    }
}

impl Drop for DeliveryChannel {
    fn drop(&mut self) {
        self.close();
    }
}

fn deliver_guarded(mailbox: &Mailbox, completion: Completion) {
    let id = completion.response().id;
    mailbox.delivered.fetch_add(1, Ordering::Relaxed);
    if catch_unwind(AssertUnwindSafe(|| completion.deliver())).is_err() {
        mailbox.panicked.fetch_add(1, Ordering::Relaxed);
        warn!("Delivery: callback for {} panicked", id);
    }
}

/// Wait for a signal, drain everything queued, repeat until closed and empty.
async fn delivery_loop(mailbox: Arc<Mailbox>) {
    loop {
        for completion in mailbox.take_batch() {
            deliver_guarded(&mailbox, completion);
        }
        if mailbox.closed.load(Ordering::Acquire) && mailbox.is_empty() {
            break;
        }
        mailbox.wake.wait().await;
    }
    debug!("Delivery: drained, exiting");
}

fn run_delivery(mailbox: Arc<Mailbox>) {
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let task = executor.spawn(delivery_loop(mailbox));
    futures_lite::future::block_on(executor.run(task));
}
