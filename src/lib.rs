//! Request dispatcher for a single half-duplex BLE peripheral link.
//!
//! Callers on any thread queue operations (connect, read, write, ...)
//! against one peripheral.  The [`Dispatcher`] hands them to a
//! [`LinkExecutor`] one at a time, retries failures within a per-kind
//! budget, caps the backlog, and delivers every outcome to the caller's
//! callback on a single ordered delivery thread.
//!
//! ```text
//!  caller ──▶ Dispatcher ──▶ LinkExecutor ──▶ OutcomeReporter ──▶ Dispatcher
//!                 │                                                  │
//!                 └────────────▶ delivery thread ──▶ callbacks ◀──────┘
//! ```

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod delivery;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod peripheral;

pub use config::{DispatcherConfig, RetryBudgets};
pub use diagnostics::DispatchStats;
pub use dispatch::events::DispatchEvent;
pub use dispatch::ports::{CompletionSink, EventSink, LinkExecutor, NullEventSink, TransportPort};
pub use dispatch::request::{
    Callback, Command, LinkOutcome, MAX_ATTRIBUTE_LEN, Operation, RequestId, RequestKind,
    Response, ResponseValue, Ticket,
};
pub use dispatch::{DispatchCore, Dispatcher, OutcomeReporter};
pub use error::{Code, ConfigError, DispatchError, Result};
pub use peripheral::{AddrParseError, CharacteristicRef, PeripheralAddr};
