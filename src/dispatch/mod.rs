//! Request dispatch: the hexagonal core of the crate.
//!
//! - [`request`]: requests, commands, tickets, outcomes and completions
//! - [`queue`]: the backlog deque
//! - [`machine`]: [`DispatchCore`], the lock-free state machine
//! - [`ports`]: traits for the executor, radio predicates and sinks
//! - [`events`]: structured events emitted at every transition
//! - [`service`]: [`Dispatcher`], the thread-safe public surface

pub mod events;
pub mod machine;
pub mod ports;
pub mod queue;
pub mod request;
pub mod service;

pub use machine::DispatchCore;
pub use service::{Dispatcher, OutcomeReporter};
