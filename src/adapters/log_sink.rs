//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every [`DispatchEvent`] as one log
//! record through the `log` facade.  Whoever embeds the dispatcher picks
//! the backend.

use log::{debug, info, warn};

use crate::dispatch::events::DispatchEvent;
use crate::dispatch::ports::EventSink;

/// Adapter that logs every [`DispatchEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &DispatchEvent) {
        match event {
            DispatchEvent::Queued { id, kind, backlog } => {
                debug!("QUEUE | {} {} | backlog={}", kind, id, backlog);
            }
            DispatchEvent::Dispatched { ticket, kind } => {
                debug!("EXEC  | {} {}", kind, ticket);
            }
            DispatchEvent::Retrying {
                ticket,
                kind,
                code,
                retries_left,
            } => {
                info!(
                    "RETRY | {} {} | code={} retries_left={}",
                    kind, ticket, code, retries_left
                );
            }
            DispatchEvent::Completed {
                id,
                kind,
                code,
                attempts,
            } => {
                info!("DONE  | {} {} | code={} attempts={}", kind, id, code, attempts);
            }
            DispatchEvent::Rejected { id, kind, code } => {
                warn!("REJECT| {} {} | code={}", kind, id, code);
            }
            DispatchEvent::StaleOutcome { ticket, current } => match current {
                Some(current) => warn!("STALE | {} | current={}", ticket, current),
                None => warn!("STALE | {} | current=none", ticket),
            },
            DispatchEvent::ShutDown { canceled } => {
                info!("STOP  | canceled={}", canceled);
            }
        }
    }
}
