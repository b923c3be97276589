//! Requests: one pending link operation each.
//!
//! A [`Request`] bundles the [`Command`] to run, its remaining retry budget
//! and the caller's completion callback.  The executor never sees a
//! `Request`: it gets an [`Operation`] (ticket plus command) and answers with
//! a [`LinkOutcome`].  When the request finishes it turns into a
//! [`Completion`], which the delivery channel later invokes.

use core::fmt;

use crate::error::Code;
use crate::peripheral::CharacteristicRef;

/// Largest attribute value the link can carry (ATT maximum).
pub const MAX_ATTRIBUTE_LEN: usize = 512;

/// Attribute payload, stored inline.
pub type AttributeValue = heapless::Vec<u8, MAX_ATTRIBUTE_LEN>;

/// Completion callback supplied by the caller.
pub type Callback = Box<dyn FnOnce(Response) + Send + 'static>;

// ───────────────────────────────────────────────────────────────
// Identity
// ───────────────────────────────────────────────────────────────

/// Per-dispatcher request identifier, allocated in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one dispatch attempt of one request.
///
/// The executor must echo the ticket it was handed.  The attempt number
/// changes every time a request is re-dispatched, so reports from an
/// earlier attempt never match the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub id: RequestId,
    pub attempt: u16,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.id, self.attempt)
    }
}

// ───────────────────────────────────────────────────────────────
// Commands
// ───────────────────────────────────────────────────────────────

/// Field-less discriminant of [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Connect,
    Disconnect,
    Read,
    Write,
    Subscribe,
    Unsubscribe,
    ReadRssi,
}

impl RequestKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Read => "read",
            Self::Write => "write",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::ReadRssi => "read_rssi",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operation a request asks the link to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect,
    Read(CharacteristicRef),
    Write {
        target: CharacteristicRef,
        payload: AttributeValue,
    },
    Subscribe(CharacteristicRef),
    Unsubscribe(CharacteristicRef),
    ReadRssi,
}

impl Command {
    /// Build a write, rejecting payloads the link cannot carry.
    pub fn write(target: CharacteristicRef, payload: &[u8]) -> Result<Self, Code> {
        let payload = AttributeValue::from_slice(payload).map_err(|()| Code::IllegalArgument)?;
        Ok(Self::Write { target, payload })
    }

    pub const fn kind(&self) -> RequestKind {
        match self {
            Self::Connect => RequestKind::Connect,
            Self::Disconnect => RequestKind::Disconnect,
            Self::Read(_) => RequestKind::Read,
            Self::Write { .. } => RequestKind::Write,
            Self::Subscribe(_) => RequestKind::Subscribe,
            Self::Unsubscribe(_) => RequestKind::Unsubscribe,
            Self::ReadRssi => RequestKind::ReadRssi,
        }
    }

    /// Characteristic addressed by this command, if any.
    pub const fn target(&self) -> Option<CharacteristicRef> {
        match self {
            Self::Read(t) | Self::Subscribe(t) | Self::Unsubscribe(t) => Some(*t),
            Self::Write { target, .. } => Some(*target),
            Self::Connect | Self::Disconnect | Self::ReadRssi => None,
        }
    }

    /// Bytes to write, for `Write` only.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Write { payload, .. } => Some(payload.as_slice()),
            _ => None,
        }
    }
}

/// What the executor is handed: one attempt of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub ticket: Ticket,
    pub command: Command,
}

// ───────────────────────────────────────────────────────────────
// Outcomes
// ───────────────────────────────────────────────────────────────

/// Data returned by a successful operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseValue {
    /// Characteristic value from a read.
    Bytes(AttributeValue),
    /// Received signal strength in dBm.
    Rssi(i8),
}

/// Pass/fail signal reported by the executor for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Success(Option<ResponseValue>),
    Failure(Code),
}

impl LinkOutcome {
    /// Plain success with no data.
    pub const fn ok() -> Self {
        Self::Success(None)
    }

    /// Failure without a specific code.
    pub const fn failed() -> Self {
        Self::Failure(Code::Failed)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// What the caller's callback receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: RequestId,
    pub kind: RequestKind,
    pub code: Code,
    pub value: Option<ResponseValue>,
}

impl Response {
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Read payload, if this is a successful read.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            Some(ResponseValue::Bytes(b)) => Some(b.as_slice()),
            _ => None,
        }
    }

    /// Signal strength, if this is a successful RSSI query.
    pub fn rssi(&self) -> Option<i8> {
        match self.value {
            Some(ResponseValue::Rssi(r)) => Some(r),
            _ => None,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Request
// ───────────────────────────────────────────────────────────────

/// One pending operation, owned by either the queue or the current slot.
pub struct Request {
    id: RequestId,
    command: Command,
    retries_remaining: u8,
    attempt: u16,
    callback: Option<Callback>,
}

impl Request {
    pub fn new(
        id: RequestId,
        command: Command,
        retries: u8,
        callback: Option<Callback>,
    ) -> Self {
        Self {
            id,
            command,
            retries_remaining: retries,
            attempt: 1,
            callback,
        }
    }

    pub const fn id(&self) -> RequestId {
        self.id
    }

    pub const fn kind(&self) -> RequestKind {
        self.command.kind()
    }

    pub const fn command(&self) -> &Command {
        &self.command
    }

    pub const fn retries_remaining(&self) -> u8 {
        self.retries_remaining
    }

    pub const fn attempt(&self) -> u16 {
        self.attempt
    }

    pub const fn ticket(&self) -> Ticket {
        Ticket {
            id: self.id,
            attempt: self.attempt,
        }
    }

    pub const fn can_retry(&self) -> bool {
        self.retries_remaining > 0
    }

    /// Spend one unit of retry budget and open a new attempt.
    pub(crate) fn retry(&mut self) {
        self.retries_remaining = self.retries_remaining.saturating_sub(1);
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Snapshot handed to the executor.
    pub(crate) fn operation(&self) -> Operation {
        Operation {
            ticket: self.ticket(),
            command: self.command.clone(),
        }
    }

    /// Finalize the request.  Consumes it, so the result is set exactly once.
    pub(crate) fn finish(self, code: Code, value: Option<ResponseValue>) -> Completion {
        Completion {
            response: Response {
                id: self.id,
                kind: self.command.kind(),
                code,
                value,
            },
            callback: self.callback,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("command", &self.command)
            .field("retries_remaining", &self.retries_remaining)
            .field("attempt", &self.attempt)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

// ───────────────────────────────────────────────────────────────
// Completion
// ───────────────────────────────────────────────────────────────

/// A finished request waiting for its callback to run.
pub struct Completion {
    response: Response,
    callback: Option<Callback>,
}

impl Completion {
    /// Completion for a request that never got a [`Request`] of its own
    /// (rejected before it was built).
    pub(crate) fn rejected(
        id: RequestId,
        kind: RequestKind,
        code: Code,
        callback: Option<Callback>,
    ) -> Self {
        Self {
            response: Response {
                id,
                kind,
                code,
                value: None,
            },
            callback,
        }
    }

    pub const fn response(&self) -> &Response {
        &self.response
    }

    /// Invoke the callback.  Requests without one complete silently.
    pub fn deliver(self) {
        if let Some(callback) = self.callback {
            callback(self.response);
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("response", &self.response)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
