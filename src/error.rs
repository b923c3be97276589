//! Result codes and error types for the dispatcher.
//!
//! Two families live here:
//!
//! - [`Code`]: the result code every caller callback receives.  Codes are
//!   `Copy` and carry a stable `i32` wire value so platform layers can map
//!   them to whatever their host API expects.
//! - [`DispatchError`]: failures constructing a dispatcher.  Once a
//!   dispatcher is running it never returns an error to its embedder; every
//!   outcome flows through the completion callback instead.

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Result codes
// ---------------------------------------------------------------------------

/// Terminal result of a request, as seen by the caller's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum Code {
    /// The executor reported success.
    Success = 0,
    /// The executor reported failure without a more specific code, or the
    /// retry budget ran out.
    Failed = -1,
    /// The request was still pending when the dispatcher shut down.
    Canceled = -2,
    /// The request was malformed (e.g. oversized write payload).
    IllegalArgument = -3,
    /// The radio is not present on this host.
    TransportNotSupported = -4,
    /// The radio is present but powered off.
    TransportDisabled = -5,
    /// The peripheral's services are not discovered yet (executor-reported).
    ServiceUnready = -6,
    /// The executor gave up waiting for the peripheral.
    TimedOut = -7,
    /// The backlog was full at admission time.
    Overflow = -8,
}

impl Code {
    /// Stable integer value of this code.
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Reverse of [`as_i32`](Self::as_i32).  Unknown values map to `None`.
    pub const fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Success),
            -1 => Some(Self::Failed),
            -2 => Some(Self::Canceled),
            -3 => Some(Self::IllegalArgument),
            -4 => Some(Self::TransportNotSupported),
            -5 => Some(Self::TransportDisabled),
            -6 => Some(Self::ServiceUnready),
            -7 => Some(Self::TimedOut),
            -8 => Some(Self::Overflow),
            _ => None,
        }
    }

    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Codes produced by admission control rather than by the link.
    pub const fn is_admission(self) -> bool {
        matches!(
            self,
            Self::Overflow
                | Self::IllegalArgument
                | Self::TransportNotSupported
                | Self::TransportDisabled
        )
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "request success"),
            Self::Failed => write!(f, "request failed"),
            Self::Canceled => write!(f, "request canceled"),
            Self::IllegalArgument => write!(f, "illegal argument"),
            Self::TransportNotSupported => write!(f, "transport not supported"),
            Self::TransportDisabled => write!(f, "transport disabled"),
            Self::ServiceUnready => write!(f, "service unready"),
            Self::TimedOut => write!(f, "request timed out"),
            Self::Overflow => write!(f, "request overflow"),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`DispatcherConfig`](crate::config::DispatcherConfig)
/// validation and loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` names the field and the rule.
    ValidationFailed(&'static str),
    /// The serialized form could not be parsed.
    Malformed,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Malformed => write!(f, "config malformed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Construction errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong bringing a dispatcher up.
#[derive(Debug)]
pub enum DispatchError {
    /// The configuration was rejected.
    Config(ConfigError),
    /// The peripheral address could not be parsed.
    Address(crate::peripheral::AddrParseError),
    /// The delivery thread could not be spawned.
    Spawn(std::io::ErrorKind),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Address(e) => write!(f, "address: {e}"),
            Self::Spawn(kind) => write!(f, "delivery thread spawn failed: {kind}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<ConfigError> for DispatchError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<crate::peripheral::AddrParseError> for DispatchError {
    fn from(e: crate::peripheral::AddrParseError) -> Self {
        Self::Address(e)
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(e: std::io::Error) -> Self {
        Self::Spawn(e.kind())
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, DispatchError>;
