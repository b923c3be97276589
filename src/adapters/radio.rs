//! Radio availability adapter.
//!
//! [`RadioState`] implements [`TransportPort`] with two atomics.  The
//! platform layer flips them when the adapter appears, disappears, powers on
//! or powers off; the dispatcher reads them before every dispatch.

use std::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::dispatch::ports::TransportPort;

/// Shared, lock-free radio availability flags.
#[derive(Debug)]
pub struct RadioState {
    supported: AtomicBool,
    enabled: AtomicBool,
}

impl RadioState {
    pub const fn new(supported: bool, enabled: bool) -> Self {
        Self {
            supported: AtomicBool::new(supported),
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Supported and powered on.
    pub const fn available() -> Self {
        Self::new(true, true)
    }

    /// No radio on this host.
    pub const fn unsupported() -> Self {
        Self::new(false, false)
    }

    pub fn set_supported(&self, supported: bool) {
        if self.supported.swap(supported, Ordering::AcqRel) != supported {
            info!("Radio: supported={}", supported);
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        if self.enabled.swap(enabled, Ordering::AcqRel) != enabled {
            info!("Radio: enabled={}", enabled);
        }
    }
}

impl Default for RadioState {
    fn default() -> Self {
        Self::available()
    }
}

impl TransportPort for RadioState {
    fn is_supported(&self) -> bool {
        self.supported.load(Ordering::Acquire)
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
