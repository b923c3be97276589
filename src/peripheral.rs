//! Peripheral addressing.
//!
//! A dispatcher is bound to exactly one remote peripheral, identified by its
//! 48-bit device address.  Characteristic addressing (service and
//! characteristic UUIDs) is opaque to the dispatcher and kept as raw `u128`
//! values, the same representation the GATT tables use.

use core::fmt;
use core::str::FromStr;

/// 48-bit Bluetooth device address, most significant byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeripheralAddr([u8; 6]);

impl PeripheralAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for PeripheralAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Why a textual address was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrParseError {
    /// Not exactly six colon-separated groups.
    WrongGroupCount,
    /// A group was not two hex digits.
    InvalidOctet,
}

impl fmt::Display for AddrParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongGroupCount => write!(f, "expected six colon-separated octets"),
            Self::InvalidOctet => write!(f, "octet is not two hex digits"),
        }
    }
}

impl FromStr for PeripheralAddr {
    type Err = AddrParseError;

    /// Parse `AA:BB:CC:DD:EE:FF` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut groups = s.split(':');
        for byte in &mut bytes {
            let group = groups.next().ok_or(AddrParseError::WrongGroupCount)?;
            if group.len() != 2 {
                return Err(AddrParseError::InvalidOctet);
            }
            *byte = u8::from_str_radix(group, 16).map_err(|_| AddrParseError::InvalidOctet)?;
        }
        if groups.next().is_some() {
            return Err(AddrParseError::WrongGroupCount);
        }
        Ok(Self(bytes))
    }
}

/// A GATT characteristic inside a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicRef {
    pub service: u128,
    pub characteristic: u128,
}

impl CharacteristicRef {
    pub const fn new(service: u128, characteristic: u128) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

impl fmt::Display for CharacteristicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_uuid(f, self.service)?;
        f.write_str("/")?;
        write_uuid(f, self.characteristic)
    }
}

/// Canonical 8-4-4-4-12 rendering of a 128-bit UUID.
fn write_uuid(f: &mut fmt::Formatter<'_>, uuid: u128) -> fmt::Result {
    write!(
        f,
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        (uuid >> 96) as u32,
        (uuid >> 80) as u16,
        (uuid >> 64) as u16,
        (uuid >> 48) as u16,
        uuid & 0xffff_ffff_ffff,
    )
}
