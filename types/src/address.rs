//! Account address type.
//!
//! An address is 21 bytes: a 20-byte body derived from the account's public
//! key, followed by one discriminator byte marking the address space the
//! account was created in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminator byte for general (user) addresses.
pub const CLASS_GENERAL: u8 = 0;
/// Discriminator byte for contract addresses.
pub const CLASS_CONTRACT: u8 = 1;

/// The address space an address belongs to, read from its last byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressClass {
    General,
    Contract,
    Unknown,
}

/// A 21-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; 21]);

impl Default for Address {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Address {
    pub const ZERO: Self = Self([0u8; 21]);

    pub fn new(bytes: [u8; 21]) -> Self {
        Self(bytes)
    }

    /// Assemble an address from a 20-byte body and a discriminator byte.
    pub fn from_parts(body: [u8; 20], class: u8) -> Self {
        let mut bytes = [0u8; 21];
        bytes[..20].copy_from_slice(&body);
        bytes[20] = class;
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 21] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 21]
    }

    /// The address space encoded in the discriminator byte.
    pub fn class(&self) -> AddressClass {
        match self.0[20] {
            CLASS_GENERAL => AddressClass::General,
            CLASS_CONTRACT => AddressClass::Contract,
            _ => AddressClass::Unknown,
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(")?;
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "\u{2026})")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tls_")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
