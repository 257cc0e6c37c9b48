//! Contract-group and token identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 10-byte contract-group identifier.
///
/// Contracts created under the same group share one consensus producer set.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gid([u8; 10]);

impl Gid {
    pub const ZERO: Self = Self([0u8; 10]);

    pub fn new(bytes: [u8; 10]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 10]
    }

    /// Extract the group id from the payload of a contract-creation send.
    ///
    /// The group id occupies the first 10 bytes of the call data; shorter
    /// payloads carry no group.
    pub fn from_create_data(data: &[u8]) -> Option<Self> {
        if data.len() < 10 {
            return None;
        }
        let mut bytes = [0u8; 10];
        bytes.copy_from_slice(&data[..10]);
        Some(Self(bytes))
    }
}

impl fmt::Debug for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Gid(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

/// A 10-byte token identifier.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenId([u8; 10]);

impl TokenId {
    pub const ZERO: Self = Self([0u8; 10]);

    pub fn new(bytes: [u8; 10]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 10] {
        &self.0
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId(")?;
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}
