//! 256-bit token amounts.

use crate::error::TypeError;
use crate::params::MAX_BIG_INT_LEN;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative token amount, at most 256 bits wide.
///
/// Amounts parsed from the wire are validated against [`MAX_BIG_INT_LEN`];
/// in-memory arithmetic is checked, so an amount can never go negative or
/// silently wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Self = Self(U256::zero());

    pub fn new(value: U256) -> Self {
        Self(value)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    /// Parse a big-endian byte slice. Rejects inputs wider than
    /// [`MAX_BIG_INT_LEN`] bits.
    pub fn from_be_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() * 8 > MAX_BIG_INT_LEN {
            return Err(TypeError::AmountOutOfBounds(bytes.len() * 8));
        }
        Ok(Self(U256::from_big_endian(bytes)))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Number of significant bits.
    pub fn bits(&self) -> usize {
        self.0.bits()
    }

    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
