//! Proof-of-work nonce validation.
//!
//! A block may carry an 8-byte nonce instead of paying quota. The nonce is
//! checked against `Blake2b-256(address ∥ prev_hash)` rather than the block
//! hash, so the work can be computed before the block contents are final.

use crate::hash::blake2b_256_multi;
use primitive_types::U256;

/// Threshold applied when a block does not carry an explicit difficulty.
pub const DEFAULT_POW_DIFFICULTY: u64 = 0xFFFF_FFC0_0000_0000;

/// The work value of a nonce: the first 8 bytes of
/// `Blake2b-256(nonce ∥ data)` interpreted as a little-endian integer.
pub fn pow_quality(nonce: &[u8; 8], data: &[u8; 32]) -> u64 {
    let out = blake2b_256_multi(&[nonce.as_slice(), data.as_slice()]);
    u64::from_le_bytes([
        out[0], out[1], out[2], out[3], out[4], out[5], out[6], out[7],
    ])
}

/// Check a proof-of-work nonce against the input digest.
///
/// The nonce's work value must be at least the difficulty threshold. A
/// difficulty wider than 64 bits is clamped to its low word; zero accepts
/// every nonce.
pub fn check_pow_nonce(difficulty: Option<U256>, nonce: &[u8; 8], data: &[u8; 32]) -> bool {
    let threshold = match difficulty {
        Some(d) if d.is_zero() => return true,
        Some(d) => d.low_u64(),
        None => DEFAULT_POW_DIFFICULTY,
    };
    pow_quality(nonce, data) >= threshold
}
