//! Address derivation from public keys.

use crate::hash::blake2b_256;
use trellis_types::address::CLASS_GENERAL;
use trellis_types::Address;

/// Derive a general (user) address from an Ed25519 public key.
///
/// The address body is the first 20 bytes of `Blake2b-256(public_key)`.
pub fn derive_address(public_key: &[u8]) -> Address {
    let digest = blake2b_256(public_key);
    let mut body = [0u8; 20];
    body.copy_from_slice(&digest[..20]);
    Address::from_parts(body, CLASS_GENERAL)
}

/// Alias used by signature checks: the address a public key authorises.
pub fn pubkey_to_address(public_key: &[u8]) -> Address {
    derive_address(public_key)
}
