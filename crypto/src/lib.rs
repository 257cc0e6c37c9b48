//! Cryptographic primitives for the trellis ledger.
//!
//! Thin wrappers around Blake2b hashing, Ed25519 signatures and the
//! proof-of-work nonce check. The rest of the workspace depends on these
//! functions rather than on the underlying crates.

pub mod address;
pub mod hash;
pub mod keys;
pub mod pow;
pub mod sign;

pub use address::{derive_address, pubkey_to_address};
pub use hash::{blake2b_256, blake2b_256_multi, hash256};
pub use keys::KeyPair;
pub use pow::{check_pow_nonce, DEFAULT_POW_DIFFICULTY};
pub use sign::{sign_message, verify_signature};
