//! Ed25519 message signing and verification.
//!
//! Blocks carry signatures and public keys as raw byte vectors (a send from
//! a not-yet-existing account carries neither), so these helpers work on
//! slices and treat any malformed input as verification failure.

use crate::keys::KeyPair;
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// Sign a message, returning the 64-byte signature.
pub fn sign_message(message: &[u8], keypair: &KeyPair) -> Vec<u8> {
    let signing_key = SigningKey::from_bytes(&keypair.secret);
    signing_key.sign(message).to_bytes().to_vec()
}

/// Verify a signature against a message and public key.
///
/// Returns `false` for malformed keys or signatures as well as for honest
/// verification failures.
pub fn verify_signature(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; 64]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &sig).is_ok()
}
