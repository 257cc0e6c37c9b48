//! Account block verification.
//!
//! Classifies incoming account blocks against their referential
//! dependencies: the predecessor on the same chain, the linked send for
//! receives, and the referenced snapshot block. The outcome is a three-way
//! verdict — `Success`, `Pending` (a dependency has not arrived yet) or
//! `Fail` (the block can never become valid).

pub mod account_verifier;
pub mod error;
pub mod interfaces;
pub mod stat;

pub use account_verifier::AccountVerifier;
pub use error::VerifierError;
pub use interfaces::{ChainReader, ConsensusReader, Generator, Signer};
pub use stat::{AccountPendingTask, SnapshotPendingTask, VerifyResult, VerifyStat};
