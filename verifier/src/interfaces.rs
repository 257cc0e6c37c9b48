//! Capability traits the verifier is composed from.
//!
//! The verifier receives its collaborators through constructor injection;
//! there are no global singletons. [`ChainReader`] is the read subset of the
//! store facade and is implemented for every [`Store`] automatically.

use crate::error::VerifierError;
use trellis_ledger::{AccountBlock, AccountType, SnapshotBlock, VmAccountBlock};
use trellis_store::{Store, StoreError};
use trellis_types::{Address, Hash};

/// Read access to the persisted chain.
pub trait ChainReader: Send + Sync {
    fn account_type(&self, addr: &Address) -> Result<AccountType, StoreError>;
    fn get_latest_account_block(&self, addr: &Address)
        -> Result<Option<AccountBlock>, StoreError>;
    fn get_account_block_by_hash(&self, hash: &Hash) -> Result<Option<AccountBlock>, StoreError>;
    fn get_snapshot_block_by_hash(&self, hash: &Hash) -> Result<Option<SnapshotBlock>, StoreError>;
    fn get_latest_snapshot_block(&self) -> Result<SnapshotBlock, StoreError>;
}

impl<S: Store + ?Sized> ChainReader for S {
    fn account_type(&self, addr: &Address) -> Result<AccountType, StoreError> {
        Store::account_type(self, addr)
    }

    fn get_latest_account_block(
        &self,
        addr: &Address,
    ) -> Result<Option<AccountBlock>, StoreError> {
        Store::get_latest_account_block(self, addr)
    }

    fn get_account_block_by_hash(&self, hash: &Hash) -> Result<Option<AccountBlock>, StoreError> {
        Store::get_account_block_by_hash(self, hash)
    }

    fn get_snapshot_block_by_hash(&self, hash: &Hash) -> Result<Option<SnapshotBlock>, StoreError> {
        Store::get_snapshot_block_by_hash(self, hash)
    }

    fn get_latest_snapshot_block(&self) -> Result<SnapshotBlock, StoreError> {
        Store::get_latest_snapshot_block(self)
    }
}

/// Consensus-side check that a contract receive was produced by the
/// group's elected producer.
pub trait ConsensusReader: Send + Sync {
    fn verify_account_producer(&self, block: &AccountBlock) -> Result<(), VerifierError>;
}

/// Signing capability used when generating result blocks.
pub trait Signer: Send + Sync {
    /// Sign `data` with the key of `addr`, returning `(signature, public_key)`.
    fn sign(&self, addr: &Address, data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), VerifierError>;
}

/// The VM facade: executes a block and returns the emitted result blocks.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        block: &AccountBlock,
        signer: &dyn Signer,
    ) -> Result<Vec<VmAccountBlock>, VerifierError>;
}
