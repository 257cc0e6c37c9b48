//! The store facade trait.

use crate::account_info::CommonAccountInfo;
use crate::batch::Batch;
use crate::error::StoreError;
use trellis_ledger::{AccountBlock, AccountType, SnapshotBlock};
use trellis_types::{Address, Gid, Hash};

/// Typed access to persisted blocks and on-road metadata.
///
/// Read methods return `Ok(None)` for a missing record and reserve `Err` for
/// backend failures, with one exception: the snapshot chain always has a
/// head (genesis), so [`get_latest_snapshot_block`](Store::get_latest_snapshot_block)
/// on an unseeded store is a backend error.
pub trait Store: Send + Sync {
    /// How the persisted chain knows this account.
    fn account_type(&self, addr: &Address) -> Result<AccountType, StoreError>;

    /// The head block of an account's chain.
    fn get_latest_account_block(&self, addr: &Address)
        -> Result<Option<AccountBlock>, StoreError>;

    fn get_account_block_by_hash(&self, hash: &Hash) -> Result<Option<AccountBlock>, StoreError>;

    fn get_account_block_by_height(
        &self,
        addr: &Address,
        height: u64,
    ) -> Result<Option<AccountBlock>, StoreError>;

    fn get_snapshot_block_by_hash(&self, hash: &Hash) -> Result<Option<SnapshotBlock>, StoreError>;

    fn get_snapshot_block_by_height(
        &self,
        height: u64,
    ) -> Result<Option<SnapshotBlock>, StoreError>;

    fn get_latest_snapshot_block(&self) -> Result<SnapshotBlock, StoreError>;

    /// The contract group an address was created under, if any.
    fn get_contract_gid(&self, addr: &Address) -> Result<Option<Gid>, StoreError>;

    fn get_contract_addr_list_by_gid(&self, gid: &Gid) -> Result<Vec<Address>, StoreError>;

    /// Every unconsumed send targeting `addr`, ordered by send hash.
    fn get_all_on_road_blocks(&self, addr: &Address) -> Result<Vec<AccountBlock>, StoreError>;

    /// A page of the on-road queue: skips `index * count` entries and
    /// returns at most `num * count`.
    fn get_on_road_blocks(
        &self,
        index: u64,
        num: u64,
        count: u64,
        addr: &Address,
    ) -> Result<Vec<AccountBlock>, StoreError>;

    /// Aggregate over the on-road queue, or `None` when it is empty.
    fn get_common_account_info(
        &self,
        addr: &Address,
    ) -> Result<Option<CommonAccountInfo>, StoreError>;

    /// Commit a batch atomically: every operation or none.
    fn write_batch(&self, batch: Batch) -> Result<(), StoreError>;
}
