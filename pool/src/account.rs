//! Account-chain binding of the chain pool.
//!
//! Ties one account's [`ChainPool`] to the store and the on-road pool:
//! promotion writes the ledger rows and the on-road effects in one batch,
//! rollback deletes rows and reverts on-road state in one batch, and
//! listeners fire only after the batch has committed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::chain_pool::{ChainPool, Fork2, Ingest};
use crate::error::PoolError;
use crate::snippet::Snippet;
use crate::tree::{BranchId, DiskRoot};
use trellis_ledger::{AccountBlock, VmAccountBlock};
use trellis_onroad::OnRoadPool;
use trellis_store::{Batch, BatchOp, Store};
use trellis_types::{Address, Hash};

/// The persisted chain of a single account, with on-road effects bound
/// into every append.
pub struct AccountDiskRoot {
    store: Arc<dyn Store>,
    on_road: Arc<OnRoadPool>,
    address: Address,
}

impl AccountDiskRoot {
    pub fn new(address: Address, store: Arc<dyn Store>, on_road: Arc<OnRoadPool>) -> Self {
        Self {
            store,
            on_road,
            address,
        }
    }
}

impl DiskRoot<VmAccountBlock> for AccountDiskRoot {
    fn head_hh(&self) -> Result<(u64, Hash), PoolError> {
        Ok(self
            .store
            .get_latest_account_block(&self.address)?
            .map(|b| (b.height, b.hash))
            .unwrap_or((0, Hash::ZERO)))
    }

    fn knot(&self, height: u64) -> Result<Option<VmAccountBlock>, PoolError> {
        Ok(self
            .store
            .get_account_block_by_height(&self.address, height)?
            .map(VmAccountBlock::plain))
    }

    fn append(&self, blocks: Vec<VmAccountBlock>) -> Result<(), PoolError> {
        let mut batch = Batch::new();
        for vm_block in &blocks {
            batch.push(BatchOp::PutAccountBlock(vm_block.block.clone()));
        }
        self.on_road.write_on_road(&mut batch, &blocks)?;
        self.store.write_batch(batch)?;

        // Caches and listeners only after the commit.
        for vm_block in &blocks {
            let block = &vm_block.block;
            if block.is_send() {
                if let Err(err) = self.on_road.update_cache(true, block) {
                    tracing::warn!(hash = %block.hash, %err, "cache update after send");
                }
                if let Err(err) = self.on_road.new_signal_to_worker(block) {
                    tracing::warn!(hash = %block.hash, %err, "worker signal");
                }
            } else {
                match self.store.get_account_block_by_hash(&block.from_block_hash) {
                    Ok(Some(send)) => {
                        if let Err(err) = self.on_road.update_cache(false, &send) {
                            tracing::warn!(hash = %block.hash, %err, "cache update after receive");
                        }
                    }
                    Ok(None) => {
                        tracing::warn!(hash = %block.from_block_hash, "received send not found");
                    }
                    Err(err) => {
                        tracing::warn!(hash = %block.from_block_hash, %err, "send lookup");
                    }
                }
            }
        }
        Ok(())
    }
}

/// Chain pool over one account's chain, wired to the on-road pool.
pub struct AccountChainPool {
    address: Address,
    pool: ChainPool<VmAccountBlock>,
    store: Arc<dyn Store>,
    on_road: Arc<OnRoadPool>,
}

impl AccountChainPool {
    pub fn new(
        address: Address,
        store: Arc<dyn Store>,
        on_road: Arc<OnRoadPool>,
    ) -> Result<Self, PoolError> {
        let disk = Arc::new(AccountDiskRoot::new(address, store.clone(), on_road.clone()));
        let pool = ChainPool::new(format!("account-{address}"), disk)?;
        Ok(Self {
            address,
            pool,
            store,
            on_road,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn pool(&self) -> &ChainPool<VmAccountBlock> {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ChainPool<VmAccountBlock> {
        &mut self.pool
    }

    pub fn fork2(&self, snippet: &Snippet<VmAccountBlock>) -> Result<Fork2, PoolError> {
        self.pool.fork2(snippet)
    }

    pub fn ingest(&mut self, snippet: Snippet<VmAccountBlock>) -> Result<Ingest, PoolError> {
        self.pool.add_snippet(snippet)
    }

    /// Promote main up to `to_height`: ledger rows, on-road metadata and
    /// gid-index updates commit in one batch, then caches update and
    /// listeners fire.
    pub fn promote(&mut self, to_height: u64) -> Result<(), PoolError> {
        let main = self.pool.tree().main();
        self.pool.write_to_chain(main, to_height)
    }

    /// Re-root main onto `target` (longest-branch winner).
    pub fn current_modify_to_chain(&mut self, target: BranchId) -> Result<(), PoolError> {
        self.pool.current_modify_to_chain(target)
    }

    /// Revert a suffix of main. Persisted rows are deleted and on-road
    /// state reverted in a single batch; affected cache entries are
    /// invalidated afterwards.
    pub fn rollback_current(&mut self, blocks: Vec<VmAccountBlock>) -> Result<(), PoolError> {
        if blocks.is_empty() {
            return Ok(());
        }
        let main = self.pool.tree().main();
        let (tail_height, _) = self.pool.tree().tail_hh(main)?;

        self.pool.rollback_current(&blocks)?;

        let mut sub_ledger: HashMap<Address, Vec<AccountBlock>> = HashMap::new();
        for vm_block in &blocks {
            sub_ledger
                .entry(vm_block.block.account_address)
                .or_default()
                .push(vm_block.block.clone());
        }

        let mut batch = Batch::new();
        for vm_block in blocks.iter().rev() {
            if vm_block.block.height <= tail_height {
                batch.push(BatchOp::DeleteAccountBlock(vm_block.block.hash));
            }
        }
        self.on_road.delete_on_road(&mut batch, &sub_ledger)?;
        self.store.write_batch(batch)?;

        let mut touched: HashSet<Address> = HashSet::new();
        for vm_block in &blocks {
            let block = &vm_block.block;
            if block.is_send() {
                touched.insert(block.to_address);
            } else {
                touched.insert(block.account_address);
            }
        }
        for addr in touched {
            self.on_road.invalidate_cache(&addr);
        }
        Ok(())
    }

    pub fn check(&self) -> Result<(), PoolError> {
        self.pool.check()
    }
}
