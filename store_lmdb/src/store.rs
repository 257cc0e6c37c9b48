//! The LMDB-backed [`Store`] implementation.

use std::ops::Bound;
use std::sync::Arc;

use heed::RwTxn;

use crate::environment::LmdbEnvironment;
use crate::LmdbError;
use trellis_ledger::{AccountBlock, AccountType, SnapshotBlock};
use trellis_store::{Batch, BatchOp, CommonAccountInfo, Store, StoreError, TokenBalance};
use trellis_types::{Address, Gid, Hash};

/// Composite key for the on-road database: `to_address ∥ send_hash`.
fn on_road_key(to: &Address, send_hash: &Hash) -> [u8; 53] {
    let mut key = [0u8; 53];
    key[..21].copy_from_slice(to.as_bytes());
    key[21..].copy_from_slice(send_hash.as_bytes());
    key
}

/// Composite key for the height index: `address ∥ height_be`.
fn height_key(addr: &Address, height: u64) -> [u8; 29] {
    let mut key = [0u8; 29];
    key[..21].copy_from_slice(addr.as_bytes());
    key[21..].copy_from_slice(&height.to_be_bytes());
    key
}

/// Composite key for the group index: `gid ∥ contract_address`.
fn gid_key(gid: &Gid, addr: &Address) -> [u8; 31] {
    let mut key = [0u8; 31];
    key[..10].copy_from_slice(gid.as_bytes());
    key[10..].copy_from_slice(addr.as_bytes());
    key
}

fn hash_from_slice(bytes: &[u8]) -> Result<Hash, StoreError> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| StoreError::Corruption("hash value has wrong length".into()))?;
    Ok(Hash::new(arr))
}

/// Turn a key prefix into the exclusive upper bound of its range: increment
/// the last non-0xFF byte and truncate. Returns `false` for an all-0xFF
/// prefix (the range is unbounded above).
fn increment_prefix(prefix: &mut Vec<u8>) -> bool {
    while let Some(last) = prefix.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return true;
        }
        prefix.pop();
    }
    false
}

/// LMDB-backed store. Cheap to clone by wrapping in `Arc` at the call site;
/// the environment itself is already shared.
pub struct LmdbStore {
    env: Arc<LmdbEnvironment>,
}

impl LmdbStore {
    pub fn new(env: Arc<LmdbEnvironment>) -> Self {
        Self { env }
    }

    fn get_block_txn(
        &self,
        txn: &heed::RoTxn,
        hash: &Hash,
    ) -> Result<Option<AccountBlock>, StoreError> {
        let Some(bytes) = self
            .env
            .account_blocks_db
            .get(txn, hash.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let block = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(Some(block))
    }

    fn latest_hash_txn(
        &self,
        txn: &heed::RoTxn,
        addr: &Address,
    ) -> Result<Option<Hash>, StoreError> {
        match self
            .env
            .latest_accounts_db
            .get(txn, addr.as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(hash_from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn apply(&self, txn: &mut RwTxn, op: BatchOp) -> Result<(), StoreError> {
        match op {
            BatchOp::PutAccountBlock(block) => {
                let bytes = bincode::serialize(&block).map_err(LmdbError::from)?;
                self.env
                    .account_blocks_db
                    .put(txn, block.hash.as_bytes(), &bytes)
                    .map_err(LmdbError::from)?;
                self.env
                    .account_heights_db
                    .put(
                        txn,
                        &height_key(&block.account_address, block.height),
                        block.hash.as_bytes(),
                    )
                    .map_err(LmdbError::from)?;

                // Advance the head pointer only forward.
                let advance = match self.latest_hash_txn(txn, &block.account_address)? {
                    Some(head_hash) => match self.get_block_txn(txn, &head_hash)? {
                        Some(head) => block.height > head.height,
                        None => true,
                    },
                    None => true,
                };
                if advance {
                    self.env
                        .latest_accounts_db
                        .put(
                            txn,
                            block.account_address.as_bytes(),
                            block.hash.as_bytes(),
                        )
                        .map_err(LmdbError::from)?;
                }
            }
            BatchOp::DeleteAccountBlock(hash) => {
                let block = self
                    .get_block_txn(txn, &hash)?
                    .ok_or_else(|| StoreError::NotFound(format!("account block {hash}")))?;
                self.env
                    .account_blocks_db
                    .delete(txn, hash.as_bytes())
                    .map_err(LmdbError::from)?;
                self.env
                    .account_heights_db
                    .delete(txn, &height_key(&block.account_address, block.height))
                    .map_err(LmdbError::from)?;

                // If the deleted block was the head, the head moves to its
                // predecessor (or disappears for a height-1 block).
                if self.latest_hash_txn(txn, &block.account_address)? == Some(hash) {
                    if block.height > 1 {
                        self.env
                            .latest_accounts_db
                            .put(
                                txn,
                                block.account_address.as_bytes(),
                                block.prev_hash.as_bytes(),
                            )
                            .map_err(LmdbError::from)?;
                    } else {
                        self.env
                            .latest_accounts_db
                            .delete(txn, block.account_address.as_bytes())
                            .map_err(LmdbError::from)?;
                    }
                }
            }
            BatchOp::PutSnapshotBlock(block) => {
                let bytes = bincode::serialize(&block).map_err(LmdbError::from)?;
                self.env
                    .snapshot_blocks_db
                    .put(txn, block.hash.as_bytes(), &bytes)
                    .map_err(LmdbError::from)?;
                self.env
                    .snapshot_heights_db
                    .put(txn, &block.height.to_be_bytes(), block.hash.as_bytes())
                    .map_err(LmdbError::from)?;
            }
            BatchOp::WriteOnRoadMeta { to, send } => {
                let bytes = bincode::serialize(&send).map_err(LmdbError::from)?;
                self.env
                    .on_road_db
                    .put(txn, &on_road_key(&to, &send.hash), &bytes)
                    .map_err(LmdbError::from)?;
            }
            BatchOp::DeleteOnRoadMeta { to, send_hash } => {
                self.env
                    .on_road_db
                    .delete(txn, &on_road_key(&to, &send_hash))
                    .map_err(LmdbError::from)?;
            }
            BatchOp::WriteContractGid { gid, addr } => {
                self.env
                    .gid_index_db
                    .put(txn, &gid_key(&gid, &addr), &[])
                    .map_err(LmdbError::from)?;
                self.env
                    .contract_gids_db
                    .put(txn, addr.as_bytes(), gid.as_bytes())
                    .map_err(LmdbError::from)?;
            }
            BatchOp::DeleteContractGid { gid, addr } => {
                self.env
                    .gid_index_db
                    .delete(txn, &gid_key(&gid, &addr))
                    .map_err(LmdbError::from)?;
                self.env
                    .contract_gids_db
                    .delete(txn, addr.as_bytes())
                    .map_err(LmdbError::from)?;
            }
        }
        Ok(())
    }
}

impl Store for LmdbStore {
    fn account_type(&self, addr: &Address) -> Result<AccountType, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        if self
            .env
            .contract_gids_db
            .get(&rtxn, addr.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(AccountType::Contract);
        }
        if self
            .env
            .latest_accounts_db
            .get(&rtxn, addr.as_bytes())
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(AccountType::General);
        }
        Ok(AccountType::NotExist)
    }

    fn get_latest_account_block(
        &self,
        addr: &Address,
    ) -> Result<Option<AccountBlock>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        match self.latest_hash_txn(&rtxn, addr)? {
            Some(hash) => self.get_block_txn(&rtxn, &hash),
            None => Ok(None),
        }
    }

    fn get_account_block_by_hash(&self, hash: &Hash) -> Result<Option<AccountBlock>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        self.get_block_txn(&rtxn, hash)
    }

    fn get_account_block_by_height(
        &self,
        addr: &Address,
        height: u64,
    ) -> Result<Option<AccountBlock>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let Some(bytes) = self
            .env
            .account_heights_db
            .get(&rtxn, &height_key(addr, height))
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let hash = hash_from_slice(bytes)?;
        self.get_block_txn(&rtxn, &hash)
    }

    fn get_snapshot_block_by_hash(&self, hash: &Hash) -> Result<Option<SnapshotBlock>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let Some(bytes) = self
            .env
            .snapshot_blocks_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let block = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(Some(block))
    }

    fn get_snapshot_block_by_height(
        &self,
        height: u64,
    ) -> Result<Option<SnapshotBlock>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let Some(hash_bytes) = self
            .env
            .snapshot_heights_db
            .get(&rtxn, &height.to_be_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let hash = hash_from_slice(hash_bytes)?;
        let Some(bytes) = self
            .env
            .snapshot_blocks_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let block = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(Some(block))
    }

    fn get_latest_snapshot_block(&self) -> Result<SnapshotBlock, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let Some((_, hash_bytes)) = self
            .env
            .snapshot_heights_db
            .last(&rtxn)
            .map_err(LmdbError::from)?
        else {
            return Err(StoreError::Backend("snapshot chain has no head".into()));
        };
        let hash = hash_from_slice(hash_bytes)?;
        let bytes = self
            .env
            .snapshot_blocks_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| StoreError::Corruption("snapshot head missing body".into()))?;
        let block = bincode::deserialize(bytes).map_err(LmdbError::from)?;
        Ok(block)
    }

    fn get_contract_gid(&self, addr: &Address) -> Result<Option<Gid>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let Some(bytes) = self
            .env
            .contract_gids_db
            .get(&rtxn, addr.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        let arr: [u8; 10] = bytes
            .try_into()
            .map_err(|_| StoreError::Corruption("gid value has wrong length".into()))?;
        Ok(Some(Gid::new(arr)))
    }

    fn get_contract_addr_list_by_gid(&self, gid: &Gid) -> Result<Vec<Address>, StoreError> {
        let prefix = gid.as_bytes().as_slice();
        let mut upper = prefix.to_vec();
        let bounded = increment_prefix(&mut upper);
        let bounds = (
            Bound::Included(prefix),
            if bounded {
                Bound::Excluded(upper.as_slice())
            } else {
                Bound::Unbounded
            },
        );

        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let mut addrs = Vec::new();
        let iter = self
            .env
            .gid_index_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        for entry in iter {
            let (key, _) = entry.map_err(LmdbError::from)?;
            let arr: [u8; 21] = key[10..]
                .try_into()
                .map_err(|_| StoreError::Corruption("gid index key has wrong length".into()))?;
            addrs.push(Address::new(arr));
        }
        Ok(addrs)
    }

    fn get_all_on_road_blocks(&self, addr: &Address) -> Result<Vec<AccountBlock>, StoreError> {
        let prefix = addr.as_bytes().as_slice();
        let mut upper = prefix.to_vec();
        let bounded = increment_prefix(&mut upper);
        let bounds = (
            Bound::Included(prefix),
            if bounded {
                Bound::Excluded(upper.as_slice())
            } else {
                Bound::Unbounded
            },
        );

        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let mut blocks = Vec::new();
        let iter = self
            .env
            .on_road_db
            .range(&rtxn, &bounds)
            .map_err(LmdbError::from)?;
        for entry in iter {
            let (_, bytes) = entry.map_err(LmdbError::from)?;
            let block: AccountBlock = bincode::deserialize(bytes).map_err(LmdbError::from)?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn get_on_road_blocks(
        &self,
        index: u64,
        num: u64,
        count: u64,
        addr: &Address,
    ) -> Result<Vec<AccountBlock>, StoreError> {
        let all = self.get_all_on_road_blocks(addr)?;
        Ok(all
            .into_iter()
            .skip((index * count) as usize)
            .take((num * count) as usize)
            .collect())
    }

    fn get_common_account_info(
        &self,
        addr: &Address,
    ) -> Result<Option<CommonAccountInfo>, StoreError> {
        let blocks = self.get_all_on_road_blocks(addr)?;
        if blocks.is_empty() {
            return Ok(None);
        }
        let mut info = CommonAccountInfo::default();
        for send in &blocks {
            info.total_number += 1;
            let balance = info
                .token_balances
                .entry(send.token_id)
                .or_insert_with(TokenBalance::default);
            balance.number += 1;
            balance.total_amount = balance
                .total_amount
                .checked_add(&send.amount_or_zero())
                .ok_or_else(|| StoreError::Corruption("on-road amount overflow".into()))?;
        }
        Ok(Some(info))
    }

    fn write_batch(&self, batch: Batch) -> Result<(), StoreError> {
        let mut wtxn = self.env.env().write_txn().map_err(LmdbError::from)?;
        for op in batch.into_ops() {
            // An error drops the transaction, rolling back every prior op.
            self.apply(&mut wtxn, op)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
