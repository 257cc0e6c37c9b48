//! In-memory store — thread-safe reference backend for testing.
//!
//! All state sits behind a single mutex. A batch commit stages its
//! operations on a copy of the state and swaps it in only when every
//! operation succeeded, matching the all-or-nothing contract of the LMDB
//! backend.

use crate::account_info::{CommonAccountInfo, TokenBalance};
use crate::batch::{Batch, BatchOp};
use crate::error::StoreError;
use crate::store::Store;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;
use trellis_ledger::{AccountBlock, AccountType, SnapshotBlock};
use trellis_types::{Address, Gid, Hash};

#[derive(Clone, Default)]
struct MemInner {
    /// Account blocks by hash.
    blocks: HashMap<Hash, AccountBlock>,
    /// Per-account chains, hashes in ascending height order.
    chains: HashMap<Address, Vec<Hash>>,
    /// Snapshot blocks by hash.
    snapshots: HashMap<Hash, SnapshotBlock>,
    /// Snapshot hashes by height; the last entry is the head.
    snapshot_heights: BTreeMap<u64, Hash>,
    /// On-road metadata: recipient → send hash → send block.
    on_road: HashMap<Address, BTreeMap<Hash, AccountBlock>>,
    /// Contract addresses per group.
    gid_index: HashMap<Gid, BTreeSet<Address>>,
    /// Reverse of `gid_index`: contract address → its group.
    contract_gids: HashMap<Address, Gid>,
}

/// An in-memory [`Store`] for tests and reference semantics.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account block directly (outside any batch).
    pub fn put_account_block(&self, block: AccountBlock) {
        let mut inner = self.inner.lock().unwrap();
        Self::apply_put_account_block(&mut inner, block);
    }

    /// Seed a snapshot block directly (outside any batch).
    pub fn put_snapshot_block(&self, block: SnapshotBlock) {
        let mut inner = self.inner.lock().unwrap();
        inner.snapshot_heights.insert(block.height, block.hash);
        inner.snapshots.insert(block.hash, block);
    }

    /// Seed a contract registration directly (outside any batch).
    pub fn register_contract(&self, gid: Gid, addr: Address) {
        let mut inner = self.inner.lock().unwrap();
        inner.gid_index.entry(gid).or_default().insert(addr);
        inner.contract_gids.insert(addr, gid);
    }

    /// Number of on-road entries for an address.
    pub fn on_road_count(&self, addr: &Address) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.on_road.get(addr).map(|m| m.len()).unwrap_or(0)
    }

    /// Whether an on-road entry exists for `(addr, send_hash)`.
    pub fn has_on_road(&self, addr: &Address, send_hash: &Hash) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .on_road
            .get(addr)
            .map(|m| m.contains_key(send_hash))
            .unwrap_or(false)
    }

    fn apply_put_account_block(inner: &mut MemInner, block: AccountBlock) {
        // Keep the chain sorted by height; blocks normally arrive in order.
        let pos = match inner.chains.get(&block.account_address) {
            Some(chain) => {
                let mut pos = chain.len();
                for (i, hash) in chain.iter().enumerate() {
                    if let Some(existing) = inner.blocks.get(hash) {
                        if existing.height > block.height {
                            pos = i;
                            break;
                        }
                    }
                }
                pos
            }
            None => 0,
        };
        inner
            .chains
            .entry(block.account_address)
            .or_default()
            .insert(pos, block.hash);
        inner.blocks.insert(block.hash, block);
    }

    fn apply_delete_account_block(inner: &mut MemInner, hash: &Hash) -> Result<(), StoreError> {
        let block = inner
            .blocks
            .remove(hash)
            .ok_or_else(|| StoreError::NotFound(format!("account block {hash}")))?;
        if let Some(chain) = inner.chains.get_mut(&block.account_address) {
            chain.retain(|h| h != hash);
            if chain.is_empty() {
                inner.chains.remove(&block.account_address);
            }
        }
        Ok(())
    }

    fn apply(inner: &mut MemInner, op: BatchOp) -> Result<(), StoreError> {
        match op {
            BatchOp::PutAccountBlock(block) => Self::apply_put_account_block(inner, block),
            BatchOp::DeleteAccountBlock(hash) => Self::apply_delete_account_block(inner, &hash)?,
            BatchOp::PutSnapshotBlock(block) => {
                inner.snapshot_heights.insert(block.height, block.hash);
                inner.snapshots.insert(block.hash, block);
            }
            BatchOp::WriteOnRoadMeta { to, send } => {
                inner.on_road.entry(to).or_default().insert(send.hash, send);
            }
            BatchOp::DeleteOnRoadMeta { to, send_hash } => {
                if let Some(entries) = inner.on_road.get_mut(&to) {
                    entries.remove(&send_hash);
                    if entries.is_empty() {
                        inner.on_road.remove(&to);
                    }
                }
            }
            BatchOp::WriteContractGid { gid, addr } => {
                inner.gid_index.entry(gid).or_default().insert(addr);
                inner.contract_gids.insert(addr, gid);
            }
            BatchOp::DeleteContractGid { gid, addr } => {
                if let Some(addrs) = inner.gid_index.get_mut(&gid) {
                    addrs.remove(&addr);
                    if addrs.is_empty() {
                        inner.gid_index.remove(&gid);
                    }
                }
                inner.contract_gids.remove(&addr);
            }
        }
        Ok(())
    }
}

impl Store for MemStore {
    fn account_type(&self, addr: &Address) -> Result<AccountType, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.contract_gids.contains_key(addr) {
            Ok(AccountType::Contract)
        } else if inner.chains.contains_key(addr) {
            Ok(AccountType::General)
        } else {
            Ok(AccountType::NotExist)
        }
    }

    fn get_latest_account_block(
        &self,
        addr: &Address,
    ) -> Result<Option<AccountBlock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .chains
            .get(addr)
            .and_then(|chain| chain.last())
            .and_then(|hash| inner.blocks.get(hash))
            .cloned())
    }

    fn get_account_block_by_hash(&self, hash: &Hash) -> Result<Option<AccountBlock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.blocks.get(hash).cloned())
    }

    fn get_account_block_by_height(
        &self,
        addr: &Address,
        height: u64,
    ) -> Result<Option<AccountBlock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let Some(chain) = inner.chains.get(addr) else {
            return Ok(None);
        };
        Ok(chain
            .iter()
            .filter_map(|h| inner.blocks.get(h))
            .find(|b| b.height == height)
            .cloned())
    }

    fn get_snapshot_block_by_hash(&self, hash: &Hash) -> Result<Option<SnapshotBlock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.snapshots.get(hash).cloned())
    }

    fn get_snapshot_block_by_height(
        &self,
        height: u64,
    ) -> Result<Option<SnapshotBlock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .snapshot_heights
            .get(&height)
            .and_then(|hash| inner.snapshots.get(hash))
            .cloned())
    }

    fn get_latest_snapshot_block(&self) -> Result<SnapshotBlock, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .snapshot_heights
            .last_key_value()
            .and_then(|(_, hash)| inner.snapshots.get(hash))
            .cloned()
            .ok_or_else(|| StoreError::Backend("snapshot chain has no head".into()))
    }

    fn get_contract_gid(&self, addr: &Address) -> Result<Option<Gid>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.contract_gids.get(addr).copied())
    }

    fn get_contract_addr_list_by_gid(&self, gid: &Gid) -> Result<Vec<Address>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .gid_index
            .get(gid)
            .map(|addrs| addrs.iter().copied().collect())
            .unwrap_or_default())
    }

    fn get_all_on_road_blocks(&self, addr: &Address) -> Result<Vec<AccountBlock>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .on_road
            .get(addr)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
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
        let inner = self.inner.lock().unwrap();
        let Some(entries) = inner.on_road.get(addr) else {
            return Ok(None);
        };
        let mut info = CommonAccountInfo::default();
        for send in entries.values() {
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
        let mut inner = self.inner.lock().unwrap();
        let mut staged = inner.clone();
        for op in batch.into_ops() {
            Self::apply(&mut staged, op)?;
        }
        *inner = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_ledger::BlockKind;
    use trellis_types::{Amount, Timestamp, TokenId};

    fn addr(tag: u8) -> Address {
        Address::from_parts([tag; 20], 0)
    }

    fn send_block(from: u8, to: u8, height: u64, amount: u64, hash_tag: u8) -> AccountBlock {
        let mut block = AccountBlock {
            kind: BlockKind::SendCall,
            account_address: addr(from),
            to_address: addr(to),
            height,
            prev_hash: Hash::ZERO,
            from_block_hash: Hash::ZERO,
            snapshot_hash: Hash::ZERO,
            amount: Some(Amount::from_u64(amount)),
            fee: None,
            token_id: TokenId::new([1u8; 10]),
            data: Vec::new(),
            nonce: None,
            difficulty: None,
            quota_used: 0,
            timestamp: Some(Timestamp::new(1)),
            signature: Vec::new(),
            public_key: Vec::new(),
            hash: Hash::new([hash_tag; 32]),
        };
        block.prev_hash = if height == 1 {
            Hash::ZERO
        } else {
            Hash::new([hash_tag.wrapping_sub(1); 32])
        };
        block
    }

    #[test]
    fn batch_commit_is_all_or_nothing() {
        let store = MemStore::new();
        let send = send_block(1, 2, 1, 10, 0xAA);

        let mut batch = Batch::new();
        batch.push(BatchOp::PutAccountBlock(send.clone()));
        batch.push(BatchOp::WriteOnRoadMeta {
            to: send.to_address,
            send: send.clone(),
        });
        // A delete of a block that was never written fails the whole batch.
        batch.push(BatchOp::DeleteAccountBlock(Hash::new([0xEE; 32])));

        assert!(store.write_batch(batch).is_err());
        // Nothing from the failed batch is visible.
        assert!(store
            .get_account_block_by_hash(&send.hash)
            .unwrap()
            .is_none());
        assert!(!store.has_on_road(&send.to_address, &send.hash));
    }

    #[test]
    fn latest_account_block_follows_height() {
        let store = MemStore::new();
        store.put_account_block(send_block(1, 2, 1, 10, 0x01));
        store.put_account_block(send_block(1, 2, 2, 10, 0x02));

        let latest = store.get_latest_account_block(&addr(1)).unwrap().unwrap();
        assert_eq!(latest.height, 2);
        let by_height = store
            .get_account_block_by_height(&addr(1), 1)
            .unwrap()
            .unwrap();
        assert_eq!(by_height.height, 1);
    }

    #[test]
    fn on_road_aggregate() {
        let store = MemStore::new();
        let s1 = send_block(1, 2, 1, 10, 0x01);
        let s2 = send_block(3, 2, 1, 5, 0x02);

        let mut batch = Batch::new();
        batch.push(BatchOp::WriteOnRoadMeta {
            to: addr(2),
            send: s1,
        });
        batch.push(BatchOp::WriteOnRoadMeta {
            to: addr(2),
            send: s2,
        });
        store.write_batch(batch).unwrap();

        let info = store.get_common_account_info(&addr(2)).unwrap().unwrap();
        assert_eq!(info.total_number, 2);
        let balance = &info.token_balances[&TokenId::new([1u8; 10])];
        assert_eq!(balance.number, 2);
        assert_eq!(balance.total_amount, Amount::from_u64(15));
    }

    #[test]
    fn delete_on_road_removes_entry() {
        let store = MemStore::new();
        let send = send_block(1, 2, 1, 10, 0x01);
        let send_hash = send.hash;

        let mut batch = Batch::new();
        batch.push(BatchOp::WriteOnRoadMeta {
            to: addr(2),
            send,
        });
        store.write_batch(batch).unwrap();
        assert!(store.has_on_road(&addr(2), &send_hash));

        let mut batch = Batch::new();
        batch.push(BatchOp::DeleteOnRoadMeta {
            to: addr(2),
            send_hash,
        });
        store.write_batch(batch).unwrap();
        assert!(!store.has_on_road(&addr(2), &send_hash));
        assert!(store.get_common_account_info(&addr(2)).unwrap().is_none());
    }

    #[test]
    fn contract_registration_round_trip() {
        let store = MemStore::new();
        let gid = Gid::new([9u8; 10]);
        let contract = Address::from_parts([7u8; 20], 1);

        let mut batch = Batch::new();
        batch.push(BatchOp::WriteContractGid {
            gid,
            addr: contract,
        });
        store.write_batch(batch).unwrap();

        assert_eq!(store.get_contract_gid(&contract).unwrap(), Some(gid));
        assert_eq!(store.account_type(&contract).unwrap(), AccountType::Contract);
        assert_eq!(
            store.get_contract_addr_list_by_gid(&gid).unwrap(),
            vec![contract]
        );

        let mut batch = Batch::new();
        batch.push(BatchOp::DeleteContractGid {
            gid,
            addr: contract,
        });
        store.write_batch(batch).unwrap();
        assert_eq!(store.get_contract_gid(&contract).unwrap(), None);
    }

    #[test]
    fn on_road_paging() {
        let store = MemStore::new();
        let mut batch = Batch::new();
        for i in 0..10u8 {
            batch.push(BatchOp::WriteOnRoadMeta {
                to: addr(2),
                send: send_block(1, 2, 1, 1, i + 1),
            });
        }
        store.write_batch(batch).unwrap();

        let page = store.get_on_road_blocks(1, 1, 3, &addr(2)).unwrap();
        assert_eq!(page.len(), 3);
        let tail = store.get_on_road_blocks(3, 1, 3, &addr(2)).unwrap();
        assert_eq!(tail.len(), 1);
    }

    #[test]
    fn snapshot_head_tracks_height() {
        let store = MemStore::new();
        store.put_snapshot_block(SnapshotBlock {
            height: 1,
            hash: Hash::new([1u8; 32]),
            prev_hash: Hash::ZERO,
            timestamp: Timestamp::new(1),
        });
        store.put_snapshot_block(SnapshotBlock {
            height: 2,
            hash: Hash::new([2u8; 32]),
            prev_hash: Hash::new([1u8; 32]),
            timestamp: Timestamp::new(2),
        });

        assert_eq!(store.get_latest_snapshot_block().unwrap().height, 2);
        assert_eq!(
            store
                .get_snapshot_block_by_height(1)
                .unwrap()
                .unwrap()
                .hash,
            Hash::new([1u8; 32])
        );
    }
}
