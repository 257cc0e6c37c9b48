//! The on-road pool.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::cache::{FullCacheEntry, SimpleCacheEntry};
use crate::error::OnRoadError;
use trellis_ledger::{AccountBlock, BlockKind, VmAccountBlock};
use trellis_store::{Batch, BatchOp, CommonAccountInfo, Store, TokenBalance};
use trellis_types::{Address, Gid, Hash, FULL_CACHE_EXPIRE, SIMPLE_CACHE_EXPIRE};

type Listener = Box<dyn Fn() + Send + Sync>;

/// A reverted block together with its reorg `ignore` mark.
struct SignBlock<'a> {
    block: &'a AccountBlock,
    /// Set when this receive's matching send is reverted in the same
    /// sub-ledger — the on-road entry must not be resurrected.
    ignore: bool,
}

/// Address-keyed materialised view of the unreceived sends targeting each
/// account, backed by the [`Store`] and cached at two tiers.
///
/// All write operations go through a caller-supplied [`Batch`] so the
/// on-road update commits atomically with the ledger update. Cache updates
/// are applied only after the batch has committed.
pub struct OnRoadPool {
    store: Arc<dyn Store>,

    simple_cache: RwLock<HashMap<Address, SimpleCacheEntry>>,
    full_cache: RwLock<HashMap<Address, FullCacheEntry>>,

    common_tx_listeners: RwLock<HashMap<Address, Listener>>,
    contract_listeners: RwLock<HashMap<Gid, Listener>>,
}

impl OnRoadPool {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            simple_cache: RwLock::new(HashMap::new()),
            full_cache: RwLock::new(HashMap::new()),
            common_tx_listeners: RwLock::new(HashMap::new()),
            contract_listeners: RwLock::new(HashMap::new()),
        }
    }

    // ── Aggregate tier ──────────────────────────────────────────────────

    /// The aggregate over an address's on-road queue. A cache hit re-arms
    /// the entry's expiry; a miss loads from the store and installs an
    /// entry.
    pub fn get_common_account_info(
        &self,
        addr: &Address,
    ) -> Result<Option<CommonAccountInfo>, OnRoadError> {
        let now = Instant::now();
        {
            let mut cache = self.simple_cache.write().unwrap();
            if let Some(entry) = cache.get_mut(addr) {
                entry.deadline = now + SIMPLE_CACHE_EXPIRE;
                return Ok(Some(entry.info.clone()));
            }
        }

        let Some(info) = self.store.get_common_account_info(addr)? else {
            return Ok(None);
        };
        tracing::debug!(%addr, total = info.total_number, "installing simple cache entry");
        self.simple_cache.write().unwrap().insert(
            *addr,
            SimpleCacheEntry {
                info: info.clone(),
                deadline: now + SIMPLE_CACHE_EXPIRE,
            },
        );
        Ok(Some(info))
    }

    // ── Full tier ───────────────────────────────────────────────────────

    /// Pin the full on-road list of an address in memory. Pairs with
    /// [`release_account_info_cache`](Self::release_account_info_cache);
    /// acquisitions must be released even on error paths.
    pub fn acquire_account_info_cache(&self, addr: &Address) -> Result<(), OnRoadError> {
        let mut cache = self.full_cache.write().unwrap();
        if let Some(entry) = cache.get_mut(addr) {
            entry.deadline = None;
            entry.ref_count += 1;
            tracing::debug!(%addr, refs = entry.ref_count, "full cache hit");
            return Ok(());
        }
        drop(cache);

        let blocks = self.store.get_all_on_road_blocks(addr)?;
        tracing::debug!(%addr, len = blocks.len(), "full cache loaded from store");
        let mut cache = self.full_cache.write().unwrap();
        // Another thread may have raced the load; count its users.
        if let Some(entry) = cache.get_mut(addr) {
            entry.deadline = None;
            entry.ref_count += 1;
        } else {
            cache.insert(*addr, FullCacheEntry::new(blocks));
        }
        Ok(())
    }

    /// Drop one reference to the full entry. At zero the cursor rewinds and
    /// the entry is armed to expire after [`FULL_CACHE_EXPIRE`].
    pub fn release_account_info_cache(&self, addr: &Address) {
        let mut cache = self.full_cache.write().unwrap();
        let Some(entry) = cache.get_mut(addr) else {
            return;
        };
        entry.ref_count = entry.ref_count.saturating_sub(1);
        if entry.ref_count == 0 {
            entry.reset_cursor();
            entry.deadline = Some(Instant::now() + FULL_CACHE_EXPIRE);
        }
    }

    /// Advance the cursor of the pinned entry, returning `None` at the end
    /// (or when nothing is pinned).
    pub fn get_next_tx(&self, addr: &Address) -> Option<AccountBlock> {
        self.full_cache.write().unwrap().get_mut(addr)?.next_tx()
    }

    /// Rewind the pinned entry's cursor to the front.
    pub fn reset_cache_cursor(&self, addr: &Address) {
        if let Some(entry) = self.full_cache.write().unwrap().get_mut(addr) {
            entry.reset_cursor();
        }
    }

    // ── Expiry ──────────────────────────────────────────────────────────

    /// Evict expired entries from both tiers. Returns
    /// `(simple_evicted, full_evicted)`.
    pub fn sweep(&self, now: Instant) -> (usize, usize) {
        let mut simple_evicted = 0;
        {
            let mut cache = self.simple_cache.write().unwrap();
            cache.retain(|addr, entry| {
                let keep = entry.deadline > now;
                if !keep {
                    tracing::debug!(%addr, "simple cache entry expired");
                    simple_evicted += 1;
                }
                keep
            });
        }

        let mut full_evicted = 0;
        {
            let mut cache = self.full_cache.write().unwrap();
            cache.retain(|addr, entry| {
                let expired =
                    entry.ref_count == 0 && entry.deadline.map(|d| d <= now).unwrap_or(false);
                if expired {
                    tracing::debug!(%addr, "full cache entry expired");
                    full_evicted += 1;
                }
                !expired
            });
        }
        (simple_evicted, full_evicted)
    }

    /// Run [`sweep`](Self::sweep) periodically until shutdown.
    pub fn spawn_evictor(
        self: &Arc<Self>,
        period: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = interval.tick() => {
                        pool.sweep(Instant::now());
                    }
                }
            }
        })
    }

    // ── Ledger-coupled writes ───────────────────────────────────────────

    /// Stage the on-road effects of newly written blocks into `batch`.
    ///
    /// Sends create an entry under their recipient; a `SendCreate`
    /// additionally registers every `(gid, address)` pair the VM emitted.
    /// Receives delete the entry of their consumed send.
    pub fn write_on_road(
        &self,
        batch: &mut Batch,
        blocks: &[VmAccountBlock],
    ) -> Result<(), OnRoadError> {
        for vm_block in blocks {
            let block = &vm_block.block;
            if block.is_send() {
                batch.push(BatchOp::WriteOnRoadMeta {
                    to: block.to_address,
                    send: block.clone(),
                });
                if block.kind == BlockKind::SendCreate {
                    for (gid, addr) in &vm_block.created_contracts {
                        batch.push(BatchOp::WriteContractGid {
                            gid: *gid,
                            addr: *addr,
                        });
                    }
                }
            } else {
                batch.push(BatchOp::DeleteOnRoadMeta {
                    to: block.account_address,
                    send_hash: block.from_block_hash,
                });
            }
        }
        Ok(())
    }

    /// Stage the revert of a sub-ledger into `batch`.
    ///
    /// `sub_ledger` maps each address to its reverted blocks in ascending
    /// height order; each list is processed in descending order. Reverting
    /// a receive re-materialises its send on-road — unless that send is
    /// itself reverted in the same sub-ledger (the `ignore` rule), in which
    /// case resurrecting the entry would leak a message that never existed.
    pub fn delete_on_road(
        &self,
        batch: &mut Batch,
        sub_ledger: &HashMap<Address, Vec<AccountBlock>>,
    ) -> Result<(), OnRoadError> {
        let reverted_sends: HashSet<Hash> = sub_ledger
            .values()
            .flatten()
            .filter(|b| b.is_send())
            .map(|b| b.hash)
            .collect();

        let sign_ledger: Vec<Vec<SignBlock>> = sub_ledger
            .values()
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|block| SignBlock {
                        block,
                        ignore: block.is_receive()
                            && reverted_sends.contains(&block.from_block_hash),
                    })
                    .collect()
            })
            .collect();

        for block_list in &sign_ledger {
            for i in (0..block_list.len()).rev() {
                let signed = &block_list[i];
                let block = signed.block;

                if block.is_receive() {
                    if signed.ignore {
                        continue;
                    }
                    let send = self
                        .store
                        .get_account_block_by_hash(&block.from_block_hash)?
                        .ok_or(OnRoadError::MissingSend(block.from_block_hash))?;
                    batch.push(BatchOp::WriteOnRoadMeta {
                        to: send.to_address,
                        send,
                    });
                } else {
                    batch.push(BatchOp::DeleteOnRoadMeta {
                        to: block.to_address,
                        send_hash: block.hash,
                    });
                    if block.kind == BlockKind::SendCreate {
                        if let Some(gid) = block.created_gid() {
                            batch.push(BatchOp::DeleteContractGid {
                                gid,
                                addr: block.to_address,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Delete a single on-road entry immediately, outside any reorg.
    pub fn delete_direct(&self, send: &AccountBlock) -> Result<(), OnRoadError> {
        let mut batch = Batch::new();
        batch.push(BatchOp::DeleteOnRoadMeta {
            to: send.to_address,
            send_hash: send.hash,
        });
        self.store.write_batch(batch)?;
        Ok(())
    }

    // ── Post-commit cache maintenance ───────────────────────────────────

    /// Fold a committed ledger write into the caches.
    ///
    /// `send` is always the send side of the transfer — on a committed
    /// receive, the caller passes the consumed send. `write` is `true` for
    /// a new send entering on-road, `false` for a consumed one. A
    /// `Conflict` means the aggregate disagreed with the write; the entry
    /// is invalidated and the next read reloads from the store.
    pub fn update_cache(&self, write: bool, send: &AccountBlock) -> Result<(), OnRoadError> {
        self.update_full_cache(send)?;
        self.update_simple_cache(write, send)
    }

    fn update_full_cache(&self, send: &AccountBlock) -> Result<(), OnRoadError> {
        let mut cache = self.full_cache.write().unwrap();
        let Some(entry) = cache.get_mut(&send.to_address) else {
            return Ok(());
        };
        // The sequence is immutable while held; rebuild it from the
        // committed store state instead of splicing.
        entry.blocks = self.store.get_all_on_road_blocks(&send.to_address)?;
        if entry.cursor > entry.blocks.len() {
            entry.cursor = entry.blocks.len();
        }
        Ok(())
    }

    fn update_simple_cache(&self, write: bool, send: &AccountBlock) -> Result<(), OnRoadError> {
        let mut cache = self.simple_cache.write().unwrap();
        let Some(entry) = cache.get_mut(&send.to_address) else {
            return Ok(());
        };

        let amount = send.amount_or_zero();
        if write {
            let balance = entry
                .info
                .token_balances
                .entry(send.token_id)
                .or_insert_with(TokenBalance::default);
            match balance.total_amount.checked_add(&amount) {
                Some(total) => balance.total_amount = total,
                None => {
                    cache.remove(&send.to_address);
                    return Err(OnRoadError::Conflict("aggregate amount overflow".into()));
                }
            }
            balance.number += 1;
            entry.info.total_number += 1;
        } else {
            let Some(balance) = entry.info.token_balances.get_mut(&send.token_id) else {
                cache.remove(&send.to_address);
                return Err(OnRoadError::Conflict(
                    "receive for a token the aggregate does not know".into(),
                ));
            };
            if balance.total_amount < amount {
                cache.remove(&send.to_address);
                return Err(OnRoadError::Conflict(
                    "receive amount exceeds aggregate balance".into(),
                ));
            }
            if balance.total_amount == amount {
                entry.info.token_balances.remove(&send.token_id);
            } else {
                balance.total_amount = balance
                    .total_amount
                    .checked_sub(&amount)
                    .unwrap_or_default();
                balance.number = balance.number.saturating_sub(1);
            }
            entry.info.total_number = entry.info.total_number.saturating_sub(1);
        }
        Ok(())
    }

    /// Throw away cached state for an address after a reorg. A held full
    /// entry is rebuilt from the store instead of dropped.
    pub fn invalidate_cache(&self, addr: &Address) {
        self.simple_cache.write().unwrap().remove(addr);

        let mut cache = self.full_cache.write().unwrap();
        let Some(held) = cache.get(addr).map(|e| e.ref_count > 0) else {
            return;
        };
        if !held {
            cache.remove(addr);
            return;
        }
        match self.store.get_all_on_road_blocks(addr) {
            Ok(blocks) => {
                if let Some(entry) = cache.get_mut(addr) {
                    entry.blocks = blocks;
                    if entry.cursor > entry.blocks.len() {
                        entry.cursor = entry.blocks.len();
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%addr, %err, "full cache rebuild failed, dropping entry");
                cache.remove(addr);
            }
        }
    }

    // ── Listeners ───────────────────────────────────────────────────────

    /// Wake the worker responsible for a freshly committed send: the
    /// contract-group listener when the signalling account belongs to a
    /// group, otherwise the recipient's common-tx listener.
    ///
    /// Listener invocation holds the read lock, so listeners must not call
    /// back into the listener registry.
    pub fn new_signal_to_worker(&self, block: &AccountBlock) -> Result<(), OnRoadError> {
        let gid = self.store.get_contract_gid(&block.account_address)?;
        if let Some(gid) = gid {
            let listeners = self.contract_listeners.read().unwrap();
            if let Some(listener) = listeners.get(&gid) {
                listener();
            }
        } else {
            let listeners = self.common_tx_listeners.read().unwrap();
            if let Some(listener) = listeners.get(&block.to_address) {
                listener();
            }
        }
        Ok(())
    }

    pub fn add_common_tx_lis(&self, addr: Address, listener: impl Fn() + Send + Sync + 'static) {
        self.common_tx_listeners
            .write()
            .unwrap()
            .insert(addr, Box::new(listener));
    }

    pub fn remove_common_tx_lis(&self, addr: &Address) {
        self.common_tx_listeners.write().unwrap().remove(addr);
    }

    pub fn add_contract_lis(&self, gid: Gid, listener: impl Fn() + Send + Sync + 'static) {
        self.contract_listeners
            .write()
            .unwrap()
            .insert(gid, Box::new(listener));
    }

    pub fn remove_contract_lis(&self, gid: &Gid) {
        self.contract_listeners.write().unwrap().remove(gid);
    }

    // ── Store pass-throughs ─────────────────────────────────────────────

    pub fn addr_list_by_gid(&self, gid: &Gid) -> Result<Vec<Address>, OnRoadError> {
        Ok(self.store.get_contract_addr_list_by_gid(gid)?)
    }

    pub fn get_on_road_blocks(
        &self,
        index: u64,
        num: u64,
        count: u64,
        addr: &Address,
    ) -> Result<Vec<AccountBlock>, OnRoadError> {
        Ok(self.store.get_on_road_blocks(index, num, count, addr)?)
    }
}
