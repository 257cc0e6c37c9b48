//! Cache entries for the two on-road tiers.

use std::time::Instant;
use trellis_ledger::AccountBlock;
use trellis_store::CommonAccountInfo;

/// Aggregate tier: the per-address [`CommonAccountInfo`] plus its eviction
/// deadline. The deadline is re-armed on every touch; the sweeper checks it
/// before deleting, so a re-armed entry is never stale-deleted.
#[derive(Debug)]
pub struct SimpleCacheEntry {
    pub info: CommonAccountInfo,
    pub deadline: Instant,
}

/// Full tier: the ordered list of an address's on-road sends, a replayable
/// read cursor and a reference count.
///
/// The sequence is fixed while the entry is held (acquired but not yet
/// released); a committed ledger write rebuilds it from the store instead
/// of splicing in place.
#[derive(Debug)]
pub struct FullCacheEntry {
    pub blocks: Vec<AccountBlock>,
    pub cursor: usize,
    pub ref_count: u32,
    /// Armed when `ref_count` drops to zero; disarmed on acquire.
    pub deadline: Option<Instant>,
}

impl FullCacheEntry {
    pub fn new(blocks: Vec<AccountBlock>) -> Self {
        Self {
            blocks,
            cursor: 0,
            ref_count: 1,
            deadline: None,
        }
    }

    /// The block under the cursor, advancing it. `None` at the end.
    pub fn next_tx(&mut self) -> Option<AccountBlock> {
        let block = self.blocks.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(block)
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_ledger::BlockKind;
    use trellis_types::{Address, Amount, Hash, Timestamp, TokenId};

    fn block(tag: u8) -> AccountBlock {
        AccountBlock {
            kind: BlockKind::SendCall,
            account_address: Address::from_parts([1u8; 20], 0),
            to_address: Address::from_parts([2u8; 20], 0),
            height: 1,
            prev_hash: Hash::ZERO,
            from_block_hash: Hash::ZERO,
            snapshot_hash: Hash::ZERO,
            amount: Some(Amount::from_u64(1)),
            fee: None,
            token_id: TokenId::new([1u8; 10]),
            data: Vec::new(),
            nonce: None,
            difficulty: None,
            quota_used: 0,
            timestamp: Some(Timestamp::new(1)),
            signature: Vec::new(),
            public_key: Vec::new(),
            hash: Hash::new([tag; 32]),
        }
    }

    #[test]
    fn cursor_walks_to_end_then_none() {
        let mut entry = FullCacheEntry::new(vec![block(1), block(2)]);
        assert_eq!(entry.next_tx().unwrap().hash, Hash::new([1u8; 32]));
        assert_eq!(entry.next_tx().unwrap().hash, Hash::new([2u8; 32]));
        assert!(entry.next_tx().is_none());
        assert!(entry.next_tx().is_none());
    }

    #[test]
    fn reset_rewinds_to_front() {
        let mut entry = FullCacheEntry::new(vec![block(1), block(2)]);
        entry.next_tx();
        entry.next_tx();
        entry.reset_cursor();
        assert_eq!(entry.next_tx().unwrap().hash, Hash::new([1u8; 32]));
    }
}
