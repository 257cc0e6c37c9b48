//! In-memory chunk assembly with hash-chain enforcement.

use crate::error::SyncError;
use trellis_ledger::{AccountBlock, SnapshotBlock};
use trellis_types::Hash;

/// A chunk being assembled by the downloader for the range
/// `(start_height, end_height]`.
///
/// Snapshot blocks must arrive in height order and chain by hash; this is
/// what preserves the chain-of-hashes property across downloaded batches.
pub struct Chunk {
    prev_hash: Hash,
    start_height: u64,
    end_hash: Hash,
    end_height: u64,
    snapshot_blocks: Vec<SnapshotBlock>,
    account_blocks: Vec<AccountBlock>,
}

impl Chunk {
    pub fn new(prev_hash: Hash, start_height: u64, end_hash: Hash, end_height: u64) -> Self {
        Self {
            prev_hash,
            start_height,
            end_hash,
            end_height,
            snapshot_blocks: Vec::new(),
            account_blocks: Vec::new(),
        }
    }

    /// Append the next snapshot block. The block must sit at the expected
    /// height and extend the hash chain.
    pub fn add_snapshot_block(&mut self, block: SnapshotBlock) -> Result<(), SyncError> {
        let expected_height = self.start_height + self.snapshot_blocks.len() as u64 + 1;
        let expected_prev = self
            .snapshot_blocks
            .last()
            .map(|b| b.hash)
            .unwrap_or(self.prev_hash);

        if block.height != expected_height {
            return Err(SyncError::ChunkMismatch(format!(
                "expected height {expected_height}, got {}",
                block.height
            )));
        }
        if block.height > self.end_height {
            return Err(SyncError::ChunkMismatch(format!(
                "height {} beyond chunk end {}",
                block.height, self.end_height
            )));
        }
        if block.prev_hash != expected_prev {
            return Err(SyncError::ChunkMismatch(format!(
                "expected prev hash {expected_prev}, got {}",
                block.prev_hash
            )));
        }
        if block.height == self.end_height
            && !self.end_hash.is_zero()
            && block.hash != self.end_hash
        {
            return Err(SyncError::ChunkMismatch(format!(
                "end hash {} does not close the chunk ({})",
                block.hash, self.end_hash
            )));
        }
        self.snapshot_blocks.push(block);
        Ok(())
    }

    /// Account blocks ride along with the snapshot segment unordered.
    pub fn add_account_block(&mut self, block: AccountBlock) {
        self.account_blocks.push(block);
    }

    /// Whether the snapshot range has been fully assembled.
    pub fn is_complete(&self) -> bool {
        self.snapshot_blocks
            .last()
            .map(|b| b.height == self.end_height)
            .unwrap_or(self.start_height == self.end_height)
    }

    pub fn snapshot_blocks(&self) -> &[SnapshotBlock] {
        &self.snapshot_blocks
    }

    pub fn account_blocks(&self) -> &[AccountBlock] {
        &self.account_blocks
    }
}
