//! Snippets: contiguous block fragments not yet linked to any branch.

use std::collections::BTreeMap;

use crate::error::PoolError;
use crate::tree::PoolBlock;
use trellis_types::Hash;

/// An unanchored fragment of chain. The *tail* is the position just below
/// the first block (`first.height - 1`, `first.prev_hash`); the *head* is
/// the last block.
#[derive(Clone)]
pub struct Snippet<B> {
    id: String,
    tail_height: u64,
    tail_hash: Hash,
    head_height: u64,
    head_hash: Hash,
    blocks: BTreeMap<u64, B>,
}

impl<B: PoolBlock> Snippet<B> {
    /// Start a snippet from a single block.
    pub fn new(id: impl Into<String>, block: B) -> Self {
        let mut blocks = BTreeMap::new();
        let tail_height = block.height() - 1;
        let tail_hash = block.prev_hash();
        let head_height = block.height();
        let head_hash = block.hash();
        blocks.insert(block.height(), block);
        Self {
            id: id.into(),
            tail_height,
            tail_hash,
            head_height,
            head_hash,
            blocks,
        }
    }

    /// Build a snippet from an ascending, hash-chained run of blocks.
    pub fn from_blocks(id: impl Into<String>, blocks: Vec<B>) -> Result<Self, PoolError> {
        let mut iter = blocks.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| PoolError::InvalidBranch("empty snippet".into()))?;
        let mut snippet = Self::new(id, first);
        for block in iter {
            snippet.push_head(block)?;
        }
        Ok(snippet)
    }

    /// Extend the snippet upward by one block.
    pub fn push_head(&mut self, block: B) -> Result<(), PoolError> {
        if block.prev_hash() != self.head_hash || block.height() != self.head_height + 1 {
            return Err(PoolError::HeadMismatch(format!(
                "snippet {} head is ({}, {}), block is ({}, prev {})",
                self.id,
                self.head_height,
                self.head_hash,
                block.height(),
                block.prev_hash()
            )));
        }
        self.head_height = block.height();
        self.head_hash = block.hash();
        self.blocks.insert(block.height(), block);
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tail_hh(&self) -> (u64, Hash) {
        (self.tail_height, self.tail_hash)
    }

    pub fn head_hh(&self) -> (u64, Hash) {
        (self.head_height, self.head_hash)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in ascending height order.
    pub fn blocks_ascending(&self) -> impl Iterator<Item = &B> {
        self.blocks.values()
    }

    pub fn into_blocks(self) -> Vec<B> {
        self.blocks.into_values().collect()
    }
}
