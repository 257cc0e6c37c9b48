//! Test doubles: a minimal block and an in-memory disk root.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::error::PoolError;
use crate::tree::{DiskRoot, PoolBlock};
use trellis_types::Hash;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MockBlock {
    pub height: u64,
    pub hash: Hash,
    pub prev: Hash,
}

impl PoolBlock for MockBlock {
    fn height(&self) -> u64 {
        self.height
    }

    fn hash(&self) -> Hash {
        self.hash
    }

    fn prev_hash(&self) -> Hash {
        self.prev
    }
}

/// A deterministic per-flag hash so forks of the same height differ.
pub fn mock_hash(flag: u8, height: u64) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[0] = flag;
    bytes[1..9].copy_from_slice(&height.to_be_bytes());
    Hash::new(bytes)
}

/// A hash-chained run `from..=to` on top of `prev`.
pub fn mock_chain(flag: u8, from: u64, to: u64, mut prev: Hash) -> Vec<MockBlock> {
    let mut blocks = Vec::new();
    for height in from..=to {
        let hash = mock_hash(flag, height);
        blocks.push(MockBlock {
            height,
            hash,
            prev,
        });
        prev = hash;
    }
    blocks
}

/// In-memory disk root starting at `(0, Hash::ZERO)`.
pub struct MockRoot {
    inner: Mutex<MockRootInner>,
}

struct MockRootInner {
    blocks: BTreeMap<u64, MockBlock>,
    head: (u64, Hash),
}

impl MockRoot {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(MockRootInner {
                blocks: BTreeMap::new(),
                head: (0, Hash::ZERO),
            }),
        })
    }

    /// A root pre-seeded with the chain `1..=height` under `flag`.
    pub fn with_chain(flag: u8, height: u64) -> Arc<Self> {
        let root = Self::new();
        root.append(mock_chain(flag, 1, height, Hash::ZERO)).unwrap();
        root
    }
}

impl DiskRoot<MockBlock> for MockRoot {
    fn head_hh(&self) -> Result<(u64, Hash), PoolError> {
        Ok(self.inner.lock().unwrap().head)
    }

    fn knot(&self, height: u64) -> Result<Option<MockBlock>, PoolError> {
        Ok(self.inner.lock().unwrap().blocks.get(&height).cloned())
    }

    fn append(&self, blocks: Vec<MockBlock>) -> Result<(), PoolError> {
        let mut inner = self.inner.lock().unwrap();
        for block in blocks {
            if block.height != inner.head.0 + 1 || block.prev != inner.head.1 {
                return Err(PoolError::HeadMismatch(format!(
                    "disk head is ({}, {}), block is ({}, prev {})",
                    inner.head.0, inner.head.1, block.height, block.prev
                )));
            }
            inner.head = (block.height, block.hash);
            inner.blocks.insert(block.height, block);
        }
        Ok(())
    }
}
