//! Snapshot block — a block of the consensus chain.
//!
//! Account blocks reference a snapshot block for ordering; the consensus
//! algorithm producing snapshots lives outside this workspace.

use serde::{Deserialize, Serialize};
use trellis_types::{Hash, Timestamp};

/// A snapshot chain block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBlock {
    pub height: u64,
    pub hash: Hash,
    pub prev_hash: Hash,
    pub timestamp: Timestamp,
}
