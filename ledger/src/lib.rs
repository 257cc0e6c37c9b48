//! Block formats for the trellis account lattice.
//!
//! Every account owns its own chain of blocks; cross-account transfers are a
//! pair of blocks (a send on the sender's chain, a receive on the
//! recipient's) linked by hash. Account chains are ordered against the
//! consensus chain through per-block snapshot references.

pub mod account_block;
pub mod snapshot_block;

pub use account_block::{AccountBlock, AccountType, BlockKind, VmAccountBlock};
pub use snapshot_block::SnapshotBlock;
