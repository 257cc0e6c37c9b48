//! Forked-branch bookkeeping for pending blocks.
//!
//! Incoming block fragments ([`Snippet`]s) are attached to a forest of
//! branches ([`BranchTree`]) rooted at the persisted disk chain. One branch
//! is *main* — the candidate for promotion; blocks move from main onto the
//! disk chain, and a reorg re-roots main onto a longer fork and reverts the
//! abandoned suffix.

pub mod account;
pub mod chain_pool;
pub mod error;
pub mod snippet;
pub mod tree;

#[cfg(test)]
pub(crate) mod mock;

pub use account::{AccountChainPool, AccountDiskRoot};
pub use chain_pool::{ChainPool, Fork2, Ingest};
pub use error::PoolError;
pub use snippet::Snippet;
pub use tree::{BranchId, BranchTree, DiskRoot, PoolBlock};
