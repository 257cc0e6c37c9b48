//! Write batching — groups ledger, on-road and gid-index operations into a
//! single atomic commit.
//!
//! A [`Batch`] is plain data: callers accumulate [`BatchOp`]s and hand the
//! batch to [`Store::write_batch`](crate::Store::write_batch), which applies
//! every operation inside one backend transaction. Either all operations
//! become visible or none do.

use trellis_ledger::{AccountBlock, SnapshotBlock};
use trellis_types::{Address, Gid, Hash};

/// A single operation inside a batch.
#[derive(Clone, Debug)]
pub enum BatchOp {
    /// Persist an account block and advance the account's chain head.
    PutAccountBlock(AccountBlock),
    /// Remove an account block (rollback). Must be the account's head.
    DeleteAccountBlock(Hash),
    /// Persist a snapshot block and advance the snapshot head.
    PutSnapshotBlock(SnapshotBlock),
    /// Record an unconsumed send under its recipient.
    WriteOnRoadMeta { to: Address, send: AccountBlock },
    /// Remove an on-road entry (the send was received, or reverted).
    DeleteOnRoadMeta { to: Address, send_hash: Hash },
    /// Register a contract address under its group.
    WriteContractGid { gid: Gid, addr: Address },
    /// Remove a contract address from its group (creation reverted).
    DeleteContractGid { gid: Gid, addr: Address },
}

/// An ordered list of operations committed atomically.
#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: BatchOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
