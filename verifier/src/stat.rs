//! Verification verdicts and pending-task bookkeeping.

use trellis_types::{Address, Hash};

/// Three-way verification verdict.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VerifyResult {
    /// A referential dependency has not arrived yet; retry later.
    #[default]
    Pending,
    /// The block can never become valid. Terminal.
    Fail,
    /// All referential predicates hold.
    Success,
}

/// A missing account-side dependency: the block (or address) the caller
/// should wait for before retrying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountPendingTask {
    pub addr: Option<Address>,
    pub hash: Hash,
}

/// A missing snapshot dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotPendingTask {
    pub hash: Hash,
}

/// Outcome of one `verify_referred` run: the three sub-verdicts plus the
/// tasks to register when the combined verdict is `Pending`.
#[derive(Debug, Default)]
pub struct VerifyStat {
    pub(crate) referred_self: VerifyResult,
    pub(crate) referred_from: VerifyResult,
    pub(crate) referred_snapshot: VerifyResult,
    pub(crate) account_tasks: Vec<AccountPendingTask>,
    pub(crate) snapshot_task: Option<SnapshotPendingTask>,
    pub(crate) err_msg: String,
}

impl VerifyStat {
    /// Combine the sub-verdicts: any `Fail` is `Fail`, all `Success` is
    /// `Success`, anything else is `Pending`.
    pub fn result(&self) -> VerifyResult {
        if self.referred_self == VerifyResult::Fail
            || self.referred_from == VerifyResult::Fail
            || self.referred_snapshot == VerifyResult::Fail
        {
            return VerifyResult::Fail;
        }
        if self.referred_self == VerifyResult::Success
            && self.referred_from == VerifyResult::Success
            && self.referred_snapshot == VerifyResult::Success
        {
            return VerifyResult::Success;
        }
        VerifyResult::Pending
    }

    pub fn err_msg(&self) -> &str {
        &self.err_msg
    }

    /// The tasks to register with the pool and retry on arrival.
    pub fn pending_tasks(&self) -> (&[AccountPendingTask], Option<&SnapshotPendingTask>) {
        (&self.account_tasks, self.snapshot_task.as_ref())
    }
}
