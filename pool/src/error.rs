use thiserror::Error;
use trellis_onroad::OnRoadError;
use trellis_store::StoreError;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("on-road error: {0}")]
    OnRoad(#[from] OnRoadError),

    #[error("snippet anchors on no known branch")]
    NotFound,

    #[error("branch error: {0}")]
    InvalidBranch(String),

    #[error("block does not extend the branch head: {0}")]
    HeadMismatch(String),

    #[error("rollback is not a suffix of the current branch: {0}")]
    Reorg(String),

    #[error("branch tree is inconsistent: {0}")]
    Inconsistent(String),
}
