use thiserror::Error;
use trellis_store::StoreError;
use trellis_types::Hash;

#[derive(Debug, Error)]
pub enum OnRoadError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cache conflicts with ledger write: {0}")]
    Conflict(String),

    #[error("send block {0} not found for revert")]
    MissingSend(Hash),
}
