use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// A chunk broke the height/prev-hash chain. The chunk is deleted from
    /// the cache and re-downloaded.
    #[error("chunk mismatch: {0}")]
    ChunkMismatch(String),

    /// The chunk reader failed mid-chunk.
    #[error("chunk read failed: {0}")]
    Reader(String),

    /// The block handler rejected a block; the chunk is kept for retry.
    #[error("block handler failed: {0}")]
    Handler(String),

    #[error("sync cache error: {0}")]
    Cache(String),
}
