//! Interfaces to the sync cache the downloader fills.

use crate::error::SyncError;
use trellis_ledger::{AccountBlock, SnapshotBlock};
use trellis_types::Hash;

/// A contiguous `[from, to]` snapshot range held in the cache, with the
/// hash endpoints that chain it to its neighbours.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub bound: [u64; 2],
    pub hash: Hash,
    pub prev_hash: Hash,
}

/// One record read out of a chunk.
#[derive(Clone, Debug)]
pub enum SyncItem {
    Account(AccountBlock),
    Snapshot(SnapshotBlock),
}

/// Sequential reader over one cached chunk.
pub trait ChunkReader: Send {
    /// The next record, or `None` at end of chunk.
    fn read(&mut self) -> Result<Option<SyncItem>, SyncError>;

    /// Size of the chunk in bytes.
    fn size(&self) -> u64;

    fn verified(&self) -> bool;

    fn verify(&mut self);
}

/// Writer used by the downloader; the segment becomes visible to
/// [`SyncCache::chunks`] once closed.
pub trait ChunkWriter: Send {
    fn write(&mut self, item: SyncItem) -> Result<(), SyncError>;

    fn close(self: Box<Self>) -> Result<(), SyncError>;
}

/// The local chunk cache filled by the sync downloader.
pub trait SyncCache: Send + Sync {
    /// Cached segments in ascending order.
    fn chunks(&self) -> Vec<Segment>;

    fn new_reader(&self, segment: &Segment) -> Result<Box<dyn ChunkReader>, SyncError>;

    fn new_writer(&self, segment: &Segment) -> Result<Box<dyn ChunkWriter>, SyncError>;

    fn delete(&self, segment: &Segment) -> Result<(), SyncError>;
}
