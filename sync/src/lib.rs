//! Consumption of locally cached sync chunks.
//!
//! The sync downloader materialises contiguous snapshot-block ranges into a
//! local cache; this crate reads those chunks back in order, enforces the
//! hash-chain across chunk boundaries, and feeds each block into the
//! verification pipeline through a handler callback.

pub mod cache;
pub mod chunk;
pub mod error;
pub mod reader;

pub use cache::{ChunkReader, ChunkWriter, Segment, SyncCache, SyncItem};
pub use chunk::Chunk;
pub use error::SyncError;
pub use reader::{CacheReader, ChainHeightReader};
