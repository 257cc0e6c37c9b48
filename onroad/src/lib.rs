//! On-road message pool.
//!
//! A *send* whose matching receive has not been committed yet is "on-road":
//! it sits in the store keyed by its recipient until consumed. This crate
//! maintains the cached, address-keyed view of those sends — an aggregate
//! tier for balance queries and a full tier for workers draining an
//! account's queue — and keeps both consistent with ledger writes and
//! reverts.

pub mod cache;
pub mod error;
pub mod pool;

pub use cache::{FullCacheEntry, SimpleCacheEntry};
pub use error::OnRoadError;
pub use pool::OnRoadPool;
