//! Protocol constants.

use std::time::Duration;

/// A block may not reference a snapshot more than this many snapshot heights
/// behind the current head (one snapshot per second, 30 days).
pub const TIME_OUT_HEIGHT: u64 = 24 * 30 * 3600;

/// Maximum bit width of `amount` and `fee`.
pub const MAX_BIG_INT_LEN: usize = 256;

/// Idle lifetime of a simple-cache (aggregate) entry in the on-road pool.
pub const SIMPLE_CACHE_EXPIRE: Duration = Duration::from_secs(20 * 60);

/// Lifetime of a full-cache entry after its reference count drops to zero.
pub const FULL_CACHE_EXPIRE: Duration = Duration::from_secs(2 * 60);
