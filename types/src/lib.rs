//! Fundamental types for the trellis ledger.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: hashes, addresses, group identifiers, amounts, timestamps and
//! protocol constants.

pub mod address;
pub mod amount;
pub mod error;
pub mod gid;
pub mod hash;
pub mod params;
pub mod time;

pub use address::{Address, AddressClass};
pub use amount::Amount;
pub use error::TypeError;
pub use gid::{Gid, TokenId};
pub use hash::Hash;
pub use params::{FULL_CACHE_EXPIRE, MAX_BIG_INT_LEN, SIMPLE_CACHE_EXPIRE, TIME_OUT_HEIGHT};
pub use time::Timestamp;
