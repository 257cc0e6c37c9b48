//! LMDB-backed implementation of the trellis [`Store`](trellis_store::Store)
//! facade.
//!
//! A committed [`Batch`](trellis_store::Batch) maps to exactly one LMDB
//! write transaction, so the ledger write, the on-road update and the
//! gid-index update of a state transition share one fsync and one atomic
//! commit.

pub mod environment;
pub mod error;
pub mod store;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use store::LmdbStore;
