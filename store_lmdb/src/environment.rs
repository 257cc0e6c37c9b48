//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,

    /// Account blocks by hash.
    pub(crate) account_blocks_db: Database<Bytes, Bytes>,
    /// Height index: `address(21) ∥ height_be(8)` → block hash.
    pub(crate) account_heights_db: Database<Bytes, Bytes>,
    /// Chain heads: address → head block hash.
    pub(crate) latest_accounts_db: Database<Bytes, Bytes>,

    /// Snapshot blocks by hash.
    pub(crate) snapshot_blocks_db: Database<Bytes, Bytes>,
    /// Snapshot height index: `height_be(8)` → snapshot hash. The last key
    /// is the snapshot head.
    pub(crate) snapshot_heights_db: Database<Bytes, Bytes>,

    /// On-road metadata: `to_address(21) ∥ send_hash(32)` → send block.
    pub(crate) on_road_db: Database<Bytes, Bytes>,
    /// Group index: `gid(10) ∥ contract_address(21)` → ∅.
    pub(crate) gid_index_db: Database<Bytes, Bytes>,
    /// Reverse of the group index: contract address → gid.
    pub(crate) contract_gids_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("failed to create directory: {e}")))?;

        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(8)
                .map_size(map_size)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;

        let account_blocks_db = env.create_database(&mut wtxn, Some("account_blocks"))?;
        let account_heights_db = env.create_database(&mut wtxn, Some("account_heights"))?;
        let latest_accounts_db = env.create_database(&mut wtxn, Some("latest_accounts"))?;
        let snapshot_blocks_db = env.create_database(&mut wtxn, Some("snapshot_blocks"))?;
        let snapshot_heights_db = env.create_database(&mut wtxn, Some("snapshot_heights"))?;
        let on_road_db = env.create_database(&mut wtxn, Some("on_road"))?;
        let gid_index_db = env.create_database(&mut wtxn, Some("gid_index"))?;
        let contract_gids_db = env.create_database(&mut wtxn, Some("contract_gids"))?;

        wtxn.commit()?;

        Ok(Self {
            env: Arc::new(env),
            account_blocks_db,
            account_heights_db,
            latest_accounts_db,
            snapshot_blocks_db,
            snapshot_heights_db,
            on_road_db,
            gid_index_db,
            contract_gids_db,
        })
    }

    /// Get a shared reference to the underlying heed environment.
    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }
}
