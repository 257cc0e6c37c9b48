use thiserror::Error;
use trellis_store::StoreError;

#[derive(Debug, Error)]
pub enum LmdbError {
    #[error("heed error: {0}")]
    Heed(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<heed::Error> for LmdbError {
    fn from(err: heed::Error) -> Self {
        Self::Heed(err.to_string())
    }
}

impl From<bincode::Error> for LmdbError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<LmdbError> for StoreError {
    fn from(err: LmdbError) -> Self {
        match err {
            LmdbError::Heed(msg) => StoreError::Backend(msg),
            LmdbError::Serialization(msg) => StoreError::Serialization(msg),
        }
    }
}
