use thiserror::Error;
use trellis_store::StoreError;

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("block integrity missing: {0}")]
    Integrity(String),

    #[error("{0} out of bounds")]
    AmountOutOfBounds(&'static str),

    #[error("hash verification failed")]
    HashInvalid,

    #[error("proof-of-work nonce verification failed")]
    NonceInvalid,

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("block generation failed: {0}")]
    GenerateFailed(String),

    #[error("the block producer is illegal")]
    ProducerIllegal,
}
