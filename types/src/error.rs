use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypeError {
    #[error("amount out of bounds: {0} bits")]
    AmountOutOfBounds(usize),

    #[error("invalid byte length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
}
