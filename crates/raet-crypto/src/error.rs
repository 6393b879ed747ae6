use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid hex key material: {0}")]
    InvalidHex(#[source] hex::FromHexError),

    #[error("key material has the wrong length: expected {expected}, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("failed to seal coat payload")]
    SealFailed,

    #[error("failed to open coat payload: {0}")]
    OpenFailed(&'static str),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
