use thiserror::Error;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("failed to encode header: {0}")]
    HeaderEncode(#[source] serde_json::Error),

    #[error("failed to encode body: {0}")]
    BodyEncode(String),

    #[error("sealing the coat failed: {0}")]
    Coat(#[from] raet_crypto::CryptoError),
}

#[derive(Debug, Error)]
pub enum ParseOuterError {
    #[error("packet shorter than the magic prefix")]
    Truncated,

    #[error("bad magic bytes, not a RAET packet")]
    BadMagic,

    #[error("declared section length {declared} exceeds remaining buffer {remaining}")]
    LengthMismatch { declared: usize, remaining: usize },

    #[error("failed to decode header: {0}")]
    HeaderDecode(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ParseInnerError {
    #[error("signature verification failed")]
    BadSignature,

    #[error("coat decryption failed: {0}")]
    Crypto(#[from] raet_crypto::CryptoError),

    #[error("unknown body codec selector")]
    UnknownCodec,

    #[error("failed to decode body: {0}")]
    BodyDecode(String),
}
