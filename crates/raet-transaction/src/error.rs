use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("packet does not match this transaction's expected step")]
    UnexpectedPacket,

    #[error("remote is not accepted, cannot advance past the first round trip")]
    NotAccepted,

    #[error("only a main estate may assign remote eids")]
    NotMain,

    #[error("packet codec error: {0}")]
    Packet(#[from] raet_packet::PacketError),

    #[error("inner parse failed: {0}")]
    ParseInner(#[from] raet_packet::ParseInnerError),
}

pub type Result<T> = std::result::Result<T, TransactionError>;
