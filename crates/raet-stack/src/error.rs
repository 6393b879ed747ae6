use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RaetError {
    #[error("socket bind failed on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("socket send/recv failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("keep store error: {0}")]
    Keep(#[from] raet_keep::KeepError),

    #[error("estate registry error: {0}")]
    Estate(#[from] raet_estate::EstateError),

    #[error("transaction error: {0}")]
    Transaction(#[from] raet_transaction::TransactionError),

    #[error("crypto error: {0}")]
    Crypto(#[from] raet_crypto::CryptoError),

    #[error("no local estate bound to an eid yet, and no main address given to join")]
    NoJoinTarget,

    #[error("'{0}' is not a valid host:port address")]
    BadAddress(String),

    #[error("remote {0} is unknown")]
    UnknownRemote(u32),

    #[error("local estate is not yet bound to an eid; join a main estate first")]
    Unbound,
}

pub type Result<T> = std::result::Result<T, RaetError>;
