use serde::{Deserialize, Serialize};

/// Kind of transaction a packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Join,
    Allow,
    Message,
    Stale,
}

/// Kind of packet within a transaction's message sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    Request,
    Response,
    Hello,
    Cookie,
    Initiate,
    Ack,
    Nack,
    Message,
}

/// Head encoding selector. Fixed registry of one for now; kept as an enum
/// per the codec-selection design note so a second head kind can be added
/// without changing callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadKind {
    #[default]
    Raet,
}

/// Body encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    #[default]
    Json,
    Raw,
    Bincode,
}

/// Foot (signature) encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootKind {
    #[default]
    Nacl,
    Nul,
}

/// Coat (encrypted envelope) encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoatKind {
    #[default]
    Nacl,
    Nul,
}

/// The logical packet header: named fields sufficient to route and drive
/// the transaction state machines, independent of wire byte layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketHeader {
    pub tk: TransactionKind,
    pub pk: PacketKind,
    /// Source eid.
    pub se: u32,
    /// Destination eid.
    pub de: u32,
    /// Session id.
    pub si: u32,
    /// Transaction id.
    pub ti: u32,
    /// Correspondent flag: set if the sender is the correspondent side.
    pub cf: bool,
    /// Broadcast flag.
    pub bf: bool,
    /// Wait-for-ack flag.
    pub wf: bool,
    pub hk: HeadKind,
    pub bk: BodyKind,
    pub fk: FootKind,
    pub ck: CoatKind,
    /// Observed source host, filled in post-parse by the stack.
    #[serde(default)]
    pub sh: String,
    #[serde(default)]
    pub sp: u16,
    #[serde(default)]
    pub dh: String,
    #[serde(default)]
    pub dp: u16,
}

/// The composite key used to route a packet to its transaction.
pub type TransactionIndex = (u32, u32, u32, TransactionKind);

impl PacketHeader {
    /// `(se, si, ti, tk)` -- the index used when receiving.
    pub fn rx_index(&self) -> TransactionIndex {
        (self.se, self.si, self.ti, self.tk)
    }
}

/// `(reid, si, ti, tk)` -- the index used when sending.
pub fn tx_index(reid: u32, si: u32, ti: u32, tk: TransactionKind) -> TransactionIndex {
    (reid, si, ti, tk)
}
