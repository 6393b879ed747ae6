use raet_packet::{BodyKind, CoatKind, FootKind, HeadKind, PacketHeader, PacketKind, TransactionKind};

/// Builds a header with the caller's routing fields and the given codec
/// selections, leaving the observed-address fields blank (the sender
/// doesn't know them; the receiver stamps them on parse).
#[allow(clippy::too_many_arguments)]
pub fn header(
    tk: TransactionKind,
    pk: PacketKind,
    se: u32,
    de: u32,
    si: u32,
    ti: u32,
    cf: bool,
    bf: bool,
    wf: bool,
    bk: BodyKind,
    fk: FootKind,
    ck: CoatKind,
) -> PacketHeader {
    PacketHeader {
        tk,
        pk,
        se,
        de,
        si,
        ti,
        cf,
        bf,
        wf,
        hk: HeadKind::Raet,
        bk,
        fk,
        ck,
        sh: String::new(),
        sp: 0,
        dh: String::new(),
        dp: 0,
    }
}

/// Join runs before either side has pinned the other's keys, so its
/// packets carry neither a signature nor a coat -- identity is
/// established by trust-on-first-use and pinned into the keep store only
/// on successful completion. Allow and Message run after a peer's verify
/// and public keys are known (from a completed Join) and so sign and
/// seal normally.
pub const JOIN_FK: FootKind = FootKind::Nul;
pub const JOIN_CK: CoatKind = CoatKind::Nul;
pub const JOIN_BK: BodyKind = BodyKind::Json;

/// Placeholder passed to `parse_inner` when the foot kind is `Nul` and no
/// peer verify key is needed to decode the packet.
pub const NO_VERHEX: &str = "";
