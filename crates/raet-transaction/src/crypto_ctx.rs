use raet_crypto::{Encryptor, Signer, Verifier};

/// Bundles the three crypto seams a transaction needs, borrowed for the
/// duration of one `receive`/`process` call.
pub struct StackCrypto<'a> {
    pub signer: &'a dyn Signer,
    pub verifier: &'a dyn Verifier,
    pub encryptor: &'a dyn Encryptor,
}

/// The stack's default codec selections, threaded into every transaction
/// it starts (mirrors `RoadStack.Hk/Bk/Fk/Ck/Bf/Wf` class defaults).
#[derive(Debug, Clone, Copy)]
pub struct CodecDefaults {
    pub hk: raet_packet::HeadKind,
    pub bk: raet_packet::BodyKind,
    pub fk: raet_packet::FootKind,
    pub ck: raet_packet::CoatKind,
    pub bf: bool,
    pub wf: bool,
}

impl Default for CodecDefaults {
    fn default() -> Self {
        Self {
            hk: raet_packet::HeadKind::Raet,
            bk: raet_packet::BodyKind::Json,
            fk: raet_packet::FootKind::Nacl,
            ck: raet_packet::CoatKind::Nacl,
            bf: false,
            wf: false,
        }
    }
}
