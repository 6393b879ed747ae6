//! The transaction table and the four RAET transaction state machines
//! (Join, Allow, Message, Stale). Transactions never hold a reference
//! back into the stack; they report what happened as a list of
//! [`effect::Effect`] values for the driver to apply.

mod allow;
mod crypto_ctx;
mod ctx;
mod effect;
mod error;
mod join;
mod message;
mod stale;
mod table;
mod timers;
mod wire;

pub use allow::{Allowent, Allower};
pub use crypto_ctx::{CodecDefaults, StackCrypto};
pub use ctx::{Outcome, StackContext, StepResult};
pub use effect::{Delivery, Effect};
pub use error::{Result, TransactionError};
pub use join::{Joinent, Joiner};
pub use message::{Messenger, Messengent};
pub use stale::nack_stale;
pub use table::{Transaction, TransactionTable};
pub use timers::Timers;

#[cfg(test)]
mod tests {
    use super::*;
    use raet_crypto::NaclLikeCrypto;
    use raet_estate::{Acceptance, EstateRegistry, LocalEstate, RemoteEstate};
    use raet_packet::RxPacket;
    use std::time::Instant;

    fn registry(main: bool) -> (EstateRegistry, NaclLikeCrypto) {
        let mut local = LocalEstate::new("a", main, "127.0.0.1", 7530);
        if main {
            local.assign_eid(1);
        }
        let keys = raet_crypto::KeyPairBundle::from_hex(&local.keys.sighex(), &local.keys.prihex())
            .unwrap();
        let crypto = NaclLikeCrypto::new(keys);
        (EstateRegistry::new(local, true), crypto)
    }

    #[test]
    fn joiner_start_builds_request_and_stays_live() {
        let (mut registry, crypto) = registry(false);
        let codecs = CodecDefaults::default();
        let mut ctx = StackContext {
            registry: &mut registry,
            crypto: StackCrypto {
                signer: &crypto,
                verifier: &crypto,
                encryptor: &crypto,
            },
            codecs,
        };
        let (joiner, step) =
            Joiner::start(Instant::now(), 42, "127.0.0.1", 7530, &mut ctx).unwrap();
        assert_eq!(joiner.index(), (0, 0, 42, raet_packet::TransactionKind::Join));
        assert_eq!(step.outcome, Outcome::Live);
        assert_eq!(step.effects.len(), 2);
    }

    #[test]
    fn joinent_rejects_non_request_start() {
        let (mut registry, crypto) = registry(true);
        let codecs = CodecDefaults::default();
        let mut ctx = StackContext {
            registry: &mut registry,
            crypto: StackCrypto {
                signer: &crypto,
                verifier: &crypto,
                encryptor: &crypto,
            },
            codecs,
        };
        let header = raet_packet::PacketHeader {
            tk: raet_packet::TransactionKind::Join,
            pk: raet_packet::PacketKind::Ack,
            se: 0,
            de: 0,
            si: 0,
            ti: 1,
            cf: false,
            bf: false,
            wf: false,
            hk: raet_packet::HeadKind::Raet,
            bk: raet_packet::BodyKind::Json,
            fk: raet_packet::FootKind::Nul,
            ck: raet_packet::CoatKind::Nul,
            sh: "127.0.0.1".into(),
            sp: 7531,
            dh: String::new(),
            dp: 0,
        };
        let bytes = raet_packet::TxPacketBuilder::new(header, serde_json::Value::Null)
            .pack(&crypto, None, None)
            .unwrap();
        let packet = RxPacket::parse_outer(&bytes).unwrap();
        let err = Joinent::start(Instant::now(), &packet, &mut ctx).unwrap_err();
        assert!(matches!(err, TransactionError::UnexpectedPacket));
    }

    #[test]
    fn messenger_broadcast_completes_without_waiting_for_ack() {
        let (mut registry, crypto) = registry(true);
        let remote = RemoteEstate::new(2, "b", "127.0.0.1", 7531, Acceptance::Accepted, "v", "p");
        registry.insert_remote(remote).unwrap();
        let codecs = CodecDefaults::default();
        let mut ctx = StackContext {
            registry: &mut registry,
            crypto: StackCrypto {
                signer: &crypto,
                verifier: &crypto,
                encryptor: &crypto,
            },
            codecs,
        };
        let (_, step) = Messenger::start(
            Instant::now(),
            1,
            2,
            serde_json::json!({"hi": true}),
            true,
            true,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(step.outcome, Outcome::Done);
    }

    #[test]
    fn messenger_wait_for_ack_stays_live_until_ack() {
        let (mut registry, crypto) = registry(true);
        let remote = RemoteEstate::new(2, "b", "127.0.0.1", 7531, Acceptance::Accepted, "v", "p");
        registry.insert_remote(remote).unwrap();
        let codecs = CodecDefaults::default();
        let mut ctx = StackContext {
            registry: &mut registry,
            crypto: StackCrypto {
                signer: &crypto,
                verifier: &crypto,
                encryptor: &crypto,
            },
            codecs,
        };
        let (mut messenger, step) = Messenger::start(
            Instant::now(),
            1,
            2,
            serde_json::json!({"hi": true}),
            false,
            true,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(step.outcome, Outcome::Live);

        let ack_header = raet_packet::PacketHeader {
            tk: raet_packet::TransactionKind::Message,
            pk: raet_packet::PacketKind::Ack,
            se: 2,
            de: 1,
            si: 0,
            ti: 1,
            cf: true,
            bf: false,
            wf: false,
            hk: raet_packet::HeadKind::Raet,
            bk: raet_packet::BodyKind::Json,
            fk: raet_packet::FootKind::Nul,
            ck: raet_packet::CoatKind::Nul,
            sh: "127.0.0.1".into(),
            sp: 7531,
            dh: String::new(),
            dp: 0,
        };
        let bytes = raet_packet::TxPacketBuilder::new(ack_header, serde_json::Value::Null)
            .pack(&crypto, None, None)
            .unwrap();
        let packet = RxPacket::parse_outer(&bytes).unwrap();
        let step = messenger.receive(packet, &mut ctx).unwrap();
        assert_eq!(step.outcome, Outcome::Done);
    }
}
