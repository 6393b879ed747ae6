//! Layered RAET packet codec.
//!
//! A packet is immutable once packed: header -> body -> foot signature ->
//! optional encrypted coat. `TxPacketBuilder::pack` produces wire bytes;
//! `RxPacket::parse_outer` then `parse_inner` consume them back.

mod codec;
mod error;
mod header;

pub use codec::{RxPacket, TxPacketBuilder, UDP_MAX_PACKET_SIZE};
pub use error::{PacketError, ParseInnerError, ParseOuterError};
pub use header::{
    tx_index, BodyKind, CoatKind, FootKind, HeadKind, PacketHeader, PacketKind, TransactionIndex,
    TransactionKind,
};

#[cfg(test)]
mod tests {
    use super::*;
    use raet_crypto::{KeyPairBundle, NaclLikeCrypto};

    fn header(tk: TransactionKind, pk: PacketKind, ck: CoatKind) -> PacketHeader {
        PacketHeader {
            tk,
            pk,
            se: 1,
            de: 2,
            si: 7,
            ti: 1,
            cf: false,
            bf: false,
            wf: false,
            hk: HeadKind::Raet,
            bk: BodyKind::Json,
            fk: FootKind::Nacl,
            ck,
            sh: String::new(),
            sp: 0,
            dh: String::new(),
            dp: 0,
        }
    }

    #[test]
    fn pack_and_parse_round_trip_plaintext_coat() {
        let bundle = KeyPairBundle::generate();
        let verhex = bundle.verhex();
        let crypto = NaclLikeCrypto::new(bundle);

        let hdr = header(TransactionKind::Message, PacketKind::Message, CoatKind::Nul);
        let body = serde_json::json!({"hello": 1});
        let raw = TxPacketBuilder::new(hdr, body.clone())
            .pack(&crypto, None, None)
            .unwrap();

        let rx = RxPacket::parse_outer(&raw).unwrap();
        assert_eq!(rx.header.se, 1);
        assert_eq!(rx.header.de, 2);

        let decoded = rx.parse_inner(&crypto, None, &verhex).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn pack_and_parse_round_trip_encrypted_coat() {
        let alice = KeyPairBundle::generate();
        let alice_verhex = alice.verhex();
        let alice_crypto = NaclLikeCrypto::new(alice);

        let bob = KeyPairBundle::generate();
        let bob_pubhex = bob.pubhex();
        let bob_crypto = NaclLikeCrypto::new(bob);

        let hdr = header(TransactionKind::Message, PacketKind::Message, CoatKind::Nacl);
        let body = serde_json::json!({"msg": "secret"});
        let raw = TxPacketBuilder::new(hdr, body.clone())
            .pack(&alice_crypto, Some(&alice_crypto), Some(&bob_pubhex))
            .unwrap();

        let rx = RxPacket::parse_outer(&raw).unwrap();
        let decoded = rx
            .parse_inner(&bob_crypto, Some(&bob_crypto), &alice_verhex)
            .unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn parse_outer_rejects_bad_magic() {
        let err = RxPacket::parse_outer(b"NOPE....").unwrap_err();
        assert!(matches!(err, ParseOuterError::BadMagic));
    }

    #[test]
    fn parse_outer_rejects_truncated_sections() {
        let mut raw = b"RAET".to_vec();
        raw.extend_from_slice(&255u32.to_be_bytes()); // declares far more than present
        let err = RxPacket::parse_outer(&raw).unwrap_err();
        assert!(matches!(err, ParseOuterError::LengthMismatch { .. }));
    }

    #[test]
    fn parse_inner_rejects_signature_from_wrong_key() {
        let claimed = KeyPairBundle::generate();
        let claimed_verhex = claimed.verhex();

        // Packet is signed by an impostor key, but its header claims the
        // verify key of `claimed` -- verification must fail.
        let impostor = NaclLikeCrypto::new(KeyPairBundle::generate());

        let hdr = header(TransactionKind::Message, PacketKind::Message, CoatKind::Nul);
        let raw = TxPacketBuilder::new(hdr, serde_json::json!({"a": 1}))
            .pack(&impostor, None, None)
            .unwrap();

        let rx = RxPacket::parse_outer(&raw).unwrap();
        let err = rx.parse_inner(&impostor, None, &claimed_verhex).unwrap_err();
        assert!(matches!(err, ParseInnerError::BadSignature));
    }

    #[test]
    fn tx_and_rx_index_agree() {
        let hdr = header(TransactionKind::Join, PacketKind::Request, CoatKind::Nul);
        let idx = tx_index(hdr.se, hdr.si, hdr.ti, hdr.tk);
        assert_eq!(idx, (1, 7, 1, TransactionKind::Join));
    }
}
