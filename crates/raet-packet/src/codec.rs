use crate::error::{ParseInnerError, ParseOuterError, PacketError};
use crate::header::{BodyKind, CoatKind, FootKind, PacketHeader};
use raet_crypto::{Encryptor, Signer, Verifier};

/// Maximum UDP payload size (max IPv4 UDP datagram body).
pub const UDP_MAX_PACKET_SIZE: usize = 65_507;

const MAGIC: &[u8; 4] = b"RAET";

fn encode_body(body: &serde_json::Value, bk: BodyKind) -> Result<Vec<u8>, PacketError> {
    match bk {
        BodyKind::Json => {
            serde_json::to_vec(body).map_err(|e| PacketError::BodyEncode(e.to_string()))
        }
        BodyKind::Raw => match body {
            serde_json::Value::String(s) => Ok(s.as_bytes().to_vec()),
            other => Err(PacketError::BodyEncode(format!(
                "raw body kind requires a string value, got {other:?}"
            ))),
        },
        BodyKind::Bincode => bincode::serialize(body)
            .map_err(|e| PacketError::BodyEncode(e.to_string())),
    }
}

fn decode_body(bytes: &[u8], bk: BodyKind) -> Result<serde_json::Value, ParseInnerError> {
    match bk {
        BodyKind::Json => {
            serde_json::from_slice(bytes).map_err(|e| ParseInnerError::BodyDecode(e.to_string()))
        }
        BodyKind::Raw => {
            let s = String::from_utf8(bytes.to_vec())
                .map_err(|e| ParseInnerError::BodyDecode(e.to_string()))?;
            Ok(serde_json::Value::String(s))
        }
        BodyKind::Bincode => {
            bincode::deserialize(bytes).map_err(|e| ParseInnerError::BodyDecode(e.to_string()))
        }
    }
}

fn write_section(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
}

fn read_section<'a>(buf: &'a [u8], offset: &mut usize) -> Result<&'a [u8], ParseOuterError> {
    if buf.len() < *offset + 4 {
        return Err(ParseOuterError::Truncated);
    }
    let len_bytes: [u8; 4] = buf[*offset..*offset + 4].try_into().unwrap();
    let len = u32::from_be_bytes(len_bytes) as usize;
    *offset += 4;

    let remaining = buf.len() - *offset;
    if len > remaining {
        return Err(ParseOuterError::LengthMismatch {
            declared: len,
            remaining,
        });
    }
    let section = &buf[*offset..*offset + len];
    *offset += len;
    Ok(section)
}

/// Builds and packs an immutable outbound packet.
pub struct TxPacketBuilder {
    header: PacketHeader,
    body: serde_json::Value,
}

impl TxPacketBuilder {
    pub fn new(header: PacketHeader, body: serde_json::Value) -> Self {
        Self { header, body }
    }

    /// Pack the packet: encode the body, sign header+body per `fk`, then
    /// optionally seal body+foot into an encrypted coat per `ck`.
    pub fn pack(
        &self,
        signer: &dyn Signer,
        encryptor: Option<&dyn Encryptor>,
        their_pubhex: Option<&str>,
    ) -> Result<Vec<u8>, PacketError> {
        let header_bytes = serde_json::to_vec(&self.header).map_err(PacketError::HeaderEncode)?;
        let body_bytes = encode_body(&self.body, self.header.bk)?;

        let mut signed_msg = Vec::with_capacity(header_bytes.len() + body_bytes.len());
        signed_msg.extend_from_slice(&header_bytes);
        signed_msg.extend_from_slice(&body_bytes);

        let foot_bytes = match self.header.fk {
            FootKind::Nacl => signer.sign(&signed_msg),
            FootKind::Nul => Vec::new(),
        };

        let mut plaintext_payload = Vec::new();
        write_section(&mut plaintext_payload, &body_bytes);
        write_section(&mut plaintext_payload, &foot_bytes);

        let payload = match self.header.ck {
            CoatKind::Nul => plaintext_payload,
            CoatKind::Nacl => {
                let encryptor = encryptor.expect("coat kind nacl requires an encryptor");
                let their_pubhex = their_pubhex.expect("coat kind nacl requires a peer pubkey");
                encryptor.seal(&plaintext_payload, their_pubhex)?
            }
        };

        let mut out = Vec::with_capacity(4 + 4 + header_bytes.len() + 4 + payload.len());
        out.extend_from_slice(MAGIC);
        write_section(&mut out, &header_bytes);
        write_section(&mut out, &payload);
        Ok(out)
    }
}

/// A packet whose outer framing has been validated and whose header has
/// been decoded, but whose body/foot/coat remain opaque bytes until
/// `parse_inner` runs.
pub struct RxPacket {
    pub header: PacketHeader,
    payload: Vec<u8>,
}

impl RxPacket {
    /// Validate magic/length and decode the header. Fails with
    /// `ParseOuterError` on structural corruption.
    pub fn parse_outer(raw: &[u8]) -> Result<Self, ParseOuterError> {
        if raw.len() < MAGIC.len() {
            return Err(ParseOuterError::Truncated);
        }
        if &raw[..MAGIC.len()] != MAGIC {
            return Err(ParseOuterError::BadMagic);
        }

        let mut offset = MAGIC.len();
        let header_bytes = read_section(raw, &mut offset)?;
        let header: PacketHeader =
            serde_json::from_slice(header_bytes).map_err(ParseOuterError::HeaderDecode)?;
        let payload = read_section(raw, &mut offset)?.to_vec();

        Ok(Self { header, payload })
    }

    /// Verify the foot against the remote's verify key, decrypt the coat
    /// if present, then decode the body per `bk`. Fails with
    /// `ParseInnerError` on signature or decryption failure.
    pub fn parse_inner(
        &self,
        verifier: &dyn Verifier,
        decryptor: Option<&dyn Encryptor>,
        peer_verhex: &str,
    ) -> Result<serde_json::Value, ParseInnerError> {
        let header_bytes = serde_json::to_vec(&self.header)
            .map_err(|e| ParseInnerError::BodyDecode(e.to_string()))?;

        let plaintext_payload = match self.header.ck {
            CoatKind::Nul => self.payload.clone(),
            CoatKind::Nacl => {
                let decryptor = decryptor.ok_or(ParseInnerError::UnknownCodec)?;
                decryptor.open(&self.payload, peer_verhex)?
            }
        };

        let mut offset = 0usize;
        let body_bytes = read_section(&plaintext_payload, &mut offset)
            .map_err(|_| ParseInnerError::BodyDecode("malformed plaintext payload".into()))?
            .to_vec();
        let foot_bytes = read_section(&plaintext_payload, &mut offset)
            .map_err(|_| ParseInnerError::BodyDecode("malformed plaintext payload".into()))?
            .to_vec();

        if self.header.fk == FootKind::Nacl {
            let mut signed_msg = header_bytes;
            signed_msg.extend_from_slice(&body_bytes);
            if !verifier.verify(&signed_msg, &foot_bytes, peer_verhex) {
                return Err(ParseInnerError::BadSignature);
            }
        }

        decode_body(&body_bytes, self.header.bk)
    }
}
