//! Default nacl-family signature + box suite, as named by the protocol's
//! `fk`/`ck` header fields: Ed25519 for signatures (mirroring the teacher's
//! `ring::signature` use in its own session-lease signing), X25519 for key
//! agreement, and ChaCha20-Poly1305 for the symmetric seal.

use crate::error::{CryptoError, Result};
use crate::traits::{Encryptor, Signer, Verifier};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ring::rand::SystemRandom;
use ring::signature::{self, Ed25519KeyPair, KeyPair};
use sha3::{Digest, Sha3_256};
use x25519_dalek::{PublicKey, StaticSecret};

const NONCE_LEN: usize = 12;

fn decode_hex(label: &'static str, hex_str: &str, expected: usize) -> Result<Vec<u8>> {
    let bytes = hex::decode(hex_str).map_err(CryptoError::InvalidHex)?;
    if bytes.len() != expected {
        return Err(CryptoError::WrongLength {
            expected,
            got: bytes.len(),
        });
    }
    let _ = label;
    Ok(bytes)
}

/// A local estate's two asymmetric keypairs: a long-term signing identity
/// and a session/encryption keypair, per the data model's local estate.
pub struct KeyPairBundle {
    signing_seed: [u8; 32],
    signing: Ed25519KeyPair,
    encryption: StaticSecret,
}

impl KeyPairBundle {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        use rand::RngCore;
        rand::thread_rng().fill_bytes(&mut seed);
        let signing = Ed25519KeyPair::from_seed_unchecked(&seed).expect("32-byte seed is valid");
        let encryption = StaticSecret::random_from_rng(rand::thread_rng());
        Self {
            signing_seed: seed,
            signing,
            encryption,
        }
    }

    pub fn from_hex(sighex: &str, prihex: &str) -> Result<Self> {
        let seed_bytes = decode_hex("sighex", sighex, 32)?;
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&seed_bytes);
        let signing = Ed25519KeyPair::from_seed_unchecked(&seed).expect("32-byte seed is valid");

        let pri_bytes = decode_hex("prihex", prihex, 32)?;
        let mut pri = [0u8; 32];
        pri.copy_from_slice(&pri_bytes);
        let encryption = StaticSecret::from(pri);

        Ok(Self {
            signing_seed: seed,
            signing,
            encryption,
        })
    }

    pub fn sighex(&self) -> String {
        hex::encode(self.signing_seed)
    }

    pub fn prihex(&self) -> String {
        hex::encode(self.encryption.to_bytes())
    }

    pub fn verhex(&self) -> String {
        hex::encode(self.signing.public_key().as_ref())
    }

    pub fn pubhex(&self) -> String {
        hex::encode(PublicKey::from(&self.encryption).as_bytes())
    }
}

/// The stack-default crypto implementation: Ed25519 signatures and an
/// X25519 + ChaCha20-Poly1305 box, selected by `Fk::Nacl`/`Ck::Nacl`.
pub struct NaclLikeCrypto {
    keys: KeyPairBundle,
}

impl NaclLikeCrypto {
    pub fn new(keys: KeyPairBundle) -> Self {
        Self { keys }
    }

    fn derive_key(shared_secret: &[u8]) -> Key {
        let mut hasher = Sha3_256::new();
        hasher.update(shared_secret);
        let digest = hasher.finalize();
        Key::clone_from_slice(&digest)
    }
}

impl Signer for NaclLikeCrypto {
    fn sign(&self, msg: &[u8]) -> Vec<u8> {
        self.keys.signing.sign(msg).as_ref().to_vec()
    }

    fn verify_key_hex(&self) -> String {
        self.keys.verhex()
    }
}

impl Verifier for NaclLikeCrypto {
    fn verify(&self, msg: &[u8], sig: &[u8], verhex: &str) -> bool {
        let Ok(verkey) = decode_hex("verhex", verhex, 32) else {
            return false;
        };
        signature::UnparsedPublicKey::new(&signature::ED25519, &verkey)
            .verify(msg, sig)
            .is_ok()
    }
}

impl Encryptor for NaclLikeCrypto {
    fn seal(&self, plaintext: &[u8], their_pubhex: &str) -> Result<Vec<u8>> {
        let their_pub_bytes = decode_hex("pubhex", their_pubhex, 32)?;
        let mut their_pub = [0u8; 32];
        their_pub.copy_from_slice(&their_pub_bytes);
        let their_pub = PublicKey::from(their_pub);

        let ephemeral = StaticSecret::random_from_rng(rand::thread_rng());
        let ephemeral_pub = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(&their_pub);

        let cipher = ChaCha20Poly1305::new(&Self::derive_key(shared.as_bytes()));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        {
            use rand::RngCore;
            rand::thread_rng().fill_bytes(&mut nonce_bytes);
        }
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CryptoError::SealFailed)?;

        let mut sealed = Vec::with_capacity(32 + NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(ephemeral_pub.as_bytes());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8], their_pubhex: &str) -> Result<Vec<u8>> {
        let _ = their_pubhex; // the sender's ephemeral key travels with the coat
        if sealed.len() < 32 + NONCE_LEN {
            return Err(CryptoError::OpenFailed("coat too short"));
        }
        let (ephemeral_pub_bytes, rest) = sealed.split_at(32);
        let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

        let mut ephemeral_pub = [0u8; 32];
        ephemeral_pub.copy_from_slice(ephemeral_pub_bytes);
        let ephemeral_pub = PublicKey::from(ephemeral_pub);

        let shared = self.keys.encryption.diffie_hellman(&ephemeral_pub);
        let cipher = ChaCha20Poly1305::new(&Self::derive_key(shared.as_bytes()));
        let nonce = Nonce::from_slice(nonce_bytes);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::OpenFailed("decryption failed"))
    }

    fn public_key_hex(&self) -> String {
        self.keys.pubhex()
    }
}

/// Random system entropy handle, kept around for callers that need raw
/// randomness outside the sealed-box path (e.g. generating a fresh
/// transaction id).
pub fn system_random() -> SystemRandom {
    SystemRandom::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let bundle = KeyPairBundle::generate();
        let verhex = bundle.verhex();
        let crypto = NaclLikeCrypto::new(bundle);

        let msg = b"join request";
        let sig = crypto.sign(msg);
        assert!(crypto.verify(msg, &sig, &verhex));
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let bundle = KeyPairBundle::generate();
        let verhex = bundle.verhex();
        let crypto = NaclLikeCrypto::new(bundle);

        let sig = crypto.sign(b"original");
        assert!(!crypto.verify(b"tampered", &sig, &verhex));
    }

    #[test]
    fn seal_and_open_round_trip() {
        let alice = KeyPairBundle::generate();
        let bob = KeyPairBundle::generate();
        let bob_pubhex = bob.pubhex();

        let alice_crypto = NaclLikeCrypto::new(alice);
        let bob_crypto = NaclLikeCrypto::new(bob);

        let plaintext = b"hello over the coat";
        let sealed = alice_crypto.seal(plaintext, &bob_pubhex).unwrap();
        let opened = bob_crypto.open(&sealed, &alice_crypto.public_key_hex()).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn open_rejects_truncated_coat() {
        let bob = KeyPairBundle::generate();
        let bob_crypto = NaclLikeCrypto::new(bob);
        assert!(bob_crypto.open(&[1, 2, 3], "").is_err());
    }

    #[test]
    fn keys_round_trip_through_hex() {
        let bundle = KeyPairBundle::generate();
        let sighex = bundle.sighex();
        let prihex = bundle.prihex();
        let verhex = bundle.verhex();
        let pubhex = bundle.pubhex();

        let restored = KeyPairBundle::from_hex(&sighex, &prihex).unwrap();
        assert_eq!(restored.verhex(), verhex);
        assert_eq!(restored.pubhex(), pubhex);
    }
}
