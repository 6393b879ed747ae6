//! Injectable signer/verifier/encryptor seams for RAET.
//!
//! The protocol spec treats cryptographic primitives as external
//! collaborators; this crate defines the traits the transaction state
//! machines are written against, plus one concrete nacl-family
//! implementation (`NaclLikeCrypto`) used as the stack default.

mod error;
mod nacl;
mod traits;

pub use error::{CryptoError, Result};
pub use nacl::{system_random, KeyPairBundle, NaclLikeCrypto};
pub use traits::{Encryptor, Signer, Verifier};
