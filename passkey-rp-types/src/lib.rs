//! # Passkey RP Types
//!
//! Wire types consumed by a WebAuthn relying party: a bounded binary tree (CBOR) decoder, the COSE
//! key codec, authenticator data and the attestation object envelope, and the JSON types exchanged
//! with the browser during a ceremony.

mod utils;

pub mod cbor;
pub mod cose;
pub mod ctap2;
pub mod webauthn;

// Re-exports
pub use utils::{
    bytes::{Bytes, NotBase64Encoded},
    crypto, encoding, rand,
};
