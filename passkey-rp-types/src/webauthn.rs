//! Implementation of the types defined in [WebAuthn Level 3] that a relying party exchanges with
//! the browser.
//!
//! Options are serialized and sent to the client, responses are deserialized from what the client
//! posts back. Deserialization is lenient wherever WebAuthn asks clients and relying
//! parties to ignore unknown values.
//!
//! [WebAuthn Level 3]: https://w3c.github.io/webauthn

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{utils::serde::ignore_unknown, Bytes};

mod assertion;
mod attestation;
mod client_data;
mod common;

// re-export types
pub use self::{assertion::*, attestation::*, client_data::*, common::*};

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::AuthenticatorAssertionResponse {}
    impl Sealed for super::AuthenticatorAttestationResponse {}
}

/// Marker trait for response types
pub trait AuthenticatorResponse: sealed::Sealed {}

impl AuthenticatorResponse for AuthenticatorAssertionResponse {}
impl AuthenticatorResponse for AuthenticatorAttestationResponse {}

/// The credential posted back by the client after a successful `create()` or `get()`.
///
/// Use the aliases depending on which ceremony is being completed:
/// * Registration: [`RegistrationResponse`]
/// * Authentication: [`AuthenticationResponse`]
///
/// <https://w3c.github.io/webauthn/#iface-pkcredential>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredential<R: AuthenticatorResponse> {
    /// The base64url encoding of [`Self::raw_id`].
    pub id: String,

    /// The credential id chosen by the authenticator.
    pub raw_id: Bytes,

    /// Must be [`PublicKeyCredentialType::PublicKey`], anything else fails the ceremony.
    #[serde(rename = "type", default, deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The authenticator's response.
    pub response: R,

    /// The modality of the communication between the client and authenticator.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// Client extension outputs. They are unsigned and only kept for the caller's inspection.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub client_extension_results: IndexMap<String, serde_json::Value>,
}

/// The credential returned by `navigator.credentials.create()`.
pub type RegistrationResponse = PublicKeyCredential<AuthenticatorAttestationResponse>;

/// The credential returned by `navigator.credentials.get()`.
pub type AuthenticationResponse = PublicKeyCredential<AuthenticatorAssertionResponse>;

#[cfg(test)]
mod tests;
