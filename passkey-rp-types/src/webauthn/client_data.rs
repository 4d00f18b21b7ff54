use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::encoding;

/// The client data the authenticator signs over, via its SHA-256 hash.
///
/// Browsers may add members in the future, so unknown keys are collected instead of rejected.
/// They are kept in order since the relying party verifies the hash of the bytes it received and
/// never re-serializes this structure.
///
/// <https://w3c.github.io/webauthn/#dictionary-client-data>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedClientData {
    /// Which ceremony produced this data.
    #[serde(rename = "type")]
    pub ty: ClientDataType,

    /// The base64url encoding of the challenge provided by the relying party.
    pub challenge: String,

    /// The fully qualified origin of the requester, per [RFC6454].
    ///
    /// [RFC6454]: https://www.rfc-editor.org/rfc/rfc6454
    pub origin: String,

    /// Whether the call was made from a cross-origin iframe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<bool>,

    /// The top level origin when [`Self::cross_origin`] is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_origin: Option<String>,

    /// Members this library does not know about, such as `androidPackageName`.
    #[serde(flatten)]
    pub unknown_keys: IndexMap<String, serde_json::Value>,
}

impl CollectedClientData {
    /// Parse the `clientDataJSON` bytes sent by the client.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Decode [`Self::challenge`], `None` if it is not valid base64url.
    pub fn challenge_bytes(&self) -> Option<Vec<u8>> {
        encoding::try_from_base64url(&self.challenge)
    }
}

/// The values of [`CollectedClientData::ty`].
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ClientDataType {
    /// `"webauthn.create"`
    #[serde(rename = "webauthn.create")]
    Create,

    /// `"webauthn.get"`
    #[serde(rename = "webauthn.get")]
    Get,

    /// `"payment.get"`, from the Secure Payment Confirmation specification.
    ///
    /// See <https://www.w3.org/TR/secure-payment-confirmation/#client-extension-processing-authentication>
    #[serde(rename = "payment.get")]
    PaymentGet,
}

impl ClientDataType {
    /// The wire value
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientDataType::Create => "webauthn.create",
            ClientDataType::Get => "webauthn.get",
            ClientDataType::PaymentGet => "payment.get",
        }
    }
}

impl fmt::Display for ClientDataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
