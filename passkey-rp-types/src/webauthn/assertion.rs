//! Types used to authenticate with an existing credential.
//!
//! <https://w3c.github.io/webauthn/#sctn-verifying-assertion>

use serde::{Deserialize, Serialize};

use crate::{
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec},
    webauthn::common::{
        PublicKeyCredentialDescriptor, PublicKeyCredentialHints, UserVerificationRequirement,
    },
    Bytes,
};

/// The options handed to `navigator.credentials.get()`.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrequestoptions>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialRequestOptions {
    /// The challenge the authenticator signs.
    pub challenge: Bytes,

    /// How long, in milliseconds, the relying party is willing to wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,

    /// The RP ID the credential must be scoped to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rp_id: Option<String>,

    /// Credentials acceptable to the relying party, most preferred first. Absent for discoverable
    /// credential flows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// The user verification requirement of the ceremony.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub user_verification: UserVerificationRequirement,

    /// Hints to the user agent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub hints: Option<Vec<PublicKeyCredentialHints>>,
}

/// The authenticator's response to `get()`.
///
/// <https://w3c.github.io/webauthn/#iface-authenticatorassertionresponse>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    /// The JSON serialization of the client data passed to the authenticator.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,

    /// The authenticator data returned by the authenticator.
    pub authenticator_data: Bytes,

    /// The signature over `authenticatorData || SHA-256(clientDataJSON)`.
    pub signature: Bytes,

    /// The user handle the credential was created with. Some clients send an empty value when
    /// there is none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Bytes>,

    /// Present when the relying party asked for attestation during authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation_object: Option<Bytes>,
}
