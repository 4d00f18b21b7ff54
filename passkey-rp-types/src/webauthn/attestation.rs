//! Types used to register a new credential.
//!
//! <https://w3c.github.io/webauthn/#sctn-registering-a-new-credential>

use serde::{Deserialize, Serialize};

use crate::{
    cose::CoseAlgorithm,
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec, ignore_unknown_vec},
    webauthn::common::{
        AuthenticatorAttachment, AuthenticatorTransport, PublicKeyCredentialDescriptor,
        PublicKeyCredentialHints, PublicKeyCredentialType, UserVerificationRequirement,
    },
    Bytes,
};

/// The options handed to `navigator.credentials.create()`.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialcreationoptions>
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialCreationOptions {
    /// The relying party responsible for the request.
    pub rp: PublicKeyCredentialRpEntity,

    /// The user account the credential is created for.
    pub user: PublicKeyCredentialUserEntity,

    /// The challenge the authenticator signs along with the new credential. It is generated by the
    /// relying party and stored with the ceremony.
    pub challenge: Bytes,

    /// Acceptable key types and algorithms, most preferred first.
    #[serde(deserialize_with = "ignore_unknown_vec")]
    pub pub_key_cred_params: Vec<PublicKeyCredentialParameters>,

    /// How long, in milliseconds, the relying party is willing to wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,

    /// Credentials already registered for the user, so the same authenticator is not registered
    /// twice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_credentials: Option<Vec<PublicKeyCredentialDescriptor>>,

    /// Requirements on the authenticator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,

    /// Hints to the user agent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub hints: Option<Vec<PublicKeyCredentialHints>>,

    /// The relying party's interest in attestation.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub attestation: AttestationConveyancePreference,

    /// Preferred attestation statement formats, most preferred first.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub attestation_formats: Option<Vec<AttestationStatementFormatIdentifiers>>,
}

/// The relying party attributes sent at registration.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialrpentity>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublicKeyCredentialRpEntity {
    /// The RP ID the credential is scoped to. When absent the client uses the caller's effective
    /// domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// A human-palatable name for the relying party.
    pub name: String,
}

/// The user account attributes sent at registration.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialuserentity>
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKeyCredentialUserEntity {
    /// The user handle, at most 64 bytes and free of personally identifying information.
    pub id: Bytes,

    /// A human-palatable name intended only for display.
    pub display_name: String,

    /// A human-palatable identifier such as a username.
    pub name: String,
}

/// A credential type and algorithm the relying party accepts.
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialparameters>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublicKeyCredentialParameters {
    /// The type of credential to create.
    #[serde(rename = "type")]
    pub ty: PublicKeyCredentialType,

    /// The signature algorithm of the new credential.
    pub alg: CoseAlgorithm,
}

impl PublicKeyCredentialParameters {
    /// Public key parameters for `alg`.
    pub fn new(alg: CoseAlgorithm) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            alg,
        }
    }
}

/// Requirements on the authenticator used to create the credential.
///
/// <https://w3c.github.io/webauthn/#dictdef-authenticatorselectioncriteria>
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelectionCriteria {
    /// Restrict eligible authenticators to an attachment modality.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub authenticator_attachment: Option<AuthenticatorAttachment>,

    /// How much the relying party wants a discoverable credential.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown"
    )]
    pub resident_key: Option<ResidentKeyRequirement>,

    /// Kept for WebAuthn Level 1 clients, true only when [`Self::resident_key`] is `required`.
    #[serde(default)]
    pub require_resident_key: bool,

    /// The user verification requirement of the ceremony.
    #[serde(default, deserialize_with = "ignore_unknown")]
    pub user_verification: UserVerificationRequirement,
}

/// The relying party's requirement for a [discoverable credential].
///
/// <https://w3c.github.io/webauthn/#enumdef-residentkeyrequirement>
///
/// [discoverable credential]: https://w3c.github.io/webauthn/#client-side-discoverable-credential
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    /// A server-side credential is preferred.
    Discouraged,

    /// A discoverable credential is strongly preferred.
    Preferred,

    /// A discoverable credential is required.
    Required,
}

/// The relying party's preference regarding [attestation conveyance].
///
/// <https://w3c.github.io/webauthn/#enumdef-attestationconveyancepreference>
///
/// [attestation conveyance]: https://w3c.github.io/webauthn/#attestation-conveyance
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    /// Not interested in attestation, the client may replace it with a `none` statement.
    #[default]
    None,

    /// A verifiable statement is wanted but the client may anonymize it.
    Indirect,

    /// The statement exactly as the authenticator generated it.
    Direct,

    /// An attestation that may uniquely identify the authenticator, for managed deployments.
    Enterprise,
}

/// Registered attestation statement format identifiers.
///
/// <https://w3c.github.io/webauthn/#sctn-attstn-fmt-ids>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AttestationStatementFormatIdentifiers {
    /// `packed`
    Packed,
    /// `tpm`
    Tpm,
    /// `android-key`
    AndroidKey,
    /// `android-safetynet`
    AndroidSafetynet,
    /// `fido-u2f`
    FidoU2f,
    /// `apple`
    Apple,
    /// `none`
    None,
}

/// The authenticator's response to `create()`.
///
/// Only the client data and the attestation object are signed. The other members are
/// conveniences some clients add, and some send them as `null`.
///
/// <https://w3c.github.io/webauthn/#iface-authenticatorattestationresponse>
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    /// The JSON serialization of the [`CollectedClientData`](crate::webauthn::CollectedClientData)
    /// the authenticator signed over, via its hash.
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Bytes,

    /// A copy of the authenticator data inside [`Self::attestation_object`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_data: Option<Bytes>,

    /// The DER SubjectPublicKeyInfo of the new credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Bytes>,

    /// The COSE algorithm identifier of the new credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_algorithm: Option<i64>,

    /// The attestation object, carrying the authenticator data and the attestation statement.
    pub attestation_object: Bytes,

    /// Transports the authenticator is believed to support.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}
