//! Common types used in both Attestation (registration) and Assertion (authentication).

use serde::{Deserialize, Serialize};

use crate::{
    utils::serde::{ignore_unknown, ignore_unknown_opt_vec},
    Bytes,
};

#[cfg(doc)]
use crate::webauthn::{
    AuthenticatorAttestationResponse, PublicKeyCredentialCreationOptions,
    PublicKeyCredentialRequestOptions,
};

/// The valid credential types. Unknown values deserialize to [`PublicKeyCredentialType::Unknown`]
/// so they can be filtered out instead of failing the whole payload.
///
/// <https://w3c.github.io/webauthn/#enumdef-publickeycredentialtype>
#[derive(Debug, Default, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PublicKeyCredentialType {
    /// The only type currently defined.
    PublicKey,
    /// Anything else
    #[default]
    Unknown,
}

/// Identifies a credential in [`PublicKeyCredentialCreationOptions::exclude_credentials`] and
/// [`PublicKeyCredentialRequestOptions::allow_credentials`].
///
/// <https://w3c.github.io/webauthn/#dictdef-publickeycredentialdescriptor>
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyCredentialDescriptor {
    /// The type of the credential.
    #[serde(rename = "type", deserialize_with = "ignore_unknown")]
    pub ty: PublicKeyCredentialType,

    /// The credential id.
    pub id: Bytes,

    /// How the client might reach the authenticator, as stored from
    /// [`AuthenticatorAttestationResponse::transports`] at registration.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "ignore_unknown_opt_vec"
    )]
    pub transports: Option<Vec<AuthenticatorTransport>>,
}

impl PublicKeyCredentialDescriptor {
    /// A public key credential descriptor for `id`.
    pub fn new(id: impl Into<Bytes>, transports: Option<Vec<AuthenticatorTransport>>) -> Self {
        Self {
            ty: PublicKeyCredentialType::PublicKey,
            id: id.into(),
            transports,
        }
    }

    /// Whether [`Self::ty`] is a known type.
    pub fn is_known(&self) -> bool {
        match self.ty {
            PublicKeyCredentialType::PublicKey => true,
            PublicKeyCredentialType::Unknown => false,
        }
    }
}

/// The relying party's requirement for [user verification].
///
/// <https://w3c.github.io/webauthn/#enumdef-userverificationrequirement>
///
/// [user verification]: https://w3c.github.io/webauthn/#user-verification
#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    /// The ceremony fails unless the UV flag is set.
    Required,

    /// User verification is wanted but its absence does not fail the ceremony.
    #[default]
    Preferred,

    /// User verification should not be performed.
    Discouraged,
}

/// Transports an authenticator may be reachable over.
///
/// <https://w3c.github.io/webauthn/#enum-transport>
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorTransport {
    /// Removable USB.
    Usb,

    /// Near Field Communication.
    Nfc,

    /// Bluetooth Low Energy.
    Ble,

    /// A smart card reader.
    SmartCard,

    /// A combination of data-transport and proximity mechanisms, such as signing in on a desktop
    /// with a phone.
    #[serde(alias = "cable")]
    Hybrid,

    /// A platform authenticator, not removable from the client device.
    Internal,
}

/// An authenticator's attachment modality.
///
/// <https://w3c.github.io/webauthn/#enumdef-authenticatorattachment>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    /// Built into the client device.
    Platform,

    /// Removable and able to roam between client devices.
    CrossPlatform,
}

/// Hints to the user agent about how a request may be best completed, in decreasing order of
/// preference.
///
/// <https://w3c.github.io/webauthn/#enum-hints>
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum PublicKeyCredentialHints {
    /// A physical security key.
    SecurityKey,

    /// A platform authenticator attached to the client device.
    ClientDevice,

    /// A general-purpose authenticator such as a smartphone.
    Hybrid,
}
