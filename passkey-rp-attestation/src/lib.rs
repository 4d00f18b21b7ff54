//! # Passkey RP Attestation
//!
//! Decoding and verification of the attestation statements an authenticator returns when a
//! credential is created.
//!
//! The attestation object's `fmt` names one of seven statement formats. Each has its own
//! statement record and its own verification procedure:
//!
//! | format | record | trust model |
//! |---|---|---|
//! | `none` | [`NoneStatement`] | nothing is attested |
//! | `packed` | [`PackedStatement`] | self attestation or a certificate chain |
//! | `tpm` | [`TpmStatement`] | an attestation identity key certified by a TPM vendor |
//! | `android-key` | [`AndroidKeyStatement`] | Android hardware keystore chain |
//! | `android-safetynet` | [`AndroidSafetyNetStatement`] | a signed SafetyNet verdict |
//! | `fido-u2f` | [`FidoU2fStatement`] | a U2F batch certificate |
//! | `apple` | [`AppleStatement`] | Apple's anonymous attestation CA |
//!
//! Decoding only checks the shape of a statement. Verification is done by an
//! [`AttestationVerifier`] which carries the trust anchors and policies.
//!
//! ```no_run
//! # use passkey_rp_attestation::{AttestationStatement, AttestationVerifier, TrustAnchors};
//! # use passkey_rp_types::ctap2::AttestationObject;
//! # fn example(bytes: &[u8], client_data_hash: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let object = AttestationObject::from_slice(bytes)?;
//! let statement = AttestationStatement::from_attestation_object(&object)?;
//! let verifier = AttestationVerifier::new(TrustAnchors::new().with_well_known_roots());
//! let result = verifier.verify(&statement, &object.auth_data, client_data_hash, chrono::Utc::now())?;
//! println!("{:?}", result.attestation_type);
//! # Ok(())
//! # }
//! ```

mod error;
mod formats;
mod trust;
mod x509;

pub mod crypto;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use passkey_rp_types::{
    cbor::BinaryNode,
    ctap2::{Aaguid, AttestationObject, AttestedCredentialData, AuthenticatorData},
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

pub use self::{
    error::{StatementDecodeError, VerificationError},
    formats::{
        AndroidKeyStatement, AndroidSafetyNetStatement, AppleStatement, FidoU2fStatement,
        NoneStatement, PackedStatement, SafetyNetPolicy, TpmStatement,
    },
    trust::{KnownTpmManufacturers, TpmManufacturerOverride, TpmManufacturerPolicy, TrustAnchors},
};

/// The registered attestation statement format identifiers.
///
/// <https://www.iana.org/assignments/webauthn/webauthn.xhtml#webauthn-attestation-statement-format-ids>
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum AttestationFormat {
    /// No attestation.
    #[strum(serialize = "none")]
    #[serde(rename = "none")]
    None,
    /// The WebAuthn optimized format.
    #[strum(serialize = "packed")]
    #[serde(rename = "packed")]
    Packed,
    /// Trusted Platform Module attestation.
    #[strum(serialize = "tpm")]
    #[serde(rename = "tpm")]
    Tpm,
    /// Android hardware backed keystore attestation.
    #[strum(serialize = "android-key")]
    #[serde(rename = "android-key")]
    AndroidKey,
    /// Android SafetyNet attestation.
    #[strum(serialize = "android-safetynet")]
    #[serde(rename = "android-safetynet")]
    AndroidSafetyNet,
    /// Legacy U2F authenticators.
    #[strum(serialize = "fido-u2f")]
    #[serde(rename = "fido-u2f")]
    FidoU2f,
    /// Apple anonymous attestation.
    #[strum(serialize = "apple")]
    #[serde(rename = "apple")]
    Apple,
}

/// What the attestation says about the provenance of the credential.
///
/// Each format reports one type: `none` is [`None`](Self::None), `packed` is
/// [`Self_`](Self::Self_) without a chain and [`Basic`](Self::Basic) with one, `fido-u2f`,
/// `android-key` and `android-safetynet` are [`Basic`](Self::Basic), `tpm` is
/// [`AttCa`](Self::AttCa) and `apple` is [`AnonCa`](Self::AnonCa).
///
/// <https://w3c.github.io/webauthn/#sctn-attestation-types>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationType {
    /// Nothing was attested.
    None,
    /// The credential signed its own attestation.
    #[serde(rename = "self")]
    Self_,
    /// Signed by an authenticator batch key.
    ///
    /// Also reported for `android-safetynet`: the Google-signed JWS vouches for the device, not
    /// for a per-credential anonymization CA, so the chain is treated like a batch certificate.
    Basic,
    /// Signed by a key certified by an attestation CA.
    #[serde(rename = "attca")]
    AttCa,
    /// Signed by a per-credential key from an anonymization CA.
    #[serde(rename = "anonca")]
    AnonCa,
}

/// The verdict of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationVerificationResult {
    /// The format that was verified.
    pub format: AttestationFormat,
    /// The attestation type established by the statement.
    pub attestation_type: AttestationType,
    /// DER certificates, leaf first. Empty for none and self attestation.
    pub trust_path: Vec<Vec<u8>>,
    /// The AAGUID from the attested credential data.
    pub aaguid: Aaguid,
}

/// A decoded attestation statement, one variant per format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationStatement {
    /// `none`
    None(NoneStatement),
    /// `packed`
    Packed(PackedStatement),
    /// `tpm`
    Tpm(TpmStatement),
    /// `android-key`
    AndroidKey(AndroidKeyStatement),
    /// `android-safetynet`
    AndroidSafetyNet(AndroidSafetyNetStatement),
    /// `fido-u2f`
    FidoU2f(FidoU2fStatement),
    /// `apple`
    Apple(AppleStatement),
}

impl AttestationStatement {
    /// Decode `att_stmt` as a statement of `format`.
    pub fn decode(
        format: AttestationFormat,
        att_stmt: &BinaryNode,
    ) -> Result<Self, StatementDecodeError> {
        let statement = match format {
            AttestationFormat::None => Self::None(NoneStatement::decode(att_stmt)?),
            AttestationFormat::Packed => Self::Packed(PackedStatement::decode(att_stmt)?),
            AttestationFormat::Tpm => Self::Tpm(TpmStatement::decode(att_stmt)?),
            AttestationFormat::AndroidKey => {
                Self::AndroidKey(AndroidKeyStatement::decode(att_stmt)?)
            }
            AttestationFormat::AndroidSafetyNet => {
                Self::AndroidSafetyNet(AndroidSafetyNetStatement::decode(att_stmt)?)
            }
            AttestationFormat::FidoU2f => Self::FidoU2f(FidoU2fStatement::decode(att_stmt)?),
            AttestationFormat::Apple => Self::Apple(AppleStatement::decode(att_stmt)?),
        };
        Ok(statement)
    }

    /// Decode the statement of an attestation object, dispatching on its `fmt`.
    pub fn from_attestation_object(object: &AttestationObject) -> Result<Self, StatementDecodeError> {
        let format = object
            .fmt
            .parse()
            .map_err(|_| StatementDecodeError::UnknownFormat(object.fmt.clone()))?;
        Self::decode(format, &object.att_stmt)
    }

    /// The format of this statement.
    pub fn format(&self) -> AttestationFormat {
        match self {
            AttestationStatement::None(_) => AttestationFormat::None,
            AttestationStatement::Packed(_) => AttestationFormat::Packed,
            AttestationStatement::Tpm(_) => AttestationFormat::Tpm,
            AttestationStatement::AndroidKey(_) => AttestationFormat::AndroidKey,
            AttestationStatement::AndroidSafetyNet(_) => AttestationFormat::AndroidSafetyNet,
            AttestationStatement::FidoU2f(_) => AttestationFormat::FidoU2f,
            AttestationStatement::Apple(_) => AttestationFormat::Apple,
        }
    }
}

/// Everything a format verifier gets to look at.
pub(crate) struct VerificationContext<'a> {
    pub auth_data: &'a AuthenticatorData,
    pub credential: &'a AttestedCredentialData,
    pub client_data_hash: &'a [u8],
    pub now: DateTime<Utc>,
    pub verifier: &'a AttestationVerifier,
}

impl VerificationContext<'_> {
    /// `authenticatorData || clientDataHash`, what most statements sign.
    pub fn signed_data(&self) -> Vec<u8> {
        self.auth_data.signed_data(self.client_data_hash)
    }

    pub fn result(
        &self,
        format: AttestationFormat,
        attestation_type: AttestationType,
        trust_path: Vec<Vec<u8>>,
    ) -> AttestationVerificationResult {
        AttestationVerificationResult {
            format,
            attestation_type,
            trust_path,
            aaguid: self.credential.aaguid,
        }
    }

    /// Check `x5c` against the anchors of `format` plus `extra` roots.
    pub fn verify_chain(
        &self,
        format: AttestationFormat,
        x5c: &[Vec<u8>],
        extra: &[Vec<u8>],
    ) -> Result<(), VerificationError> {
        let mut anchors = self.verifier.trust_anchors.roots_for(format);
        anchors.extend(extra.iter().map(Vec::as_slice));
        x509::verify_chain(x5c, &anchors, self.now)
    }
}

/// Verifies attestation statements against injected trust anchors and policies.
///
/// The verifier holds no mutable state and can be shared between requests.
#[derive(Clone)]
pub struct AttestationVerifier {
    trust_anchors: TrustAnchors,
    tpm_manufacturers: Arc<dyn TpmManufacturerPolicy>,
    safetynet: SafetyNetPolicy,
    enabled_formats: Vec<AttestationFormat>,
}

impl std::fmt::Debug for AttestationVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationVerifier")
            .field("trust_anchors", &self.trust_anchors)
            .field("safetynet", &self.safetynet)
            .field("enabled_formats", &self.enabled_formats)
            .finish_non_exhaustive()
    }
}

impl AttestationVerifier {
    /// A verifier with every format enabled, the registered TPM vendors and the default
    /// SafetyNet policy.
    pub fn new(trust_anchors: TrustAnchors) -> Self {
        Self {
            trust_anchors,
            tpm_manufacturers: Arc::new(KnownTpmManufacturers),
            safetynet: SafetyNetPolicy::default(),
            enabled_formats: AttestationFormat::iter().collect(),
        }
    }

    /// Replace the TPM manufacturer policy.
    pub fn with_tpm_manufacturer_policy(
        mut self,
        policy: impl TpmManufacturerPolicy + 'static,
    ) -> Self {
        self.tpm_manufacturers = Arc::new(policy);
        self
    }

    /// Replace the SafetyNet policy.
    pub fn with_safetynet_policy(mut self, policy: SafetyNetPolicy) -> Self {
        self.safetynet = policy;
        self
    }

    /// Only verify the given formats, all others fail with
    /// [`VerificationError::FormatDisabled`].
    pub fn with_enabled_formats(
        mut self,
        formats: impl IntoIterator<Item = AttestationFormat>,
    ) -> Self {
        self.enabled_formats = formats.into_iter().collect();
        self
    }

    /// The configured trust anchors.
    pub fn trust_anchors(&self) -> &TrustAnchors {
        &self.trust_anchors
    }

    /// Whether statements of `format` are verified at all.
    pub fn is_enabled(&self, format: AttestationFormat) -> bool {
        self.enabled_formats.contains(&format)
    }

    /// Verify `statement` for the credential in `auth_data`.
    ///
    /// `client_data_hash` is the SHA-256 of the client data JSON and `now` is the instant
    /// certificate validity and SafetyNet freshness are judged at.
    pub fn verify(
        &self,
        statement: &AttestationStatement,
        auth_data: &AuthenticatorData,
        client_data_hash: &[u8],
        now: DateTime<Utc>,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        let format = statement.format();
        if !self.is_enabled(format) {
            return Err(VerificationError::FormatDisabled(format));
        }
        let credential = auth_data
            .attested_credential_data
            .as_ref()
            .ok_or(VerificationError::MissingAttestedCredentialData)?;

        let ctx = VerificationContext {
            auth_data,
            credential,
            client_data_hash,
            now,
            verifier: self,
        };

        let result = match statement {
            AttestationStatement::None(stmt) => stmt.verify(&ctx),
            AttestationStatement::Packed(stmt) => stmt.verify(&ctx),
            AttestationStatement::Tpm(stmt) => stmt.verify(&ctx, self.tpm_manufacturers.as_ref()),
            AttestationStatement::AndroidKey(stmt) => stmt.verify(&ctx),
            AttestationStatement::AndroidSafetyNet(stmt) => stmt.verify(&ctx, &self.safetynet),
            AttestationStatement::FidoU2f(stmt) => stmt.verify(&ctx),
            AttestationStatement::Apple(stmt) => stmt.verify(&ctx),
        };

        match &result {
            Ok(verdict) => log::debug!(
                "{format} attestation verified as {:?}",
                verdict.attestation_type
            ),
            Err(e) => log::debug!("{format} attestation rejected: {e}"),
        }
        result
    }
}
