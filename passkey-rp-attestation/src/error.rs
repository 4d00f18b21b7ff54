use passkey_rp_types::cose::CoseAlgorithm;

use crate::AttestationFormat;

/// Errors produced while reading an attestation statement into its format specific record.
///
/// No cryptography happens at this stage, these only describe the shape of the statement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatementDecodeError {
    /// The `fmt` string is not a known statement format.
    #[error("unknown attestation statement format `{0}`")]
    UnknownFormat(String),
    /// The statement is not a map.
    #[error("attestation statement is not a map")]
    NotAMap,
    /// A field required by the format is absent.
    #[error("attestation statement is missing `{0}`")]
    MissingField(&'static str),
    /// A field is present with the wrong type or an empty value.
    #[error("attestation statement field `{0}` has an invalid type")]
    InvalidFieldType(&'static str),
    /// A field holds a value outside of what the format allows.
    #[error("attestation statement field `{field}` has unsupported value `{value}`")]
    InvalidEnumValue {
        /// Name of the offending field
        field: &'static str,
        /// The value that was found
        value: String,
    },
    /// A field the format does not define is present.
    #[error("attestation statement has unexpected field `{0}`")]
    UnexpectedField(String),
}

/// Reasons an attestation statement failed verification.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    /// The format is known but verification of it was switched off.
    #[error("attestation format `{0}` is disabled")]
    FormatDisabled(AttestationFormat),
    /// The authenticator data has no attested credential data to verify against.
    #[error("authenticator data carries no attested credential data")]
    MissingAttestedCredentialData,
    /// A signature did not verify.
    #[error("invalid signature over {0}")]
    InvalidSignature(&'static str),
    /// The signature algorithm can not be used, either it is unknown or it does not fit the key.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// A self attestation used a different algorithm than the credential.
    #[error("statement algorithm {statement:?} does not match credential algorithm {credential:?}")]
    AlgorithmMismatch {
        /// Algorithm named by the statement
        statement: CoseAlgorithm,
        /// Algorithm of the credential public key
        credential: CoseAlgorithm,
    },
    /// A public key could not be turned into a verifying key.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(&'static str),
    /// A certificate could not be parsed.
    #[error("malformed certificate: {0}")]
    MalformedCertificate(String),
    /// A certificate in the path is outside of its validity period.
    #[error("certificate `{0}` is not valid at the verification time")]
    CertificateNotValid(String),
    /// A certificate does not meet the requirements of the statement format.
    #[error("certificate requirement not met: {0}")]
    CertificateRequirement(&'static str),
    /// The certificate path does not end at a configured trust anchor.
    #[error("untrusted certificate chain: {0}")]
    UntrustedChain(&'static str),
    /// A required certificate extension is absent.
    #[error("certificate extension {0} is missing")]
    MissingExtension(&'static str),
    /// A certificate extension holds a value that contradicts the attestation.
    #[error("certificate extension mismatch: {0}")]
    ExtensionMismatch(&'static str),
    /// The nonce binding the attestation to this ceremony does not match.
    #[error("attestation nonce does not match")]
    NonceMismatch,
    /// The AAGUID of the authenticator does not match the attestation.
    #[error("AAGUID mismatch")]
    AaguidMismatch,
    /// The attested public key is not the credential public key.
    #[error("attested public key does not match the credential public key")]
    PublicKeyMismatch,
    /// A TPM structure could not be parsed.
    #[error("malformed TPM structure: {0}")]
    TpmStructure(&'static str),
    /// A TPM structure contradicts the rest of the attestation.
    #[error("TPM attestation mismatch: {0}")]
    TpmMismatch(&'static str),
    /// The TPM vendor is not one of the accepted manufacturers.
    #[error("unknown TPM manufacturer `{0}`")]
    UnknownTpmManufacturer(String),
    /// The SafetyNet response is not a well formed compact JWS.
    #[error("malformed SafetyNet response: {0}")]
    MalformedJws(&'static str),
    /// The SafetyNet response violates the configured policy.
    #[error("SafetyNet policy violation: {0}")]
    SafetyNetPolicy(&'static str),
}
