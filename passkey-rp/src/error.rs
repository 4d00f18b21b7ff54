use passkey_rp_attestation::{StatementDecodeError, VerificationError};
use passkey_rp_types::{
    cbor::DecodeError,
    cose::KeyDecodeError,
    ctap2::{AttestationObjectError, AuthenticatorDataError},
};
use serde::Serialize;

/// A response that is well formed but does not satisfy the ceremony.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The credential `type` is not `public-key`.
    #[error("credential type is not public-key")]
    InvalidCredentialType,
    /// `clientDataJSON` is not the expected JSON object.
    #[error("client data is malformed")]
    MalformedClientData,
    /// The client signed a different challenge than the one issued.
    #[error("challenge does not match")]
    ChallengeMismatch,
    /// The client data origin is not allowed for this relying party.
    #[error("origin `{0}` is not allowed")]
    OriginNotAllowed(String),
    /// The request came from a cross-origin iframe and no top level origin is allowed.
    #[error("cross origin requests are not allowed")]
    CrossOriginNotAllowed,
    /// `type` in the client data is for the other ceremony.
    #[error("client data type is `{received}`, expected `{expected}`")]
    ClientDataTypeMismatch {
        /// The type this ceremony requires
        expected: &'static str,
        /// The type that was sent
        received: &'static str,
    },
    /// The authenticator data is scoped to a different RP ID.
    #[error("RP ID hash does not match")]
    RpIdHashMismatch,
    /// The UP flag is not set.
    #[error("user was not present")]
    UserNotPresent,
    /// User verification was required but the UV flag is not set.
    #[error("user was not verified")]
    UserNotVerified,
    /// The BS flag is set without BE.
    #[error("backup state is set on a credential that is not backup eligible")]
    InvalidBackupState,
    /// `rawId` is not the credential id in the authenticator data.
    #[error("credential id does not match the attested credential")]
    CredentialIdMismatch,
    /// The credential key uses an algorithm that was not offered.
    #[error("credential algorithm was not offered")]
    AlgorithmNotAllowed,
    /// The credential id is excluded or already registered.
    #[error("credential is already registered")]
    CredentialAlreadyRegistered,
    /// The credential is not in the allow list of the ceremony.
    #[error("credential is not allowed for this ceremony")]
    CredentialNotAllowed,
    /// The user handle does not belong to the credential or the ceremony.
    #[error("user handle does not match")]
    UserHandleMismatch,
    /// A discoverable credential assertion without a user handle.
    #[error("user handle is missing")]
    MissingUserHandle,
    /// The signature counter did not grow.
    #[error("signature counter went from {stored} to {received}, the credential may be cloned")]
    CounterRegression {
        /// Counter in the credential record
        stored: u32,
        /// Counter in the assertion
        received: u32,
    },
    /// The verified attestation type is not accepted by policy.
    #[error("attestation type is not acceptable")]
    AttestationTypeNotAcceptable,
    /// Registration was requested without any algorithm to offer.
    #[error("no public key algorithms to offer")]
    NoAlgorithms,
    /// An authentication of all of a user's credentials was requested without a user.
    #[error("a user handle is required to list existing credentials")]
    UserHandleRequired,
}

/// A failure of the storage backend, as opposed to a record simply being absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The backend could not be reached or failed the operation.
    #[error("storage backend failure: {0}")]
    Backend(String),
    /// A stored record could not be read back.
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
    /// A credential with the same id is already stored.
    #[error("credential id is already stored")]
    CredentialExists,
}

/// The single terminal error of a ceremony.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CeremonyError {
    /// Malformed CBOR in the response.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The credential public key could not be decoded.
    #[error(transparent)]
    KeyDecode(#[from] KeyDecodeError),
    /// The authenticator data is malformed.
    #[error(transparent)]
    AuthenticatorData(AuthenticatorDataError),
    /// The attestation object envelope is malformed.
    #[error(transparent)]
    AttestationObject(AttestationObjectError),
    /// The attestation statement does not fit its format.
    #[error(transparent)]
    StatementDecode(#[from] StatementDecodeError),
    /// The attestation statement did not verify.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// The response does not satisfy the ceremony.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// No such ceremony, or it was already completed.
    #[error("ceremony not found")]
    CeremonyNotFound,
    /// The ceremony timed out before it was completed.
    #[error("ceremony expired")]
    CeremonyExpired,
    /// The asserted credential is not registered.
    #[error("credential not found")]
    CredentialNotFound,
}

impl From<AuthenticatorDataError> for CeremonyError {
    fn from(error: AuthenticatorDataError) -> Self {
        match error {
            AuthenticatorDataError::CredentialPublicKey(key) => CeremonyError::KeyDecode(key),
            AuthenticatorDataError::Extensions(decode) => CeremonyError::Decode(decode),
            other => CeremonyError::AuthenticatorData(other),
        }
    }
}

impl From<AttestationObjectError> for CeremonyError {
    fn from(error: AttestationObjectError) -> Self {
        match error {
            AttestationObjectError::Decode(decode) => CeremonyError::Decode(decode),
            AttestationObjectError::AuthenticatorData(auth_data) => auth_data.into(),
            other => CeremonyError::AttestationObject(other),
        }
    }
}

/// A stable discriminant of [`CeremonyError`] for callers that map failures to responses or
/// metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CeremonyErrorKind {
    /// [`CeremonyError::Decode`], [`CeremonyError::AuthenticatorData`] and
    /// [`CeremonyError::AttestationObject`]
    Decode,
    /// [`CeremonyError::KeyDecode`]
    KeyDecode,
    /// [`CeremonyError::StatementDecode`]
    StatementDecode,
    /// [`CeremonyError::Verification`]
    Verification,
    /// [`CeremonyError::Protocol`]
    Protocol,
    /// [`CeremonyError::Storage`]
    Storage,
    /// [`CeremonyError::CeremonyNotFound`]
    CeremonyNotFound,
    /// [`CeremonyError::CeremonyExpired`]
    CeremonyExpired,
    /// [`CeremonyError::CredentialNotFound`]
    CredentialNotFound,
}

impl CeremonyError {
    /// The kind of this error.
    pub fn kind(&self) -> CeremonyErrorKind {
        match self {
            CeremonyError::Decode(_)
            | CeremonyError::AuthenticatorData(_)
            | CeremonyError::AttestationObject(_) => CeremonyErrorKind::Decode,
            CeremonyError::KeyDecode(_) => CeremonyErrorKind::KeyDecode,
            CeremonyError::StatementDecode(_) => CeremonyErrorKind::StatementDecode,
            CeremonyError::Verification(_) => CeremonyErrorKind::Verification,
            CeremonyError::Protocol(_) => CeremonyErrorKind::Protocol,
            CeremonyError::Storage(_) => CeremonyErrorKind::Storage,
            CeremonyError::CeremonyNotFound => CeremonyErrorKind::CeremonyNotFound,
            CeremonyError::CeremonyExpired => CeremonyErrorKind::CeremonyExpired,
            CeremonyError::CredentialNotFound => CeremonyErrorKind::CredentialNotFound,
        }
    }
}
