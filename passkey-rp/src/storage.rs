use std::collections::HashMap;

use chrono::{DateTime, Utc};
use passkey_rp_types::{
    cose::CoseAlgorithm,
    encoding,
    rand::random_vec,
    webauthn::{
        AttestationConveyancePreference, PublicKeyCredentialUserEntity,
        UserVerificationRequirement,
    },
    Bytes,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::StorageError;

/// What `begin_registration` remembers until the response comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationCeremonyParameters {
    /// The issued challenge.
    pub challenge: Bytes,
    /// The RP ID the credential is scoped to.
    pub rp_id: String,
    /// Allowed origins, serialized. Empty means any origin on the RP ID.
    pub origins: Vec<String>,
    /// Allowed top level origins for cross-origin requests.
    pub top_origins: Vec<String>,
    /// The account the credential is created for.
    pub user: PublicKeyCredentialUserEntity,
    /// Algorithms that were offered.
    pub algorithms: Vec<CoseAlgorithm>,
    /// Credential ids that must not be registered again.
    pub excluded_credentials: Vec<Bytes>,
    /// The user verification requirement.
    pub user_verification: UserVerificationRequirement,
    /// The attestation that was asked for.
    pub attestation: AttestationConveyancePreference,
    /// When the ceremony began.
    pub created_at: DateTime<Utc>,
    /// When the ceremony stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// What `begin_authentication` remembers until the response comes back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationCeremonyParameters {
    /// The issued challenge.
    pub challenge: Bytes,
    /// The RP ID assertions must be scoped to.
    pub rp_id: String,
    /// Allowed origins, serialized. Empty means any origin on the RP ID.
    pub origins: Vec<String>,
    /// Allowed top level origins for cross-origin requests.
    pub top_origins: Vec<String>,
    /// The user the ceremony was started for, absent for discoverable credentials.
    pub user_handle: Option<Bytes>,
    /// Credential ids that may be used. Empty allows any credential.
    pub allow_credentials: Vec<Bytes>,
    /// The user verification requirement.
    pub user_verification: UserVerificationRequirement,
    /// When the ceremony began.
    pub created_at: DateTime<Utc>,
    /// When the ceremony stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// An in-flight ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CeremonyParameters {
    /// A registration ceremony.
    Registration(RegistrationCeremonyParameters),
    /// An authentication ceremony.
    Authentication(AuthenticationCeremonyParameters),
}

impl CeremonyParameters {
    /// When the ceremony stops being valid.
    pub fn expires_at(&self) -> DateTime<Utc> {
        match self {
            CeremonyParameters::Registration(params) => params.expires_at,
            CeremonyParameters::Authentication(params) => params.expires_at,
        }
    }

    /// Whether the ceremony is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Persistence of in-flight ceremonies.
///
/// Every record is single use: [`CeremonyStorage::find_and_consume`] must remove the record in the
/// same atomic step that reads it, so that of two concurrent completions of one ceremony exactly
/// one sees it.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait CeremonyStorage: Send + Sync {
    /// Store a new ceremony and return its id.
    async fn save(&self, parameters: CeremonyParameters) -> Result<String, StorageError>;

    /// Remove and return the ceremony with `id`.
    ///
    /// `Ok(None)` means there is no such ceremony. Errors are reserved for backend failures and
    /// records that can not be read.
    async fn find_and_consume(&self, id: &str) -> Result<Option<CeremonyParameters>, StorageError>;

    /// Remove every ceremony expired at `now`, returning how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError>;
}

/// In-memory ceremony storage.
///
/// Useful for tests and single process deployments.
#[derive(Debug, Default)]
pub struct MemoryCeremonyStorage {
    ceremonies: Mutex<HashMap<String, CeremonyParameters>>,
}

impl MemoryCeremonyStorage {
    /// Length of a ceremony id in random bytes.
    pub const ID_LEN: usize = 16;

    /// An empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// How many ceremonies are in flight.
    pub async fn len(&self) -> usize {
        self.ceremonies.lock().await.len()
    }

    /// Whether no ceremony is in flight.
    pub async fn is_empty(&self) -> bool {
        self.ceremonies.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl CeremonyStorage for MemoryCeremonyStorage {
    async fn save(&self, parameters: CeremonyParameters) -> Result<String, StorageError> {
        let mut ceremonies = self.ceremonies.lock().await;
        let id = loop {
            let id = encoding::hex(&random_vec(Self::ID_LEN));
            if !ceremonies.contains_key(&id) {
                break id;
            }
        };
        ceremonies.insert(id.clone(), parameters);
        Ok(id)
    }

    async fn find_and_consume(&self, id: &str) -> Result<Option<CeremonyParameters>, StorageError> {
        Ok(self.ceremonies.lock().await.remove(id))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut ceremonies = self.ceremonies.lock().await;
        let before = ceremonies.len();
        ceremonies.retain(|_, params| !params.is_expired(now));
        Ok(before - ceremonies.len())
    }
}
