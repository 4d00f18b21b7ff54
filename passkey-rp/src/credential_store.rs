use std::collections::{hash_map::Entry, HashMap};

use chrono::{DateTime, Utc};
use passkey_rp_attestation::{AttestationFormat, AttestationType};
use passkey_rp_types::{ctap2::Aaguid, webauthn::AuthenticatorTransport, Bytes};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::StorageError;

/// A registered credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// The credential id chosen by the authenticator.
    pub credential_id: Bytes,
    /// The user handle of the owning account.
    pub user_handle: Bytes,
    /// The credential public key, COSE encoded exactly as the authenticator sent it.
    pub public_key_cose: Bytes,
    /// The last signature counter seen.
    pub sign_count: u32,
    /// Transports reported at registration, for allow and exclude lists.
    pub transports: Option<Vec<AuthenticatorTransport>>,
    /// The authenticator model.
    pub aaguid: Aaguid,
    /// The statement format the credential was attested with.
    pub attestation_format: AttestationFormat,
    /// The attestation type that was verified.
    pub attestation_type: AttestationType,
    /// The BE flag at registration.
    pub backup_eligible: bool,
    /// The BS flag as of the last ceremony.
    pub backup_state: bool,
    /// When the credential was registered.
    pub created_at: DateTime<Utc>,
}

/// Persistence of registered credentials.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// The credential with `credential_id`, if any.
    async fn find_credential(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<CredentialRecord>, StorageError>;

    /// All credentials owned by `user_handle`.
    async fn list_credentials_for_user(
        &self,
        user_handle: &[u8],
    ) -> Result<Vec<CredentialRecord>, StorageError>;

    /// Persist a newly registered credential.
    ///
    /// Must fail with [`StorageError::CredentialExists`] and leave the stored record untouched
    /// when a credential with the same id exists. The check and the insert are one atomic
    /// operation: two registrations racing with the same id see exactly one success.
    async fn save_credential(&self, record: CredentialRecord) -> Result<(), StorageError>;

    /// Record the counter and backup state of a successful assertion.
    async fn update_sign_count(
        &self,
        credential_id: &[u8],
        sign_count: u32,
        backup_state: bool,
    ) -> Result<(), StorageError>;
}

/// In-memory store for credentials
///
/// Useful for tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credentials: Mutex<HashMap<Vec<u8>, CredentialRecord>>,
}

impl MemoryCredentialStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl FromIterator<CredentialRecord> for MemoryCredentialStore {
    fn from_iter<T: IntoIterator<Item = CredentialRecord>>(iter: T) -> Self {
        Self {
            credentials: Mutex::new(
                iter.into_iter()
                    .map(|record| (record.credential_id.to_vec(), record))
                    .collect(),
            ),
        }
    }
}

#[async_trait::async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_credential(
        &self,
        credential_id: &[u8],
    ) -> Result<Option<CredentialRecord>, StorageError> {
        Ok(self.credentials.lock().await.get(credential_id).cloned())
    }

    async fn list_credentials_for_user(
        &self,
        user_handle: &[u8],
    ) -> Result<Vec<CredentialRecord>, StorageError> {
        let mut records: Vec<CredentialRecord> = self
            .credentials
            .lock()
            .await
            .values()
            .filter(|record| *record.user_handle == *user_handle)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.created_at);
        Ok(records)
    }

    async fn save_credential(&self, record: CredentialRecord) -> Result<(), StorageError> {
        match self
            .credentials
            .lock()
            .await
            .entry(record.credential_id.to_vec())
        {
            Entry::Occupied(_) => Err(StorageError::CredentialExists),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn update_sign_count(
        &self,
        credential_id: &[u8],
        sign_count: u32,
        backup_state: bool,
    ) -> Result<(), StorageError> {
        let mut credentials = self.credentials.lock().await;
        let record = credentials
            .get_mut(credential_id)
            .ok_or_else(|| StorageError::Backend("credential vanished during update".into()))?;
        record.sign_count = sign_count;
        record.backup_state = backup_state;
        Ok(())
    }
}
