use passkey_rp_attestation::crypto::{verify_signature, PublicKeyHandle, SignatureScheme};
use passkey_rp_types::{
    cose::CoseKey,
    ctap2::{AuthenticatorData, Flags},
    encoding,
    webauthn::{
        AuthenticationResponse, ClientDataType, PublicKeyCredentialDescriptor,
        PublicKeyCredentialHints, PublicKeyCredentialRequestOptions, UserVerificationRequirement,
    },
    Bytes,
};
use url::Url;

use crate::{
    expires_at, origin::serialize_origin, verify_authenticator_data, verify_client_data,
    verify_credential_type, AuthenticationCeremonyParameters, CeremonyError, CeremonyParameters,
    CeremonyStorage, CredentialRecord, CredentialStore, ProtocolError, RelyingParty,
    RelyingPartyConfig,
};

/// Which credentials may answer an authentication ceremony.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IncludeCredentials {
    /// Any credential, the client offers discoverable credentials.
    #[default]
    None,
    /// Every credential of the ceremony's user, read from the [`CredentialStore`].
    AllExisting,
    /// The given descriptors.
    Manual(Vec<PublicKeyCredentialDescriptor>),
}

/// Input of [`RelyingParty::begin_authentication`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeginAuthenticationRequest {
    /// Origins for this ceremony only, the configured origins when `None`.
    pub origins: Option<Vec<Url>>,
    /// Top level origins allowed to embed the ceremony in a cross-origin iframe.
    pub top_origins: Vec<Url>,
    /// The user expected to authenticate, `None` for a discoverable credential flow.
    pub user_handle: Option<Bytes>,
    /// Challenge length in bytes, the configured size when `None`.
    pub challenge_size: Option<usize>,
    /// Milliseconds the ceremony stays valid, clamped into the configured bounds.
    pub timeout: Option<u32>,
    /// The credentials that may be used.
    pub allow_credentials: IncludeCredentials,
    /// The user verification requirement.
    pub user_verification: UserVerificationRequirement,
    /// UI hints for the client.
    pub hints: Option<Vec<PublicKeyCredentialHints>>,
}

impl BeginAuthenticationRequest {
    /// A discoverable credential request: no user, any credential.
    pub fn discoverable() -> Self {
        Self::default()
    }

    /// A request for any of the registered credentials of `user_handle`.
    pub fn for_user(user_handle: impl Into<Bytes>) -> Self {
        Self {
            user_handle: Some(user_handle.into()),
            allow_credentials: IncludeCredentials::AllExisting,
            ..Self::default()
        }
    }

    /// Set the user verification requirement.
    pub fn with_user_verification(mut self, user_verification: UserVerificationRequirement) -> Self {
        self.user_verification = user_verification;
        self
    }

    /// Set the timeout in milliseconds.
    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Output of [`RelyingParty::begin_authentication`].
#[derive(Debug, Clone, PartialEq)]
pub struct BeginAuthenticationResult {
    /// Identifies the ceremony when completing it.
    pub ceremony_id: String,
    /// What to pass to `navigator.credentials.get()`.
    pub options: PublicKeyCredentialRequestOptions,
}

/// A successful authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationOutcome {
    /// The credential as stored after this assertion.
    pub credential: CredentialRecord,
    /// Whether the authenticator verified the user.
    pub user_verified: bool,
}

impl<S, C> RelyingParty<S, C>
where
    S: CeremonyStorage + Sync,
    C: CredentialStore + Sync,
{
    /// Start an authentication ceremony.
    pub async fn begin_authentication(
        &self,
        request: BeginAuthenticationRequest,
    ) -> Result<BeginAuthenticationResult, CeremonyError> {
        let allowed = match request.allow_credentials {
            IncludeCredentials::None => Vec::new(),
            IncludeCredentials::AllExisting => {
                let user_handle = request
                    .user_handle
                    .as_ref()
                    .ok_or(ProtocolError::UserHandleRequired)?;
                self.credentials
                    .list_credentials_for_user(user_handle)
                    .await?
                    .into_iter()
                    .map(|record| {
                        PublicKeyCredentialDescriptor::new(record.credential_id, record.transports)
                    })
                    .collect()
            }
            IncludeCredentials::Manual(list) => list,
        };

        let challenge = self.new_challenge(request.challenge_size);
        let timeout = RelyingPartyConfig::clamp_timeout(
            request.timeout,
            self.config.authentication_timeout,
        );
        let now = self.clock.now();

        let params = AuthenticationCeremonyParameters {
            challenge: challenge.clone().into(),
            rp_id: self.config.rp_id.clone(),
            origins: request
                .origins
                .as_ref()
                .unwrap_or(&self.config.origins)
                .iter()
                .map(serialize_origin)
                .collect(),
            top_origins: request.top_origins.iter().map(serialize_origin).collect(),
            user_handle: request.user_handle,
            allow_credentials: allowed.iter().map(|d| d.id.clone()).collect(),
            user_verification: request.user_verification,
            created_at: now,
            expires_at: expires_at(now, timeout),
        };
        let ceremony_id = self
            .ceremonies
            .save(CeremonyParameters::Authentication(params))
            .await?;
        log::debug!("began authentication ceremony {ceremony_id}");

        let options = PublicKeyCredentialRequestOptions {
            challenge: challenge.into(),
            timeout: Some(timeout),
            rp_id: Some(self.config.rp_id.clone()),
            allow_credentials: (!allowed.is_empty()).then_some(allowed),
            user_verification: request.user_verification,
            hints: request.hints,
        };
        Ok(BeginAuthenticationResult {
            ceremony_id,
            options,
        })
    }

    /// Finish the authentication ceremony `ceremony_id` with the client's assertion.
    ///
    /// The ceremony is consumed whatever the outcome. On success the signature counter and
    /// backup state of the credential have been updated in the [`CredentialStore`].
    pub async fn complete_authentication(
        &self,
        ceremony_id: &str,
        response: AuthenticationResponse,
    ) -> Result<AuthenticationOutcome, CeremonyError> {
        let result = self.finish_authentication(ceremony_id, response).await;
        match &result {
            Ok(outcome) => log::debug!(
                "authentication ceremony {ceremony_id} verified credential {}",
                encoding::base64url(&outcome.credential.credential_id),
            ),
            Err(e) => log::warn!(
                "authentication ceremony {ceremony_id} failed ({:?}): {e}",
                e.kind()
            ),
        }
        result
    }

    async fn finish_authentication(
        &self,
        ceremony_id: &str,
        response: AuthenticationResponse,
    ) -> Result<AuthenticationOutcome, CeremonyError> {
        let Some(CeremonyParameters::Authentication(params)) =
            self.ceremonies.find_and_consume(ceremony_id).await?
        else {
            return Err(CeremonyError::CeremonyNotFound);
        };
        let now = self.clock.now();
        if now >= params.expires_at {
            return Err(CeremonyError::CeremonyExpired);
        }

        verify_credential_type(response.ty)?;
        let origins = self.origin_policy(&params.rp_id, &params.origins, &params.top_origins);
        let (_, client_data_hash) = verify_client_data(
            &response.response.client_data_json,
            ClientDataType::Get,
            &params.challenge,
            &origins,
        )?;

        let credential_id = &*response.raw_id;
        if !params.allow_credentials.is_empty()
            && !params
                .allow_credentials
                .iter()
                .any(|allowed| **allowed == *credential_id)
        {
            return Err(ProtocolError::CredentialNotAllowed.into());
        }
        let mut record = self
            .credentials
            .find_credential(credential_id)
            .await?
            .ok_or(CeremonyError::CredentialNotFound)?;
        verify_user_handle(
            params.user_handle.as_ref(),
            response.response.user_handle.as_ref(),
            &record,
        )?;

        let auth_data = AuthenticatorData::from_slice_with_limits(
            &response.response.authenticator_data,
            self.config.decode_limits,
        )?;
        verify_authenticator_data(&auth_data, &params.rp_id, params.user_verification)?;
        if auth_data.flags.contains(Flags::BE) != record.backup_eligible {
            return Err(ProtocolError::InvalidBackupState.into());
        }

        let public_key = CoseKey::from_slice(&record.public_key_cose)?;
        verify_signature(
            &PublicKeyHandle::from_cose_key(&public_key)?,
            SignatureScheme::from(public_key.algorithm),
            &auth_data.signed_data(&client_data_hash),
            &response.response.signature,
            "assertion",
        )?;

        if !self
            .config
            .counter_policy
            .allows(record.sign_count, auth_data.sign_count)
        {
            return Err(ProtocolError::CounterRegression {
                stored: record.sign_count,
                received: auth_data.sign_count,
            }
            .into());
        }

        let backup_state = auth_data.flags.contains(Flags::BS);
        self.credentials
            .update_sign_count(credential_id, auth_data.sign_count, backup_state)
            .await?;
        record.sign_count = auth_data.sign_count;
        record.backup_state = backup_state;

        Ok(AuthenticationOutcome {
            credential: record,
            user_verified: auth_data.flags.contains(Flags::UV),
        })
    }
}

/// Bind the assertion to an account.
///
/// An empty user handle in the response counts as absent.
fn verify_user_handle(
    expected: Option<&Bytes>,
    received: Option<&Bytes>,
    record: &CredentialRecord,
) -> Result<(), ProtocolError> {
    let received = received.filter(|handle| !handle.is_empty());
    match expected {
        Some(expected) => {
            if record.user_handle != *expected || received.is_some_and(|r| r != expected) {
                return Err(ProtocolError::UserHandleMismatch);
            }
        }
        None => {
            let received = received.ok_or(ProtocolError::MissingUserHandle)?;
            if record.user_handle != *received {
                return Err(ProtocolError::UserHandleMismatch);
            }
        }
    }
    Ok(())
}
