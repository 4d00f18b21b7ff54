use passkey_rp_attestation::{AttestationStatement, AttestationVerificationResult};
use passkey_rp_types::{
    cose::CoseAlgorithm,
    ctap2::{AttestationObject, AttestationObjectError, Flags},
    encoding,
    webauthn::{
        AttestationConveyancePreference, AttestationStatementFormatIdentifiers,
        AuthenticatorSelectionCriteria, ClientDataType, PublicKeyCredentialCreationOptions,
        PublicKeyCredentialDescriptor, PublicKeyCredentialHints, PublicKeyCredentialParameters,
        PublicKeyCredentialRpEntity, PublicKeyCredentialUserEntity, RegistrationResponse,
    },
};
use url::Url;

use crate::{
    expires_at, origin::serialize_origin, verify_authenticator_data, verify_client_data,
    verify_credential_type, CeremonyError, CeremonyParameters, CeremonyStorage, CredentialRecord,
    CredentialStore, ProtocolError, RegistrationCeremonyParameters, RelyingParty,
    RelyingPartyConfig, StorageError,
};

/// Which credentials the authenticator should refuse to create a second credential next to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExcludeCredentials {
    /// Exclude nothing.
    #[default]
    None,
    /// Every credential the user already has, read from the [`CredentialStore`].
    AllExisting,
    /// The given descriptors.
    Manual(Vec<PublicKeyCredentialDescriptor>),
}

/// Input of [`RelyingParty::begin_registration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginRegistrationRequest {
    /// The account to create a credential for.
    pub user: PublicKeyCredentialUserEntity,
    /// Origins for this ceremony only, the configured origins when `None`.
    pub origins: Option<Vec<Url>>,
    /// Top level origins allowed to embed the ceremony in a cross-origin iframe.
    pub top_origins: Vec<Url>,
    /// Challenge length in bytes, the configured size when `None`.
    pub challenge_size: Option<usize>,
    /// Algorithms to offer, the configured algorithms when `None`.
    pub pub_key_cred_params: Option<Vec<CoseAlgorithm>>,
    /// Milliseconds the ceremony stays valid, clamped into the configured bounds.
    pub timeout: Option<u32>,
    /// Credentials the authenticator should not create a new credential next to.
    pub exclude_credentials: ExcludeCredentials,
    /// Requirements on the authenticator.
    pub authenticator_selection: Option<AuthenticatorSelectionCriteria>,
    /// UI hints for the client.
    pub hints: Option<Vec<PublicKeyCredentialHints>>,
    /// Whether attestation is wanted.
    pub attestation: AttestationConveyancePreference,
    /// Preferred attestation formats.
    pub attestation_formats: Option<Vec<AttestationStatementFormatIdentifiers>>,
}

impl BeginRegistrationRequest {
    /// A request for `user` with every option at its default.
    pub fn new(user: PublicKeyCredentialUserEntity) -> Self {
        Self {
            user,
            origins: None,
            top_origins: Vec::new(),
            challenge_size: None,
            pub_key_cred_params: None,
            timeout: None,
            exclude_credentials: ExcludeCredentials::None,
            authenticator_selection: None,
            hints: None,
            attestation: AttestationConveyancePreference::None,
            attestation_formats: None,
        }
    }

    /// Ask for attestation.
    pub fn with_attestation(mut self, attestation: AttestationConveyancePreference) -> Self {
        self.attestation = attestation;
        self
    }

    /// Exclude credentials.
    pub fn with_exclude_credentials(mut self, exclude: ExcludeCredentials) -> Self {
        self.exclude_credentials = exclude;
        self
    }

    /// Set the authenticator selection criteria.
    pub fn with_authenticator_selection(mut self, selection: AuthenticatorSelectionCriteria) -> Self {
        self.authenticator_selection = Some(selection);
        self
    }

    /// Offer only `algorithms`.
    pub fn with_algorithms(mut self, algorithms: Vec<CoseAlgorithm>) -> Self {
        self.pub_key_cred_params = Some(algorithms);
        self
    }

    /// Set the timeout in milliseconds.
    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Output of [`RelyingParty::begin_registration`].
#[derive(Debug, Clone, PartialEq)]
pub struct BeginRegistrationResult {
    /// Identifies the ceremony when completing it.
    pub ceremony_id: String,
    /// What to pass to `navigator.credentials.create()`.
    pub options: PublicKeyCredentialCreationOptions,
}

/// A successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationOutcome {
    /// The stored credential.
    pub credential: CredentialRecord,
    /// What the attestation established.
    pub attestation: AttestationVerificationResult,
}

impl<S, C> RelyingParty<S, C>
where
    S: CeremonyStorage + Sync,
    C: CredentialStore + Sync,
{
    /// Start registering a new credential for `request.user`.
    pub async fn begin_registration(
        &self,
        request: BeginRegistrationRequest,
    ) -> Result<BeginRegistrationResult, CeremonyError> {
        let algorithms = request
            .pub_key_cred_params
            .unwrap_or_else(|| self.config.algorithms.clone());
        if algorithms.is_empty() {
            return Err(ProtocolError::NoAlgorithms.into());
        }

        let excluded = match request.exclude_credentials {
            ExcludeCredentials::None => Vec::new(),
            ExcludeCredentials::AllExisting => self
                .credentials
                .list_credentials_for_user(&request.user.id)
                .await?
                .into_iter()
                .map(|record| PublicKeyCredentialDescriptor::new(record.credential_id, record.transports))
                .collect(),
            ExcludeCredentials::Manual(list) => list,
        };

        let challenge = self.new_challenge(request.challenge_size);
        let timeout = RelyingPartyConfig::clamp_timeout(
            request.timeout,
            self.config.registration_timeout,
        );
        let user_verification = request
            .authenticator_selection
            .map(|selection| selection.user_verification)
            .unwrap_or_default();
        let now = self.clock.now();

        let params = RegistrationCeremonyParameters {
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
            user: request.user.clone(),
            algorithms: algorithms.clone(),
            excluded_credentials: excluded.iter().map(|d| d.id.clone()).collect(),
            user_verification,
            attestation: request.attestation,
            created_at: now,
            expires_at: expires_at(now, timeout),
        };
        let ceremony_id = self
            .ceremonies
            .save(CeremonyParameters::Registration(params))
            .await?;
        log::debug!("began registration ceremony {ceremony_id}");

        let options = PublicKeyCredentialCreationOptions {
            rp: PublicKeyCredentialRpEntity {
                id: Some(self.config.rp_id.clone()),
                name: self.config.rp_name.clone(),
            },
            user: request.user,
            challenge: challenge.into(),
            pub_key_cred_params: algorithms
                .into_iter()
                .map(PublicKeyCredentialParameters::new)
                .collect(),
            timeout: Some(timeout),
            exclude_credentials: (!excluded.is_empty()).then_some(excluded),
            authenticator_selection: request.authenticator_selection,
            hints: request.hints,
            attestation: request.attestation,
            attestation_formats: request.attestation_formats,
        };
        Ok(BeginRegistrationResult {
            ceremony_id,
            options,
        })
    }

    /// Finish the registration ceremony `ceremony_id` with the client's response.
    ///
    /// The ceremony is consumed whatever the outcome. On success the credential has been saved to
    /// the [`CredentialStore`].
    pub async fn complete_registration(
        &self,
        ceremony_id: &str,
        response: RegistrationResponse,
    ) -> Result<RegistrationOutcome, CeremonyError> {
        let result = self.finish_registration(ceremony_id, response).await;
        match &result {
            Ok(outcome) => log::debug!(
                "registration ceremony {ceremony_id} registered credential {} with {} attestation",
                encoding::base64url(&outcome.credential.credential_id),
                outcome.attestation.format,
            ),
            Err(e) => log::warn!(
                "registration ceremony {ceremony_id} failed ({:?}): {e}",
                e.kind()
            ),
        }
        result
    }

    async fn finish_registration(
        &self,
        ceremony_id: &str,
        response: RegistrationResponse,
    ) -> Result<RegistrationOutcome, CeremonyError> {
        let Some(CeremonyParameters::Registration(params)) =
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
            ClientDataType::Create,
            &params.challenge,
            &origins,
        )?;

        let object = AttestationObject::from_slice_with_limits(
            &response.response.attestation_object,
            self.config.decode_limits,
        )?;
        let auth_data = &object.auth_data;
        verify_authenticator_data(auth_data, &params.rp_id, params.user_verification)?;

        let credential = object
            .attested_credential_data()
            .ok_or(AttestationObjectError::MissingAttestedCredentialData)?;
        if credential.credential_id() != &*response.raw_id {
            return Err(ProtocolError::CredentialIdMismatch.into());
        }
        if !params.algorithms.contains(&credential.public_key.algorithm) {
            return Err(ProtocolError::AlgorithmNotAllowed.into());
        }

        let statement = AttestationStatement::from_attestation_object(&object)?;
        let attestation = self
            .verifier
            .verify(&statement, auth_data, &client_data_hash, now)?;
        if params.attestation != AttestationConveyancePreference::None
            && !self
                .config
                .attestation
                .accepted_types
                .contains(&attestation.attestation_type)
        {
            return Err(ProtocolError::AttestationTypeNotAcceptable.into());
        }

        let credential_id = credential.credential_id();
        if params
            .excluded_credentials
            .iter()
            .any(|excluded| **excluded == *credential_id)
            || self.credentials.find_credential(credential_id).await?.is_some()
        {
            return Err(ProtocolError::CredentialAlreadyRegistered.into());
        }

        let record = CredentialRecord {
            credential_id: credential_id.into(),
            user_handle: params.user.id,
            public_key_cose: credential.public_key_bytes().into(),
            sign_count: auth_data.sign_count,
            transports: response.response.transports,
            aaguid: credential.aaguid,
            attestation_format: attestation.format,
            attestation_type: attestation.attestation_type,
            backup_eligible: auth_data.flags.contains(Flags::BE),
            backup_state: auth_data.flags.contains(Flags::BS),
            created_at: now,
        };
        self.credentials
            .save_credential(record.clone())
            .await
            .map_err(|e| match e {
                // lost a race with another registration of the same id
                StorageError::CredentialExists => {
                    CeremonyError::from(ProtocolError::CredentialAlreadyRegistered)
                }
                other => CeremonyError::from(other),
            })?;

        Ok(RegistrationOutcome {
            credential: record,
            attestation,
        })
    }
}
