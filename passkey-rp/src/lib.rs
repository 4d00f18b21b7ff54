//! # Passkey RP
//!
//! [![github]](https://github.com/1Password/passkey-rs/tree/main/passkey-rp)
//! [![documentation]](https://docs.rs/passkey-rp/)
//!
//! This crate defines a [`RelyingParty`] type which runs the two [WebAuthn] ceremonies on the
//! server side: registering a new credential for a user and authenticating with an existing one.
//!
//! Every ceremony is split in two. `begin_*` generates a fresh challenge, persists the ceremony
//! parameters through a [`CeremonyStorage`] and returns the options to hand to the browser.
//! `complete_*` consumes the stored parameters exactly once, validates the client's response
//! against them and either produces a verified credential or a single [`CeremonyError`].
//!
//! Where ceremonies and credentials live is up to the host application, through the
//! [`CeremonyStorage`] and [`CredentialStore`] traits. In-memory implementations are provided for
//! tests and single process deployments.
//!
//! ```no_run
//! # use passkey_rp::*;
//! # use passkey_rp_attestation::{AttestationVerifier, TrustAnchors};
//! # use passkey_rp_types::webauthn::{PublicKeyCredentialUserEntity, RegistrationResponse};
//! # async fn example(user: PublicKeyCredentialUserEntity, response: RegistrationResponse) -> Result<(), CeremonyError> {
//! let rp = RelyingParty::new(
//!     RelyingPartyConfig::new("example.com", "Example"),
//!     AttestationVerifier::new(TrustAnchors::new().with_well_known_roots()),
//!     MemoryCeremonyStorage::new(),
//!     MemoryCredentialStore::new(),
//! );
//!
//! let begin = rp.begin_registration(BeginRegistrationRequest::new(user)).await?;
//! // send `begin.options` to the browser, keep `begin.ceremony_id` in the session
//! let outcome = rp.complete_registration(&begin.ceremony_id, response).await?;
//! println!("registered {:?}", outcome.credential.credential_id);
//! # Ok(())
//! # }
//! ```
//!
//! [github]: https://img.shields.io/badge/GitHub-1Password%2Fpasskey--rs%2Fpasskey--rp-informational?logo=github&style=flat
//! [documentation]: https://img.shields.io/docsrs/passkey-rp/latest?logo=docs.rs&style=flat
//! [WebAuthn]: https://w3c.github.io/webauthn/

mod authentication;
mod challenge;
mod clock;
mod config;
mod credential_store;
mod error;
mod origin;
mod registration;
mod storage;

use chrono::{DateTime, Duration, Utc};
use passkey_rp_attestation::AttestationVerifier;
use passkey_rp_types::{
    crypto::{constant_time_eq, sha256},
    ctap2::{AuthenticatorData, Flags},
    webauthn::{
        ClientDataType, CollectedClientData, PublicKeyCredentialType, UserVerificationRequirement,
    },
};

pub use self::{
    authentication::{
        AuthenticationOutcome, BeginAuthenticationRequest, BeginAuthenticationResult,
        IncludeCredentials,
    },
    challenge::{ChallengeGenerator, RandomChallengeGenerator},
    clock::{Clock, SystemClock},
    config::{AttestationPolicy, CounterPolicy, RelyingPartyConfig},
    credential_store::{CredentialRecord, CredentialStore, MemoryCredentialStore},
    error::{CeremonyError, CeremonyErrorKind, ProtocolError, StorageError},
    origin::OriginPolicy,
    registration::{
        BeginRegistrationRequest, BeginRegistrationResult, ExcludeCredentials, RegistrationOutcome,
    },
    storage::{
        AuthenticationCeremonyParameters, CeremonyParameters, CeremonyStorage,
        MemoryCeremonyStorage, RegistrationCeremonyParameters,
    },
};

#[cfg(any(test, feature = "testable"))]
pub use self::{
    challenge::MockChallengeGenerator, clock::MockClock, credential_store::MockCredentialStore,
    storage::MockCeremonyStorage,
};

/// A WebAuthn relying party.
///
/// `S` keeps the in-flight ceremonies and `C` the registered credentials. Both are only borrowed
/// immutably, so a single `RelyingParty` can serve concurrent requests.
pub struct RelyingParty<S, C> {
    config: RelyingPartyConfig,
    verifier: AttestationVerifier,
    ceremonies: S,
    credentials: C,
    clock: Box<dyn Clock>,
    challenges: Box<dyn ChallengeGenerator>,
}

impl<S, C> RelyingParty<S, C>
where
    S: CeremonyStorage + Sync,
    C: CredentialStore + Sync,
{
    /// Create a relying party.
    ///
    /// The enabled formats and the SafetyNet policy of `config` are applied to `verifier`.
    pub fn new(
        config: RelyingPartyConfig,
        verifier: AttestationVerifier,
        ceremonies: S,
        credentials: C,
    ) -> Self {
        let verifier = verifier
            .with_enabled_formats(config.attestation.enabled_formats.iter().copied())
            .with_safetynet_policy(config.safetynet.clone());
        Self {
            config,
            verifier,
            ceremonies,
            credentials,
            clock: Box::new(SystemClock),
            challenges: Box::new(RandomChallengeGenerator),
        }
    }

    /// Replace the clock used for expiry, certificate validity and SafetyNet freshness.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the source of challenges.
    pub fn with_challenge_generator(mut self, challenges: impl ChallengeGenerator + 'static) -> Self {
        self.challenges = Box::new(challenges);
        self
    }

    /// The configuration this relying party was built with.
    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    /// The ceremony storage.
    pub fn ceremonies(&self) -> &S {
        &self.ceremonies
    }

    /// The credential store.
    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    /// Remove every ceremony that expired before now.
    pub async fn purge_expired_ceremonies(&self) -> Result<usize, StorageError> {
        let purged = self.ceremonies.purge_expired(self.clock.now()).await?;
        if purged > 0 {
            log::debug!("purged {purged} expired ceremonies");
        }
        Ok(purged)
    }

    fn new_challenge(&self, requested: Option<usize>) -> Vec<u8> {
        let len = requested
            .unwrap_or(self.config.challenge_size)
            .max(RelyingPartyConfig::MIN_CHALLENGE_SIZE);
        self.challenges.generate(len)
    }

    fn origin_policy<'a>(
        &self,
        rp_id: &'a str,
        origins: &'a [String],
        top_origins: &'a [String],
    ) -> OriginPolicy<'a> {
        OriginPolicy::new(rp_id, origins, top_origins)
            .allows_insecure_localhost(self.config.allow_insecure_localhost)
    }
}

/// The common client data checks of both ceremonies.
///
/// Returns the parsed client data and the hash the authenticator signed over.
fn verify_client_data(
    raw: &[u8],
    expected_type: ClientDataType,
    challenge: &[u8],
    origins: &OriginPolicy<'_>,
) -> Result<(CollectedClientData, Vec<u8>), CeremonyError> {
    let client_data =
        CollectedClientData::from_json(raw).map_err(|_| ProtocolError::MalformedClientData)?;

    match client_data.challenge_bytes() {
        Some(received) if constant_time_eq(&received, challenge) => {}
        _ => return Err(ProtocolError::ChallengeMismatch.into()),
    }

    origins.verify(&client_data)?;

    if client_data.ty != expected_type {
        return Err(ProtocolError::ClientDataTypeMismatch {
            expected: expected_type.as_str(),
            received: client_data.ty.as_str(),
        }
        .into());
    }

    Ok((client_data, sha256(raw).to_vec()))
}

fn verify_credential_type(ty: PublicKeyCredentialType) -> Result<(), ProtocolError> {
    match ty {
        PublicKeyCredentialType::PublicKey => Ok(()),
        PublicKeyCredentialType::Unknown => Err(ProtocolError::InvalidCredentialType),
    }
}

/// RP ID hash, user presence, user verification and backup flag checks.
fn verify_authenticator_data(
    auth_data: &AuthenticatorData,
    rp_id: &str,
    user_verification: UserVerificationRequirement,
) -> Result<(), ProtocolError> {
    if auth_data.rp_id_hash() != sha256(rp_id.as_bytes()).as_slice() {
        return Err(ProtocolError::RpIdHashMismatch);
    }
    if !auth_data.flags.contains(Flags::UP) {
        return Err(ProtocolError::UserNotPresent);
    }
    if user_verification == UserVerificationRequirement::Required
        && !auth_data.flags.contains(Flags::UV)
    {
        return Err(ProtocolError::UserNotVerified);
    }
    if !auth_data.flags.backup_state_is_valid() {
        return Err(ProtocolError::InvalidBackupState);
    }
    Ok(())
}

fn expires_at(now: DateTime<Utc>, timeout_ms: u32) -> DateTime<Utc> {
    now + Duration::milliseconds(i64::from(timeout_ms))
}

#[cfg(test)]
mod test_support;
