use passkey_rp_attestation::{AttestationFormat, AttestationType, SafetyNetPolicy};
use passkey_rp_types::{cbor::DecodeLimits, cose::CoseAlgorithm};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use url::Url;

/// Everything a [`RelyingParty`](crate::RelyingParty) needs to know about itself.
///
/// All fields but the RP ID and name have defaults, so a configuration file only needs to spell
/// out what differs:
///
/// ```
/// # use passkey_rp::RelyingPartyConfig;
/// let config: RelyingPartyConfig = serde_json::from_str(r#"{
///     "rpId": "example.com",
///     "rpName": "Example",
///     "origins": ["https://login.example.com"]
/// }"#).unwrap();
/// assert_eq!(config.challenge_size, 32);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelyingPartyConfig {
    /// The RP ID, a registrable domain such as `example.com`.
    pub rp_id: String,

    /// Human readable name shown by the client.
    pub rp_name: String,

    /// Origins allowed to run ceremonies. When empty, any `https` origin on the RP ID or one of its
    /// subdomains is accepted.
    #[serde(default)]
    pub origins: Vec<Url>,

    /// Accept `http://localhost` origins. Only meant for development.
    #[serde(default)]
    pub allow_insecure_localhost: bool,

    /// Length of generated challenges in bytes.
    #[serde(default = "default_challenge_size")]
    pub challenge_size: usize,

    /// Milliseconds a registration ceremony stays valid.
    #[serde(default = "default_timeout")]
    pub registration_timeout: u32,

    /// Milliseconds an authentication ceremony stays valid.
    #[serde(default = "default_timeout")]
    pub authentication_timeout: u32,

    /// Bounds for decoding authenticator supplied CBOR.
    #[serde(default)]
    pub decode_limits: DecodeLimits,

    /// Which attestations are acceptable.
    #[serde(default)]
    pub attestation: AttestationPolicy,

    /// How signature counters are compared.
    #[serde(default)]
    pub counter_policy: CounterPolicy,

    /// Freshness and integrity requirements for SafetyNet attestation.
    #[serde(default)]
    pub safetynet: SafetyNetPolicy,

    /// Algorithms offered at registration when the request does not list any.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<CoseAlgorithm>,
}

impl RelyingPartyConfig {
    /// Challenges shorter than this are never generated.
    pub const MIN_CHALLENGE_SIZE: usize = 16;
    /// Lower bound of ceremony timeouts in milliseconds.
    pub const MIN_TIMEOUT: u32 = 10_000;
    /// Upper bound of ceremony timeouts in milliseconds.
    pub const MAX_TIMEOUT: u32 = 600_000;
    /// Timeout used when none is configured.
    pub const DEFAULT_TIMEOUT: u32 = 300_000;

    /// A configuration for `rp_id` with every other setting at its default.
    pub fn new(rp_id: impl Into<String>, rp_name: impl Into<String>) -> Self {
        Self {
            rp_id: rp_id.into(),
            rp_name: rp_name.into(),
            origins: Vec::new(),
            allow_insecure_localhost: false,
            challenge_size: default_challenge_size(),
            registration_timeout: default_timeout(),
            authentication_timeout: default_timeout(),
            decode_limits: DecodeLimits::default(),
            attestation: AttestationPolicy::default(),
            counter_policy: CounterPolicy::default(),
            safetynet: SafetyNetPolicy::default(),
            algorithms: default_algorithms(),
        }
    }

    /// Restrict ceremonies to `origin`, may be called multiple times.
    pub fn with_origin(mut self, origin: Url) -> Self {
        self.origins.push(origin);
        self
    }

    /// Allow `http://localhost` origins.
    pub fn allows_insecure_localhost(mut self, is_allowed: bool) -> Self {
        self.allow_insecure_localhost = is_allowed;
        self
    }

    /// Set the challenge length, raised to [`Self::MIN_CHALLENGE_SIZE`] if smaller.
    pub fn with_challenge_size(mut self, size: usize) -> Self {
        self.challenge_size = size.max(Self::MIN_CHALLENGE_SIZE);
        self
    }

    /// Set both ceremony timeouts in milliseconds.
    pub fn with_timeouts(mut self, registration: u32, authentication: u32) -> Self {
        self.registration_timeout = registration;
        self.authentication_timeout = authentication;
        self
    }

    /// Set the CBOR decode limits.
    pub fn with_decode_limits(mut self, limits: DecodeLimits) -> Self {
        self.decode_limits = limits;
        self
    }

    /// Set the attestation policy.
    pub fn with_attestation_policy(mut self, policy: AttestationPolicy) -> Self {
        self.attestation = policy;
        self
    }

    /// Set the counter policy.
    pub fn with_counter_policy(mut self, policy: CounterPolicy) -> Self {
        self.counter_policy = policy;
        self
    }

    /// Set the SafetyNet policy.
    pub fn with_safetynet_policy(mut self, policy: SafetyNetPolicy) -> Self {
        self.safetynet = policy;
        self
    }

    /// Set the algorithms offered by default.
    pub fn with_algorithms(mut self, algorithms: Vec<CoseAlgorithm>) -> Self {
        self.algorithms = algorithms;
        self
    }

    /// Clamp a requested timeout into the configured bounds, `default` when absent.
    pub(crate) fn clamp_timeout(requested: Option<u32>, default: u32) -> u32 {
        requested
            .unwrap_or(default)
            .clamp(Self::MIN_TIMEOUT, Self::MAX_TIMEOUT)
    }
}

fn default_challenge_size() -> usize {
    32
}

fn default_timeout() -> u32 {
    RelyingPartyConfig::DEFAULT_TIMEOUT
}

fn default_algorithms() -> Vec<CoseAlgorithm> {
    vec![
        CoseAlgorithm::ES256,
        CoseAlgorithm::ES384,
        CoseAlgorithm::ES512,
        CoseAlgorithm::EdDSA,
        CoseAlgorithm::PS256,
        CoseAlgorithm::PS384,
        CoseAlgorithm::PS512,
        CoseAlgorithm::RS256,
        CoseAlgorithm::RS384,
        CoseAlgorithm::RS512,
    ]
}

/// Which attestation statements a relying party accepts.
///
/// An untrusted certificate chain always fails the ceremony. This only narrows what a fully
/// verified attestation may look like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttestationPolicy {
    /// Attestation types accepted when the ceremony asked for attestation.
    pub accepted_types: Vec<AttestationType>,
    /// Statement formats that are verified at all.
    pub enabled_formats: Vec<AttestationFormat>,
}

impl Default for AttestationPolicy {
    fn default() -> Self {
        Self {
            accepted_types: vec![
                AttestationType::None,
                AttestationType::Self_,
                AttestationType::Basic,
                AttestationType::AttCa,
                AttestationType::AnonCa,
            ],
            enabled_formats: AttestationFormat::iter().collect(),
        }
    }
}

/// How the signature counter of an assertion is compared to the stored one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CounterPolicy {
    /// The counter must grow, except that a stored and received count of both zero is accepted.
    /// Authenticators without a counter always report zero.
    #[default]
    ZeroZeroTolerated,
    /// The counter must always grow.
    Strict,
}

impl CounterPolicy {
    /// Whether moving from `stored` to `received` is acceptable.
    pub fn allows(self, stored: u32, received: u32) -> bool {
        match self {
            CounterPolicy::ZeroZeroTolerated if stored == 0 && received == 0 => true,
            _ => received > stored,
        }
    }
}
