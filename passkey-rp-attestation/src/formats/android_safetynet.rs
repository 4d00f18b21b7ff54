use chrono::{DateTime, Utc};
use passkey_rp_types::{
    cbor::BinaryNode,
    crypto::sha256,
    encoding::{try_from_base64, try_from_base64url},
};
use serde::{Deserialize, Serialize};

use super::StatementFields;
use crate::{
    crypto::{verify_signature, SignatureScheme},
    x509, AttestationFormat, AttestationType, AttestationVerificationResult,
    StatementDecodeError, VerificationContext, VerificationError,
};

/// The only host SafetyNet verdicts may be signed for.
const SAFETYNET_HOSTNAME: &str = "attest.android.com";

/// The `android-safetynet` statement.
///
/// <https://w3c.github.io/webauthn/#sctn-android-safetynet-attestation>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidSafetyNetStatement {
    /// Version of Google Play Services that produced the response.
    pub ver: String,
    /// The compact JWS returned by the SafetyNet API.
    pub response: Vec<u8>,
}

/// What a SafetyNet verdict must satisfy besides its signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SafetyNetPolicy {
    /// How old the verdict's `timestampMs` may be.
    pub max_age_ms: u64,
    /// How far in the future `timestampMs` may be.
    pub future_skew_ms: u64,
    /// Require `ctsProfileMatch`.
    pub require_cts_profile_match: bool,
    /// Require `basicIntegrity`.
    pub require_basic_integrity: bool,
}

impl Default for SafetyNetPolicy {
    fn default() -> Self {
        Self {
            max_age_ms: 60_000,
            future_skew_ms: 10_000,
            require_cts_profile_match: true,
            require_basic_integrity: true,
        }
    }
}

impl SafetyNetPolicy {
    fn check(&self, payload: &SafetyNetPayload, now: DateTime<Utc>) -> Result<(), VerificationError> {
        if self.require_cts_profile_match && !payload.cts_profile_match {
            return Err(VerificationError::SafetyNetPolicy("ctsProfileMatch is false"));
        }
        if self.require_basic_integrity && !payload.basic_integrity {
            return Err(VerificationError::SafetyNetPolicy("basicIntegrity is false"));
        }

        let age = i128::from(now.timestamp_millis()) - i128::from(payload.timestamp_ms);
        if age > i128::from(self.max_age_ms) {
            return Err(VerificationError::SafetyNetPolicy("response is too old"));
        }
        if -age > i128::from(self.future_skew_ms) {
            return Err(VerificationError::SafetyNetPolicy("response is from the future"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    #[serde(default)]
    x5c: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetPayload {
    nonce: String,
    timestamp_ms: i64,
    #[serde(default)]
    cts_profile_match: bool,
    #[serde(default)]
    basic_integrity: bool,
}

/// The three parts of a compact JWS, with the header and payload decoded.
struct CompactJws<'a> {
    signing_input: &'a str,
    header: JwsHeader,
    payload: SafetyNetPayload,
    signature: Vec<u8>,
}

impl<'a> CompactJws<'a> {
    fn parse(response: &'a [u8]) -> Result<Self, VerificationError> {
        let response = std::str::from_utf8(response)
            .map_err(|_| VerificationError::MalformedJws("response is not UTF-8"))?;
        let parts = response.split('.').collect::<Vec<_>>();
        let [header, payload, signature] = parts.as_slice() else {
            return Err(VerificationError::MalformedJws("expected three parts"));
        };
        let signing_input = &response[..header.len() + 1 + payload.len()];

        let header = try_from_base64url(header)
            .and_then(|json| serde_json::from_slice(&json).ok())
            .ok_or(VerificationError::MalformedJws("invalid header"))?;
        let payload = try_from_base64url(payload)
            .and_then(|json| serde_json::from_slice(&json).ok())
            .ok_or(VerificationError::MalformedJws("invalid payload"))?;
        let signature = try_from_base64url(signature)
            .ok_or(VerificationError::MalformedJws("invalid signature encoding"))?;

        Ok(Self {
            signing_input,
            header,
            payload,
            signature,
        })
    }
}

impl AndroidSafetyNetStatement {
    /// Read the statement's fields.
    pub fn decode(att_stmt: &BinaryNode) -> Result<Self, StatementDecodeError> {
        let fields = StatementFields::new(att_stmt, &["ver", "response"])?;
        Ok(Self {
            ver: fields.text("ver")?.to_owned(),
            response: fields.bytes("response")?,
        })
    }

    pub(crate) fn verify(
        &self,
        ctx: &VerificationContext<'_>,
        policy: &SafetyNetPolicy,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        let jws = CompactJws::parse(&self.response)?;

        let nonce = try_from_base64(&jws.payload.nonce)
            .ok_or(VerificationError::MalformedJws("nonce is not base64"))?;
        if nonce != sha256(&ctx.signed_data()) {
            return Err(VerificationError::NonceMismatch);
        }

        if jws.header.x5c.is_empty() {
            return Err(VerificationError::MalformedJws("header has no x5c"));
        }
        let x5c = jws
            .header
            .x5c
            .iter()
            .map(|cert| try_from_base64(cert))
            .collect::<Option<Vec<_>>>()
            .ok_or(VerificationError::MalformedJws("x5c entry is not base64"))?;

        let leaf = x509::parse_certificate(&x5c[0])?;
        if !x509::host_names(&leaf).contains(&SAFETYNET_HOSTNAME) {
            return Err(VerificationError::CertificateRequirement(
                "SafetyNet certificate is not issued to attest.android.com",
            ));
        }

        let scheme = SignatureScheme::from_jws_alg(&jws.header.alg).ok_or_else(|| {
            VerificationError::UnsupportedAlgorithm(format!("JWS alg {}", jws.header.alg))
        })?;
        verify_signature(
            &x509::public_key(&leaf)?,
            scheme,
            jws.signing_input.as_bytes(),
            &jws.signature,
            "SafetyNet response",
        )?;

        policy.check(&jws.payload, ctx.now)?;
        log::trace!(
            "SafetyNet verdict from Play Services {} at {}",
            self.ver,
            jws.payload.timestamp_ms
        );

        ctx.verify_chain(AttestationFormat::AndroidSafetyNet, &x5c, &[])?;
        Ok(ctx.result(AttestationFormat::AndroidSafetyNet, AttestationType::Basic, x5c))
    }
}
