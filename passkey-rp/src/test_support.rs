//! A software authenticator and fixed time and challenge sources for ceremony tests.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use ciborium::value::Value;
use coset::{iana, CborSerializable, CoseKeyBuilder};
use p256::ecdsa::{signature::Signer, DerSignature, SigningKey};
use passkey_rp_attestation::{AttestationVerifier, TrustAnchors};
use passkey_rp_types::{
    crypto::sha256,
    ctap2::AttestationObject,
    encoding,
    webauthn::{
        AuthenticationResponse, AuthenticatorAssertionResponse, AuthenticatorAttestationResponse,
        PublicKeyCredential, PublicKeyCredentialType, PublicKeyCredentialUserEntity,
        RegistrationResponse,
    },
    Bytes,
};

use crate::{MemoryCeremonyStorage, MemoryCredentialStore, RelyingParty, RelyingPartyConfig};

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";

pub const UP: u8 = 0x01;
pub const UV: u8 = 0x04;
pub const BE: u8 = 0x08;
pub const BS: u8 = 0x10;
pub const AT: u8 = 0x40;

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// The challenge every test relying party hands out, `len` bytes of `0xc4`.
pub fn fixed_challenge(len: usize) -> Vec<u8> {
    vec![0xc4; len]
}

pub fn user(id: &[u8]) -> PublicKeyCredentialUserEntity {
    PublicKeyCredentialUserEntity {
        id: id.into(),
        display_name: "Ada Lovelace".into(),
        name: "ada@example.com".into(),
    }
}

/// A clock that only moves when told to.
#[derive(Clone)]
pub struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let now = self.now();
        self.set(now + by);
    }

    /// A closure usable as the relying party's clock.
    pub fn source(&self) -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
        let clock = self.clone();
        move || clock.now()
    }
}

pub type TestRelyingParty = RelyingParty<MemoryCeremonyStorage, MemoryCredentialStore>;

/// A relying party for [`RP_ID`] with fixed challenges and no trust anchors.
pub fn relying_party(config: RelyingPartyConfig, clock: &TestClock) -> TestRelyingParty {
    RelyingParty::new(
        config,
        AttestationVerifier::new(TrustAnchors::new()),
        MemoryCeremonyStorage::new(),
        MemoryCredentialStore::new(),
    )
    .with_clock(clock.source())
    .with_challenge_generator(fixed_challenge)
}

pub fn client_data(ty: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({
        "type": ty,
        "challenge": encoding::base64url(challenge),
        "origin": origin,
        "crossOrigin": false,
    }))
    .unwrap()
}

fn to_cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).expect("could not serialize test value");
    out
}

/// A P-256 authenticator producing `none` attestations and assertions.
pub struct TestAuthenticator {
    pub key: SigningKey,
    pub credential_id: Vec<u8>,
    pub rp_id: String,
}

impl TestAuthenticator {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_slice(&[seed; 32]).unwrap(),
            credential_id: vec![seed; 16],
            rp_id: RP_ID.into(),
        }
    }

    pub fn cose_key(&self) -> Vec<u8> {
        let point = self.key.verifying_key().to_encoded_point(false);
        CoseKeyBuilder::new_ec2_pub_key(
            iana::EllipticCurve::P_256,
            point.x().unwrap().to_vec(),
            point.y().unwrap().to_vec(),
        )
        .algorithm(iana::Algorithm::ES256)
        .build()
        .to_vec()
        .unwrap()
    }

    pub fn auth_data(&self, flags: u8, sign_count: u32) -> Vec<u8> {
        let mut raw = sha256(self.rp_id.as_bytes()).to_vec();
        raw.push(flags);
        raw.extend_from_slice(&sign_count.to_be_bytes());
        if flags & AT != 0 {
            raw.extend_from_slice(&[0; 16]);
            raw.extend_from_slice(&u16::try_from(self.credential_id.len()).unwrap().to_be_bytes());
            raw.extend_from_slice(&self.credential_id);
            raw.extend_from_slice(&self.cose_key());
        }
        raw
    }

    pub fn attestation_object(&self, flags: u8) -> Vec<u8> {
        to_cbor(&Value::Map(vec![
            (Value::Text("fmt".into()), Value::Text("none".into())),
            (Value::Text("attStmt".into()), Value::Map(vec![])),
            (
                Value::Text("authData".into()),
                Value::Bytes(self.auth_data(flags | AT, 0)),
            ),
        ]))
    }

    pub fn registration(&self, client_data_json: Vec<u8>, flags: u8) -> RegistrationResponse {
        registration_response(
            self.credential_id.clone(),
            client_data_json,
            self.attestation_object(flags),
        )
    }

    pub fn assertion(
        &self,
        client_data_json: Vec<u8>,
        flags: u8,
        sign_count: u32,
        user_handle: Option<&[u8]>,
    ) -> AuthenticationResponse {
        let auth_data = self.auth_data(flags, sign_count);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&sha256(&client_data_json));
        let signature: DerSignature = self.key.sign(&signed);
        assertion_response(
            self.credential_id.clone(),
            client_data_json,
            auth_data,
            signature.as_bytes().to_vec(),
            user_handle.map(Bytes::from),
        )
    }
}

pub fn registration_response(
    raw_id: Vec<u8>,
    client_data_json: Vec<u8>,
    attestation_object: Vec<u8>,
) -> RegistrationResponse {
    PublicKeyCredential {
        id: encoding::base64url(&raw_id),
        raw_id: raw_id.into(),
        ty: PublicKeyCredentialType::PublicKey,
        response: AuthenticatorAttestationResponse {
            client_data_json: client_data_json.into(),
            authenticator_data: None,
            public_key: None,
            public_key_algorithm: None,
            attestation_object: attestation_object.into(),
            transports: None,
        },
        authenticator_attachment: None,
        client_extension_results: Default::default(),
    }
}

pub fn assertion_response(
    raw_id: Vec<u8>,
    client_data_json: Vec<u8>,
    authenticator_data: Vec<u8>,
    signature: Vec<u8>,
    user_handle: Option<Bytes>,
) -> AuthenticationResponse {
    PublicKeyCredential {
        id: encoding::base64url(&raw_id),
        raw_id: raw_id.into(),
        ty: PublicKeyCredentialType::PublicKey,
        response: AuthenticatorAssertionResponse {
            client_data_json: client_data_json.into(),
            authenticator_data: authenticator_data.into(),
            signature: signature.into(),
            user_handle,
            attestation_object: None,
        },
        authenticator_attachment: None,
        client_extension_results: Default::default(),
    }
}

/// Decode a base64url fixture, ignoring surrounding whitespace.
pub fn fixture(encoded: &str) -> Vec<u8> {
    encoding::try_from_base64url(encoded.trim()).unwrap()
}

/// The credential id inside a recorded attestation object.
pub fn attested_credential_id(attestation_object: &[u8]) -> Vec<u8> {
    AttestationObject::from_slice(attestation_object)
        .unwrap()
        .attested_credential_data()
        .unwrap()
        .credential_id()
        .to_vec()
}

/// Recorded from an Android phone registering with `https://vanbukin-pc.local`.
pub mod android_key {
    pub const ATTESTATION_OBJECT: &str =
        include_str!("../../test-data/android_key_attestation_object.txt");
    pub const CLIENT_DATA: &str = include_str!("../../test-data/android_key_client_data.txt");
    pub const CHALLENGE: &str = "8jSRetKG3xneEajEfed_vmEb9U7bXZ2yrBcvytlj-cI";
    pub const RP_ID: &str = "vanbukin-pc.local";
}

/// Recorded from Chrome on Android registering with SafetyNet attestation, then signing in.
pub mod android_safetynet {
    pub const ATTESTATION_OBJECT: &str =
        include_str!("../../test-data/android_safetynet_attestation_object.txt");
    pub const GTS_ROOT_R1: &[u8] = include_bytes!("../../test-data/gts_root_r1.der");
    pub const RP_ID: &str = "goose-wondrous-overly.ngrok-free.app";
    pub const USER_ID: &str = "AAAAAAAAAAAAAAAAAAAAAQ";

    pub const REGISTRATION_CHALLENGE: &str = "w4fwKLrrnhKGOzpleXpXbsn6c3B6Mtzdk04-SQDRKgA";
    pub const REGISTRATION_CLIENT_DATA: &str = "eyJ0eXBlIjoid2ViYXV0aG4uY3JlYXRlIiwiY2hhbGxlbmdlIjoidzRmd0tMcnJuaEtHT3pwbGVYcFhic242YzNCNk10emRrMDQtU1FEUktnQSIsIm9yaWdpbiI6Imh0dHBzOlwvXC9nb29zZS13b25kcm91cy1vdmVybHkubmdyb2stZnJlZS5hcHAiLCJhbmRyb2lkUGFja2FnZU5hbWUiOiJjb20uYW5kcm9pZC5jaHJvbWUifQ";

    pub const CREDENTIAL_ID: &str =
        "AQhGVh4AhYHIa06UqIE7BpSKEAhmdQCRZXkDohn9wtWcHTIV5_Q1o3pC498cM2Y922-3ikbisHI9l3UhX7tSwhc";
    pub const AUTHENTICATION_CHALLENGE: &str = "SdasfQYURj6uzy3bMTTKXgXBeUf7ikAj_7cad8bHX_c";
    pub const AUTHENTICATION_CLIENT_DATA: &str = "eyJ0eXBlIjoid2ViYXV0aG4uZ2V0IiwiY2hhbGxlbmdlIjoiU2Rhc2ZRWVVSajZ1enkzYk1UVEtYZ1hCZVVmN2lrQWpfN2NhZDhiSFhfYyIsIm9yaWdpbiI6Imh0dHBzOlwvXC9nb29zZS13b25kcm91cy1vdmVybHkubmdyb2stZnJlZS5hcHAiLCJhbmRyb2lkUGFja2FnZU5hbWUiOiJjb20uYW5kcm9pZC5jaHJvbWUifQ";
    pub const AUTHENTICATOR_DATA: &str = "miPJOr64Yikjfv8MyyFBLBwA4260CubjCtHmm4ZttsUFAAAAAQ";
    pub const SIGNATURE: &str =
        "MEUCIQChq7IL-ngSC3l3MV8PJU6_n3e36xeaqFS6f0_mhVc2zgIgTzIBqOJZ8EvGvOVFoLHFx1K7WHm72Qg_qYyUjnzBcJk";
}
