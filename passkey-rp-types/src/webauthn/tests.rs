use super::*;
use crate::{cose::CoseAlgorithm, encoding};

const SAFETYNET_GET_CLIENT_DATA: &str = "eyJ0eXBlIjoid2ViYXV0aG4uZ2V0IiwiY2hhbGxlbmdlIjoiU2Rhc2ZRWVVSajZ1enkzYk1UVEtYZ1hCZVVmN2lrQWpfN2NhZDhiSFhfYyIsIm9yaWdpbiI6Imh0dHBzOlwvXC9nb29zZS13b25kcm91cy1vdmVybHkubmdyb2stZnJlZS5hcHAiLCJhbmRyb2lkUGFja2FnZU5hbWUiOiJjb20uYW5kcm9pZC5jaHJvbWUifQ";

#[test]
fn parse_client_data_with_unknown_keys() {
    let raw = encoding::try_from_base64url(SAFETYNET_GET_CLIENT_DATA).expect("valid base64url");
    let client_data = CollectedClientData::from_json(&raw).expect("valid client data");

    assert_eq!(client_data.ty, ClientDataType::Get);
    assert_eq!(
        client_data.origin,
        "https://goose-wondrous-overly.ngrok-free.app"
    );
    assert_eq!(
        client_data.challenge_bytes(),
        encoding::try_from_base64url("SdasfQYURj6uzy3bMTTKXgXBeUf7ikAj_7cad8bHX_c")
    );
    assert!(client_data.cross_origin.is_none());
    assert_eq!(
        client_data.unknown_keys.get("androidPackageName"),
        Some(&serde_json::Value::String("com.android.chrome".into()))
    );
}

#[test]
fn unknown_client_data_type_is_an_error() {
    let json = br#"{"type":"webauthn.delete","challenge":"AAAA","origin":"https://example.com"}"#;
    assert!(CollectedClientData::from_json(json).is_err());
}

#[test]
fn client_data_type_display() {
    assert_eq!(ClientDataType::Create.to_string(), "webauthn.create");
    assert_eq!(ClientDataType::Get.to_string(), "webauthn.get");
}

#[test]
fn deserialize_authentication_response_with_empty_user_handle() {
    let json = r#"{
        "id": "AQhGVh4AhYHIa06UqIE7BpSKEAhmdQCRZXkDohn9wtWcHTIV5_Q1o3pC498cM2Y922-3ikbisHI9l3UhX7tSwhc",
        "rawId": "AQhGVh4AhYHIa06UqIE7BpSKEAhmdQCRZXkDohn9wtWcHTIV5_Q1o3pC498cM2Y922-3ikbisHI9l3UhX7tSwhc",
        "response": {
            "clientDataJSON": "eyJ0eXBlIjoid2ViYXV0aG4uZ2V0In0",
            "authenticatorData": "miPJOr64Yikjfv8MyyFBLBwA4260CubjCtHmm4ZttsUFAAAAAQ",
            "signature": "MEUCIQChq7IL-ngSC3l3MV8PJU6_n3e36xeaqFS6f0_mhVc2zgIgTzIBqOJZ8EvGvOVFoLHFx1K7WHm72Qg_qYyUjnzBcJk",
            "userHandle": "",
            "attestationObject": null
        },
        "authenticatorAttachment": null,
        "clientExtensionResults": {},
        "type": "public-key"
    }"#;
    let credential: AuthenticationResponse = serde_json::from_str(json).expect("valid response");
    assert_eq!(credential.ty, PublicKeyCredentialType::PublicKey);
    assert_eq!(credential.raw_id.len(), 65);
    assert_eq!(credential.response.authenticator_data.len(), 37);
    assert_eq!(credential.response.user_handle.as_deref(), Some(&[] as &[u8]));
    assert!(credential.response.attestation_object.is_none());
    assert!(credential.authenticator_attachment.is_none());
}

#[test]
fn unknown_credential_type_deserializes_as_unknown() {
    let json = r#"{
        "id": "AAAA",
        "rawId": "AAAA",
        "response": {
            "clientDataJSON": "e30",
            "attestationObject": "oA",
            "authenticatorData": null,
            "publicKey": null,
            "publicKeyAlgorithm": null,
            "transports": ["internal", "carrier-pigeon"]
        },
        "type": "password"
    }"#;
    let credential: RegistrationResponse = serde_json::from_str(json).expect("valid response");
    assert_eq!(credential.ty, PublicKeyCredentialType::Unknown);
    assert!(credential.response.authenticator_data.is_none());
    assert_eq!(
        credential.response.transports,
        Some(vec![AuthenticatorTransport::Internal])
    );
    assert!(credential.client_extension_results.is_empty());
}

#[test]
fn creation_options_serialize_like_the_browser_expects() {
    let options = PublicKeyCredentialCreationOptions {
        rp: PublicKeyCredentialRpEntity {
            id: Some("example.com".into()),
            name: "Example".into(),
        },
        user: PublicKeyCredentialUserEntity {
            id: vec![1, 2, 3].into(),
            display_name: "Test User".into(),
            name: "testuser".into(),
        },
        challenge: vec![0xff; 16].into(),
        pub_key_cred_params: vec![PublicKeyCredentialParameters::new(CoseAlgorithm::ES256)],
        timeout: Some(60000),
        exclude_credentials: Some(vec![PublicKeyCredentialDescriptor::new(
            vec![9, 9],
            Some(vec![AuthenticatorTransport::Usb]),
        )]),
        authenticator_selection: None,
        hints: None,
        attestation: AttestationConveyancePreference::Direct,
        attestation_formats: None,
    };

    let json = serde_json::to_value(&options).expect("serialize");
    assert_eq!(
        json,
        serde_json::json!({
            "rp": {"id": "example.com", "name": "Example"},
            "user": {"id": "AQID", "displayName": "Test User", "name": "testuser"},
            "challenge": "_____________________w",
            "pubKeyCredParams": [{"type": "public-key", "alg": -7}],
            "timeout": 60000,
            "excludeCredentials": [{"type": "public-key", "id": "CQk", "transports": ["usb"]}],
            "attestation": "direct"
        })
    );

    let parsed: PublicKeyCredentialCreationOptions =
        serde_json::from_value(json).expect("deserialize");
    assert_eq!(parsed, options);
}
