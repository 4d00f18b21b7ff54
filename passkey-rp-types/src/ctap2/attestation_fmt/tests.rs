use ciborium::{cbor, value::Value};

use super::*;
use crate::cose::{CoseAlgorithm, CoseEllipticCurve, CoseKeyParameters};

// Authenticator data extracted from a yubikey version 5, with a credProtect extension
const YUBIKEY_AUTH_DATA: [u8; 196] = [
    0x74, 0xa6, 0xea, 0x92, 0x13, 0xc9, 0x9c, 0x2f, 0x74, 0xb2, 0x24, 0x92, 0xb3, 0x20, 0xcf, 0x40,
    0x26, 0x2a, 0x94, 0xc1, 0xa9, 0x50, 0xa0, 0x39, 0x7f, 0x29, 0x25, 0x0b, 0x60, 0x84, 0x1e, 0xf0,
    0xc5, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x0c, 0x98, 0x51, 0xdc, 0x8b, 0xd1, 0xef, 0x2d, 0x08,
    0x4b, 0x20, 0x1c, 0xbf, 0x5e, 0x4c, 0x14, 0x04, 0x4f, 0xf8, 0x87, 0x04, 0x11, 0x5e, 0x6c, 0x58,
    0x94, 0xb8, 0x69, 0xbb, 0x45, 0x3c, 0x3f, 0xe2, 0x1e, 0xb1, 0x22, 0x44, 0xc6, 0xe7, 0xe9, 0x6a,
    0xbe, 0xd3, 0x0f, 0x18, 0x1b, 0x9f, 0x86, 0xa5, 0x01, 0x02, 0x03, 0x26, 0x20, 0x01, 0x21, 0x58,
    0x20, 0x0c, 0x98, 0x51, 0xdc, 0x8b, 0xd1, 0xef, 0x2d, 0x08, 0x4b, 0x20, 0x1c, 0xbf, 0xad, 0xd9,
    0xa6, 0x97, 0xbb, 0x48, 0xd9, 0xd7, 0xff, 0x91, 0x0f, 0x0a, 0x6a, 0xc1, 0x0b, 0x91, 0x2b, 0xe9,
    0x58, 0x22, 0x58, 0x20, 0x46, 0x78, 0x6f, 0x2a, 0x95, 0x76, 0x69, 0x8c, 0x9f, 0x3a, 0xe2, 0x52,
    0x3b, 0x4e, 0xb9, 0x4b, 0x8e, 0x07, 0x4c, 0x35, 0xab, 0xc4, 0xdf, 0x68, 0x8f, 0xcd, 0x85, 0xd2,
    0x9a, 0x01, 0xab, 0xba, 0xa1, 0x6b, 0x63, 0x72, 0x65, 0x64, 0x50, 0x72, 0x6f, 0x74, 0x65, 0x63,
    0x74, 0x02, 0x00, 0x00,
];

/// The yubikey data above without its two padding bytes
fn yubikey_with_extensions() -> &'static [u8] {
    &YUBIKEY_AUTH_DATA[..194]
}

/// The yubikey data with the extensions removed and the ED flag cleared
fn yubikey_without_extensions() -> Vec<u8> {
    let mut data = YUBIKEY_AUTH_DATA[..180].to_vec();
    data[32] = 0x45;
    data
}

fn encode(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).expect("could not serialize test value");
    out
}

#[test]
fn deserialize_authenticator_data_with_at_and_ed() {
    let auth_data = AuthenticatorData::from_slice(yubikey_with_extensions())
        .expect("could not parse the authenticator data");

    assert_eq!(auth_data.rp_id_hash(), &YUBIKEY_AUTH_DATA[..32]);
    assert_eq!(auth_data.flags, Flags::UP | Flags::UV | Flags::AT | Flags::ED);
    assert_eq!(auth_data.sign_count, 1);
    assert_eq!(auth_data.as_bytes(), yubikey_with_extensions());

    let acd = auth_data
        .attested_credential_data
        .as_ref()
        .expect("attested credential data");
    // interestingly a yubikey returns an empty AAGUID
    assert!(acd.aaguid.is_empty());
    assert_eq!(acd.credential_id(), &YUBIKEY_AUTH_DATA[55..103]);
    assert_eq!(acd.public_key_bytes(), &YUBIKEY_AUTH_DATA[103..180]);
    assert_eq!(acd.public_key.algorithm, CoseAlgorithm::ES256);
    let CoseKeyParameters::Ec2 { curve, x, y } = &acd.public_key.parameters else {
        panic!("expected an EC2 key");
    };
    assert_eq!(*curve, CoseEllipticCurve::P256);
    assert_eq!(x.as_slice(), &YUBIKEY_AUTH_DATA[113..145]);
    assert_eq!(y.as_slice(), &YUBIKEY_AUTH_DATA[148..180]);

    let extensions = auth_data.extensions.expect("extensions present");
    assert_eq!(
        extensions
            .map_get_text("credProtect")
            .and_then(BinaryNode::as_integer),
        Some(2)
    );
}

#[test]
fn deserialize_authenticator_data_with_only_at() {
    let data = yubikey_without_extensions();
    let auth_data =
        AuthenticatorData::from_slice(&data).expect("could not parse the authenticator data");
    assert_eq!(auth_data.flags, Flags::UP | Flags::UV | Flags::AT);
    assert!(auth_data.attested_credential_data.is_some());
    assert!(auth_data.extensions.is_none());
}

#[test]
fn assertion_authenticator_data() {
    let mut data = YUBIKEY_AUTH_DATA[..37].to_vec();
    data[32] = 0x05;
    data[33..37].copy_from_slice(&[0x00, 0x00, 0x01, 0x02]);
    let auth_data = AuthenticatorData::from_slice(&data).expect("valid");
    assert_eq!(auth_data.flags, Flags::UP | Flags::UV);
    assert_eq!(auth_data.sign_count, 258);
    assert!(auth_data.attested_credential_data.is_none());

    let signed = auth_data.signed_data(&[0xcd; 32]);
    assert_eq!(&signed[..37], data.as_slice());
    assert_eq!(&signed[37..], &[0xcd; 32]);
}

#[test]
fn every_truncation_is_an_error() {
    let data = yubikey_with_extensions();
    for cut in 0..data.len() {
        assert!(
            AuthenticatorData::from_slice(&data[..cut]).is_err(),
            "truncation at {cut} was accepted"
        );
    }
}

#[test]
fn short_data_is_rejected() {
    assert_eq!(
        AuthenticatorData::from_slice(&[0; 36]),
        Err(AuthenticatorDataError::TooShort(36))
    );
}

#[test]
fn trailing_bytes_are_rejected() {
    assert_eq!(
        AuthenticatorData::from_slice(&YUBIKEY_AUTH_DATA),
        Err(AuthenticatorDataError::TrailingBytes(2))
    );

    let mut data = YUBIKEY_AUTH_DATA[..38].to_vec();
    data[32] = 0x01;
    assert_eq!(
        AuthenticatorData::from_slice(&data),
        Err(AuthenticatorDataError::TrailingBytes(1))
    );
}

#[test]
fn attested_flag_without_data_is_rejected() {
    let mut data = YUBIKEY_AUTH_DATA[..37].to_vec();
    data[32] = 0x41;
    assert_eq!(
        AuthenticatorData::from_slice(&data),
        Err(AuthenticatorDataError::Truncated("attested credential data"))
    );
}

#[test]
fn oversized_credential_id_is_rejected() {
    let mut data = yubikey_without_extensions();
    data[53] = 0x04;
    data[54] = 0x00;
    assert_eq!(
        AuthenticatorData::from_slice(&data),
        Err(AuthenticatorDataError::CredentialIdTooLong(1024))
    );
}

#[test]
fn extensions_must_be_a_map() {
    let mut data = YUBIKEY_AUTH_DATA[..37].to_vec();
    data[32] = 0x81;
    data.push(0x80);
    assert_eq!(
        AuthenticatorData::from_slice(&data),
        Err(AuthenticatorDataError::ExtensionsNotAMap)
    );
}

#[test]
fn decode_attestation_object() {
    let object = cbor!({
        "fmt" => "none",
        "attStmt" => {},
        "authData" => Value::Bytes(yubikey_without_extensions()),
    })
    .expect("valid test value");
    let att = AttestationObject::from_slice(&encode(&object)).expect("valid attestation object");
    assert_eq!(att.fmt, "none");
    assert_eq!(att.att_stmt, BinaryNode::Map(vec![]));
    assert!(att.attested_credential_data().is_some());
}

#[test]
fn attestation_object_requires_credential_data() {
    let object = cbor!({
        "fmt" => "none",
        "attStmt" => {},
        "authData" => Value::Bytes(YUBIKEY_AUTH_DATA[..37].to_vec()),
    })
    .expect("valid test value");
    assert_eq!(
        AttestationObject::from_slice(&encode(&object)),
        Err(AttestationObjectError::MissingAttestedCredentialData)
    );
}

#[test]
fn attestation_object_field_errors() {
    let missing_fmt = cbor!({
        "attStmt" => {},
        "authData" => Value::Bytes(yubikey_without_extensions()),
    })
    .expect("valid test value");
    assert_eq!(
        AttestationObject::from_slice(&encode(&missing_fmt)),
        Err(AttestationObjectError::MissingField("fmt"))
    );

    let stmt_not_map = cbor!({
        "fmt" => "packed",
        "attStmt" => [1],
        "authData" => Value::Bytes(yubikey_without_extensions()),
    })
    .expect("valid test value");
    assert_eq!(
        AttestationObject::from_slice(&encode(&stmt_not_map)),
        Err(AttestationObjectError::InvalidFieldType("attStmt"))
    );

    let auth_data_text = cbor!({
        "fmt" => "none",
        "attStmt" => {},
        "authData" => "not bytes",
    })
    .expect("valid test value");
    assert_eq!(
        AttestationObject::from_slice(&encode(&auth_data_text)),
        Err(AttestationObjectError::InvalidFieldType("authData"))
    );

    assert_eq!(
        AttestationObject::from_slice(&encode(&Value::Array(vec![]))),
        Err(AttestationObjectError::NotAMap)
    );
}
