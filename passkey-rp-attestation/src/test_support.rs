//! Builders shared by the format tests: credential keys, authenticator data and certificates.

use chrono::{DateTime, TimeZone, Utc};
use coset::{iana, CborSerializable, CoseKeyBuilder};
use p256::{
    ecdsa::{signature::Signer, DerSignature, SigningKey},
    pkcs8::DecodePrivateKey,
};
use passkey_rp_types::{crypto::sha256, ctap2::AuthenticatorData};
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};

use crate::{
    AttestationStatement, AttestationVerificationResult, AttestationVerifier, TrustAnchors,
    VerificationError,
};

pub const RP_ID: &str = "example.com";
pub const CLIENT_DATA_HASH: [u8; 32] = [0x5a; 32];
pub const CREDENTIAL_ID: [u8; 16] = [0xc1; 16];

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

/// A deterministic P-256 credential key and its COSE encoding.
pub fn p256_cose_key() -> (SigningKey, Vec<u8>) {
    let key = SigningKey::from_slice(&[0x17; 32]).unwrap();
    let cose = cose_key_for(&key);
    (key, cose)
}

pub fn cose_key_for(key: &SigningKey) -> Vec<u8> {
    let point = key.verifying_key().to_encoded_point(false);
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

pub fn sign(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    let signature: DerSignature = key.sign(message);
    signature.as_bytes().to_vec()
}

/// Registration authenticator data for `RP_ID` with UP, UV and AT set.
pub fn auth_data_with_key(cose_key: &[u8], aaguid: [u8; 16]) -> AuthenticatorData {
    let mut raw = sha256(RP_ID.as_bytes()).to_vec();
    raw.push(0x45);
    raw.extend_from_slice(&0u32.to_be_bytes());
    raw.extend_from_slice(&aaguid);
    raw.extend_from_slice(&u16::try_from(CREDENTIAL_ID.len()).unwrap().to_be_bytes());
    raw.extend_from_slice(&CREDENTIAL_ID);
    raw.extend_from_slice(cose_key);
    AuthenticatorData::from_slice(&raw).unwrap()
}

pub fn verify_with(
    verifier: &AttestationVerifier,
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
) -> Result<AttestationVerificationResult, VerificationError> {
    verifier.verify(statement, auth_data, &CLIENT_DATA_HASH, fixed_now())
}

pub fn verify_at_fixed_time(
    anchors: TrustAnchors,
    statement: &AttestationStatement,
    auth_data: &AuthenticatorData,
) -> Result<AttestationVerificationResult, VerificationError> {
    verify_with(&AttestationVerifier::new(anchors), statement, auth_data)
}

/// A DER TLV with a single byte tag.
pub fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    der_tagged(&[tag], content)
}

/// A DER TLV with a pre-encoded, possibly multi byte, tag.
pub fn der_tagged(tag: &[u8], content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    let len = content.len();
    if len < 0x80 {
        out.push(u8::try_from(len).unwrap());
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | u8::try_from(bytes.len() - skip).unwrap());
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(content);
    out
}

/// A certificate together with the key it certifies.
pub struct TestCert {
    pub key: KeyPair,
    pub cert: rcgen::Certificate,
}

impl TestCert {
    pub fn der(&self) -> Vec<u8> {
        self.cert.der().to_vec()
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_pkcs8_der(&self.key.serialize_der()).unwrap()
    }

    /// A self signed root CA.
    pub fn root(common_name: &str) -> Self {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let cert = ca_params(common_name).self_signed(&key).unwrap();
        Self { key, cert }
    }

    /// An intermediate CA issued by `self`.
    pub fn intermediate(&self, common_name: &str) -> Self {
        self.issue(ca_params(common_name))
    }

    /// Issue a certificate for `params` with a fresh P-256 key.
    pub fn issue(&self, params: CertificateParams) -> Self {
        let key = KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap();
        let cert = params.signed_by(&key, &self.cert, &self.key).unwrap();
        Self { key, cert }
    }
}

pub fn ca_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params
}

/// Leaf parameters with the subject a packed attestation certificate needs.
pub fn packed_leaf_params() -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CountryName, "SE");
    params.distinguished_name.push(DnType::OrganizationName, "Example Vendor");
    params
        .distinguished_name
        .push(DnType::OrganizationalUnitName, "Authenticator Attestation");
    params.distinguished_name.push(DnType::CommonName, "Example Batch 1");
    params.is_ca = IsCa::ExplicitNoCa;
    params
}

pub fn leaf_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    params.distinguished_name.push(DnType::CommonName, common_name);
    params.is_ca = IsCa::ExplicitNoCa;
    params
}

/// The FIDO AAGUID certificate extension holding `aaguid`.
pub fn aaguid_extension(aaguid: [u8; 16]) -> CustomExtension {
    CustomExtension::from_oid_content(&[1, 3, 6, 1, 4, 1, 45724, 1, 1, 4], der(0x04, &aaguid))
}
