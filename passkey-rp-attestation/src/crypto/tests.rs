use passkey_rp_types::cose::{CoseAlgorithm, CoseEllipticCurve, CoseKey};

use super::{verify_signature, HashAlgorithm, PublicKeyHandle, SignatureScheme};
use crate::{test_support::*, VerificationError};

#[test]
fn ecdsa_p256_signatures() {
    let (key, cose) = p256_cose_key();
    let handle = PublicKeyHandle::from_cose_key(&CoseKey::from_slice(&cose).unwrap()).unwrap();
    let scheme = SignatureScheme::from(CoseAlgorithm::ES256);

    let sig = sign(&key, b"message");
    assert_eq!(handle.verify(scheme, b"message", &sig), Ok(true));
    assert_eq!(handle.verify(scheme, b"massage", &sig), Ok(false));

    let mut flipped = sig.clone();
    let last = flipped.len() - 1;
    flipped[last] ^= 0x01;
    assert_eq!(
        verify_signature(&handle, scheme, b"message", &flipped, "test message"),
        Err(VerificationError::InvalidSignature("test message"))
    );

    // garbage is a wrong signature, not an error
    assert_eq!(handle.verify(scheme, b"message", &[0x30, 0x00]), Ok(false));
}

#[test]
fn scheme_must_fit_the_key() {
    let (key, cose) = p256_cose_key();
    let handle = PublicKeyHandle::from_cose_key(&CoseKey::from_slice(&cose).unwrap()).unwrap();
    let sig = sign(&key, b"message");

    assert!(matches!(
        handle.verify(SignatureScheme::RsaPkcs1(HashAlgorithm::Sha256), b"message", &sig),
        Err(VerificationError::UnsupportedAlgorithm(_))
    ));
    assert!(matches!(
        handle.verify(SignatureScheme::Ed25519, b"message", &sig),
        Err(VerificationError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn certificate_and_cose_keys_compare_equal() {
    let root = TestCert::root("Key Root");
    let leaf = root.issue(leaf_params("leaf"));

    let from_certificate = PublicKeyHandle::from_certificate(&leaf.der()).unwrap();
    let cose = cose_key_for(&leaf.signing_key());
    let from_cose = PublicKeyHandle::from_cose_key(&CoseKey::from_slice(&cose).unwrap()).unwrap();
    assert_eq!(from_certificate, from_cose);

    let other = PublicKeyHandle::from_certificate(&root.der()).unwrap();
    assert_ne!(from_certificate, other);
    assert!(matches!(
        from_certificate,
        PublicKeyHandle::Ec {
            curve: CoseEllipticCurve::P256,
            ..
        }
    ));
}

#[test]
fn compressed_points_are_normalized() {
    let (key, _) = p256_cose_key();
    let point = key.verifying_key().to_encoded_point(false);
    let compressed = key.verifying_key().to_encoded_point(true);

    assert_eq!(
        PublicKeyHandle::ec(CoseEllipticCurve::P256, compressed.as_bytes()),
        PublicKeyHandle::ec(CoseEllipticCurve::P256, point.as_bytes())
    );
    assert!(PublicKeyHandle::ec(CoseEllipticCurve::P256, &[0x04; 65]).is_err());
}

#[test]
fn algorithm_tables() {
    assert_eq!(
        SignatureScheme::from_oid("1.2.840.113549.1.1.11"),
        Some(SignatureScheme::RsaPkcs1(HashAlgorithm::Sha256))
    );
    assert_eq!(SignatureScheme::from_oid("1.2.3"), None);
    assert_eq!(
        SignatureScheme::from_jws_alg("RS256"),
        Some(SignatureScheme::RsaPkcs1(HashAlgorithm::Sha256))
    );
    assert_eq!(SignatureScheme::from_jws_alg("none"), None);
    assert_eq!(SignatureScheme::Ed25519.hash(), None);
    assert_eq!(
        SignatureScheme::from(CoseAlgorithm::PS384).hash(),
        Some(HashAlgorithm::Sha384)
    );
    assert_eq!(HashAlgorithm::Sha1.digest(b"").len(), 20);
    assert_eq!(HashAlgorithm::Sha512.digest(b"").len(), 64);
}
