//! Signature checks over the public keys that show up during attestation.
//!
//! Keys come from two places: the credential public key in authenticator data, and the subject
//! public key of an attestation certificate. Both are turned into a [`PublicKeyHandle`] so the
//! format verifiers can compare and use them without caring where they came from.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use passkey_rp_types::cose::{CoseAlgorithm, CoseEllipticCurve, CoseKey, CoseKeyParameters};
use rsa::{pkcs8::DecodePublicKey as _, BigUint, Pkcs1v15Sign, Pss, RsaPublicKey};
use sha2::{Digest as _, Sha256, Sha384, Sha512};
use signature::hazmat::PrehashVerifier as _;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::VerificationError;

#[cfg(test)]
mod tests;

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_ED25519: &str = "1.3.101.112";

/// Hash functions used by the supported signature schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// SHA-1, only accepted where a format still mandates it.
    Sha1,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl HashAlgorithm {
    /// Hash `data`.
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Sha1 => sha1::Sha1::digest(data).to_vec(),
            HashAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            HashAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// A signature algorithm split into its scheme and hash.
///
/// The curve of an ECDSA signature is the curve of the key, not something the scheme decides. This
/// matters for certificates where a P-384 issuer signs with `ecdsa-with-SHA256`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    /// ECDSA with a DER encoded signature.
    Ecdsa(HashAlgorithm),
    /// RSASSA-PKCS1-v1_5
    RsaPkcs1(HashAlgorithm),
    /// RSASSA-PSS with a salt as long as the hash.
    RsaPss(HashAlgorithm),
    /// Pure Ed25519
    Ed25519,
}

impl From<CoseAlgorithm> for SignatureScheme {
    fn from(alg: CoseAlgorithm) -> Self {
        match alg {
            CoseAlgorithm::ES256 => SignatureScheme::Ecdsa(HashAlgorithm::Sha256),
            CoseAlgorithm::ES384 => SignatureScheme::Ecdsa(HashAlgorithm::Sha384),
            CoseAlgorithm::ES512 => SignatureScheme::Ecdsa(HashAlgorithm::Sha512),
            CoseAlgorithm::PS256 => SignatureScheme::RsaPss(HashAlgorithm::Sha256),
            CoseAlgorithm::PS384 => SignatureScheme::RsaPss(HashAlgorithm::Sha384),
            CoseAlgorithm::PS512 => SignatureScheme::RsaPss(HashAlgorithm::Sha512),
            CoseAlgorithm::RS256 => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha256),
            CoseAlgorithm::RS384 => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha384),
            CoseAlgorithm::RS512 => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha512),
            CoseAlgorithm::RS1 => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha1),
            CoseAlgorithm::EdDSA => SignatureScheme::Ed25519,
        }
    }
}

impl SignatureScheme {
    /// Map the signature algorithm of an X.509 certificate.
    pub fn from_oid(oid: &str) -> Option<Self> {
        let scheme = match oid {
            "1.2.840.10045.4.3.2" => SignatureScheme::Ecdsa(HashAlgorithm::Sha256),
            "1.2.840.10045.4.3.3" => SignatureScheme::Ecdsa(HashAlgorithm::Sha384),
            "1.2.840.10045.4.3.4" => SignatureScheme::Ecdsa(HashAlgorithm::Sha512),
            "1.2.840.113549.1.1.5" => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha1),
            "1.2.840.113549.1.1.11" => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha256),
            "1.2.840.113549.1.1.12" => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha384),
            "1.2.840.113549.1.1.13" => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha512),
            OID_ED25519 => SignatureScheme::Ed25519,
            _ => return None,
        };
        Some(scheme)
    }

    /// Map a JWS `alg` header value.
    pub fn from_jws_alg(alg: &str) -> Option<Self> {
        let scheme = match alg {
            "RS256" => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha256),
            "RS384" => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha384),
            "RS512" => SignatureScheme::RsaPkcs1(HashAlgorithm::Sha512),
            "PS256" => SignatureScheme::RsaPss(HashAlgorithm::Sha256),
            "ES256" => SignatureScheme::Ecdsa(HashAlgorithm::Sha256),
            _ => return None,
        };
        Some(scheme)
    }

    /// The hash applied to the message before signing, `None` for pure Ed25519.
    pub fn hash(self) -> Option<HashAlgorithm> {
        match self {
            SignatureScheme::Ecdsa(hash)
            | SignatureScheme::RsaPkcs1(hash)
            | SignatureScheme::RsaPss(hash) => Some(hash),
            SignatureScheme::Ed25519 => None,
        }
    }
}

/// A public key ready to verify signatures.
///
/// Elliptic curve points are always kept uncompressed so two handles for the same key compare
/// equal regardless of how they were encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKeyHandle {
    /// A point on one of the NIST curves, SEC1 uncompressed.
    Ec {
        /// The curve
        curve: CoseEllipticCurve,
        /// `0x04 || x || y`
        point: Vec<u8>,
    },
    /// An RSA public key.
    Rsa(RsaPublicKey),
    /// An Ed25519 public key.
    Ed25519([u8; 32]),
}

impl PublicKeyHandle {
    /// Build a handle from a decoded credential public key.
    pub fn from_cose_key(key: &CoseKey) -> Result<Self, VerificationError> {
        match &key.parameters {
            CoseKeyParameters::Ec2 { curve, .. } => {
                let point = key
                    .sec1_uncompressed()
                    .ok_or(VerificationError::InvalidPublicKey("EC2 key without a point"))?;
                Self::ec(*curve, &point)
            }
            CoseKeyParameters::Rsa { n, e } => {
                Self::rsa(BigUint::from_bytes_be(n), BigUint::from_bytes_be(e))
            }
            CoseKeyParameters::Okp { x, .. } => x
                .as_slice()
                .try_into()
                .map(PublicKeyHandle::Ed25519)
                .map_err(|_| VerificationError::InvalidPublicKey("Ed25519 key is not 32 bytes")),
        }
    }

    /// Build a handle from the subject public key info of a certificate.
    pub fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<Self, VerificationError> {
        let key: &[u8] = spki.subject_public_key.data.as_ref();
        let oid = spki.algorithm.algorithm.to_id_string();
        match oid.as_str() {
            OID_EC_PUBLIC_KEY => {
                // compressed and uncompressed lengths are unique per curve
                let curve = match key.len() {
                    33 | 65 => CoseEllipticCurve::P256,
                    49 | 97 => CoseEllipticCurve::P384,
                    67 | 133 => CoseEllipticCurve::P521,
                    _ => return Err(VerificationError::InvalidPublicKey("unknown curve point")),
                };
                Self::ec(curve, key)
            }
            OID_RSA_ENCRYPTION => RsaPublicKey::from_public_key_der(spki.raw)
                .map(PublicKeyHandle::Rsa)
                .map_err(|_| VerificationError::InvalidPublicKey("malformed RSA public key")),
            OID_ED25519 => key
                .try_into()
                .map(PublicKeyHandle::Ed25519)
                .map_err(|_| VerificationError::InvalidPublicKey("Ed25519 key is not 32 bytes")),
            _ => Err(VerificationError::UnsupportedAlgorithm(format!(
                "public key algorithm {oid}"
            ))),
        }
    }

    /// Build a handle from the subject public key of a DER encoded certificate.
    pub fn from_certificate(der: &[u8]) -> Result<Self, VerificationError> {
        let cert = crate::x509::parse_certificate(der)?;
        Self::from_spki(cert.public_key())
    }

    pub(crate) fn ec(curve: CoseEllipticCurve, sec1: &[u8]) -> Result<Self, VerificationError> {
        let point = match curve {
            CoseEllipticCurve::P256 => p256::PublicKey::from_sec1_bytes(sec1)
                .map(|k| k.to_encoded_point(false).as_bytes().to_vec()),
            CoseEllipticCurve::P384 => p384::PublicKey::from_sec1_bytes(sec1)
                .map(|k| k.to_encoded_point(false).as_bytes().to_vec()),
            CoseEllipticCurve::P521 => p521::PublicKey::from_sec1_bytes(sec1)
                .map(|k| k.to_encoded_point(false).as_bytes().to_vec()),
            CoseEllipticCurve::Ed25519 => {
                return Err(VerificationError::InvalidPublicKey(
                    "Ed25519 can not be used with ECDSA",
                ))
            }
        }
        .map_err(|_| VerificationError::InvalidPublicKey("point is not on the curve"))?;
        Ok(PublicKeyHandle::Ec { curve, point })
    }

    pub(crate) fn rsa(n: BigUint, e: BigUint) -> Result<Self, VerificationError> {
        RsaPublicKey::new(n, e)
            .map(PublicKeyHandle::Rsa)
            .map_err(|_| VerificationError::InvalidPublicKey("RSA parameters are out of range"))
    }

    fn kind(&self) -> &'static str {
        match self {
            PublicKeyHandle::Ec { .. } => "EC",
            PublicKeyHandle::Rsa(_) => "RSA",
            PublicKeyHandle::Ed25519(_) => "Ed25519",
        }
    }

    /// Check `signature` over `message`.
    ///
    /// `Ok(false)` means the signature is wrong, including when it is not even well formed. An
    /// error means the key can not be used with `scheme` at all.
    pub fn verify(
        &self,
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<bool, VerificationError> {
        match (self, scheme) {
            (PublicKeyHandle::Ec { curve, point }, SignatureScheme::Ecdsa(hash)) => {
                verify_ecdsa(*curve, point, &hash.digest(message), signature)
            }
            (PublicKeyHandle::Rsa(key), SignatureScheme::RsaPkcs1(hash)) => {
                let digest = hash.digest(message);
                let result = match hash {
                    HashAlgorithm::Sha1 => {
                        key.verify(Pkcs1v15Sign::new::<sha1::Sha1>(), &digest, signature)
                    }
                    HashAlgorithm::Sha256 => key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, signature),
                    HashAlgorithm::Sha384 => key.verify(Pkcs1v15Sign::new::<Sha384>(), &digest, signature),
                    HashAlgorithm::Sha512 => key.verify(Pkcs1v15Sign::new::<Sha512>(), &digest, signature),
                };
                Ok(result.is_ok())
            }
            (PublicKeyHandle::Rsa(key), SignatureScheme::RsaPss(hash)) => {
                let digest = hash.digest(message);
                let result = match hash {
                    HashAlgorithm::Sha1 => key.verify(Pss::new::<sha1::Sha1>(), &digest, signature),
                    HashAlgorithm::Sha256 => key.verify(Pss::new::<Sha256>(), &digest, signature),
                    HashAlgorithm::Sha384 => key.verify(Pss::new::<Sha384>(), &digest, signature),
                    HashAlgorithm::Sha512 => key.verify(Pss::new::<Sha512>(), &digest, signature),
                };
                Ok(result.is_ok())
            }
            (PublicKeyHandle::Ed25519(bytes), SignatureScheme::Ed25519) => {
                let key = ed25519_dalek::VerifyingKey::from_bytes(bytes)
                    .map_err(|_| VerificationError::InvalidPublicKey("invalid Ed25519 point"))?;
                let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
                    return Ok(false);
                };
                Ok(key.verify_strict(message, &signature).is_ok())
            }
            (key, scheme) => Err(VerificationError::UnsupportedAlgorithm(format!(
                "{scheme:?} with an {} key",
                key.kind()
            ))),
        }
    }
}

/// Verify a signature, failing with [`VerificationError::InvalidSignature`] naming `signed` when
/// it does not match.
pub fn verify_signature(
    key: &PublicKeyHandle,
    scheme: SignatureScheme,
    message: &[u8],
    signature: &[u8],
    signed: &'static str,
) -> Result<(), VerificationError> {
    if key.verify(scheme, message, signature)? {
        Ok(())
    } else {
        Err(VerificationError::InvalidSignature(signed))
    }
}

fn verify_ecdsa(
    curve: CoseEllipticCurve,
    point: &[u8],
    prehash: &[u8],
    signature: &[u8],
) -> Result<bool, VerificationError> {
    let invalid_key = |_| VerificationError::InvalidPublicKey("point is not on the curve");
    // DER is what authenticators send, fixed width `r || s` is tolerated
    let verified = match curve {
        CoseEllipticCurve::P256 => {
            let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(invalid_key)?;
            let Ok(sig) = p256::ecdsa::Signature::from_der(signature)
                .or_else(|_| p256::ecdsa::Signature::from_slice(signature))
            else {
                return Ok(false);
            };
            let sig = sig.normalize_s().unwrap_or(sig);
            key.verify_prehash(prehash, &sig).is_ok()
        }
        CoseEllipticCurve::P384 => {
            let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(invalid_key)?;
            let Ok(sig) = p384::ecdsa::Signature::from_der(signature)
                .or_else(|_| p384::ecdsa::Signature::from_slice(signature))
            else {
                return Ok(false);
            };
            let sig = sig.normalize_s().unwrap_or(sig);
            key.verify_prehash(prehash, &sig).is_ok()
        }
        CoseEllipticCurve::P521 => {
            let key = p521::ecdsa::VerifyingKey::from_sec1_bytes(point).map_err(invalid_key)?;
            let Ok(sig) = p521::ecdsa::Signature::from_der(signature)
                .or_else(|_| p521::ecdsa::Signature::from_slice(signature))
            else {
                return Ok(false);
            };
            let sig = sig.normalize_s().unwrap_or(sig);
            key.verify_prehash(prehash, &sig).is_ok()
        }
        CoseEllipticCurve::Ed25519 => {
            return Err(VerificationError::UnsupportedAlgorithm(
                "ECDSA over Ed25519".to_owned(),
            ))
        }
    };
    Ok(verified)
}
