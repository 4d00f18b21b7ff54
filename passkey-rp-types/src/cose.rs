//! Decoding of COSE public keys as found in attested credential data.
//!
//! Only the subset of [RFC 9053] that WebAuthn authenticators emit is understood. Anything else is
//! rejected rather than guessed at: an unknown algorithm, key type or curve is an error, never a
//! default.
//!
//! [RFC 9053]: https://www.rfc-editor.org/rfc/rfc9053

use coset::iana::{self, EnumI64};
use serde::{Deserialize, Serialize};

use crate::cbor::{self, BinaryNode, DecodeError, DecodeLimits};


// Common key parameter labels
const LABEL_KTY: i64 = 1;
const LABEL_ALG: i64 = 3;

/// Signature algorithms a credential public key may be used with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CoseAlgorithm {
    /// ECDSA with SHA-256 on P-256
    ES256,
    /// ECDSA with SHA-384 on P-384
    ES384,
    /// ECDSA with SHA-512 on P-521
    ES512,
    /// RSASSA-PSS with SHA-256
    PS256,
    /// RSASSA-PSS with SHA-384
    PS384,
    /// RSASSA-PSS with SHA-512
    PS512,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 with SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 with SHA-512
    RS512,
    /// RSASSA-PKCS1-v1_5 with SHA-1, only seen in TPM attestation statements.
    RS1,
    /// EdDSA, in practice Ed25519
    EdDSA,
}

impl CoseAlgorithm {
    /// The key type a key used with this algorithm must have.
    pub fn key_type(self) -> CoseKeyType {
        match self {
            CoseAlgorithm::ES256 | CoseAlgorithm::ES384 | CoseAlgorithm::ES512 => CoseKeyType::Ec2,
            CoseAlgorithm::EdDSA => CoseKeyType::Okp,
            _ => CoseKeyType::Rsa,
        }
    }

    /// The curve an EC2 or OKP key must be on to be used with this algorithm.
    pub fn curve(self) -> Option<CoseEllipticCurve> {
        match self {
            CoseAlgorithm::ES256 => Some(CoseEllipticCurve::P256),
            CoseAlgorithm::ES384 => Some(CoseEllipticCurve::P384),
            CoseAlgorithm::ES512 => Some(CoseEllipticCurve::P521),
            CoseAlgorithm::EdDSA => Some(CoseEllipticCurve::Ed25519),
            _ => None,
        }
    }

    /// The equivalent registered IANA value.
    pub fn iana(self) -> iana::Algorithm {
        match self {
            CoseAlgorithm::ES256 => iana::Algorithm::ES256,
            CoseAlgorithm::ES384 => iana::Algorithm::ES384,
            CoseAlgorithm::ES512 => iana::Algorithm::ES512,
            CoseAlgorithm::PS256 => iana::Algorithm::PS256,
            CoseAlgorithm::PS384 => iana::Algorithm::PS384,
            CoseAlgorithm::PS512 => iana::Algorithm::PS512,
            CoseAlgorithm::RS256 => iana::Algorithm::RS256,
            CoseAlgorithm::RS384 => iana::Algorithm::RS384,
            CoseAlgorithm::RS512 => iana::Algorithm::RS512,
            CoseAlgorithm::RS1 => iana::Algorithm::RS1,
            CoseAlgorithm::EdDSA => iana::Algorithm::EdDSA,
        }
    }

    /// Map a registered IANA value, if it is one of the supported algorithms.
    pub fn from_iana(alg: iana::Algorithm) -> Option<Self> {
        let alg = match alg {
            iana::Algorithm::ES256 => CoseAlgorithm::ES256,
            iana::Algorithm::ES384 => CoseAlgorithm::ES384,
            iana::Algorithm::ES512 => CoseAlgorithm::ES512,
            iana::Algorithm::PS256 => CoseAlgorithm::PS256,
            iana::Algorithm::PS384 => CoseAlgorithm::PS384,
            iana::Algorithm::PS512 => CoseAlgorithm::PS512,
            iana::Algorithm::RS256 => CoseAlgorithm::RS256,
            iana::Algorithm::RS384 => CoseAlgorithm::RS384,
            iana::Algorithm::RS512 => CoseAlgorithm::RS512,
            iana::Algorithm::RS1 => CoseAlgorithm::RS1,
            iana::Algorithm::EdDSA => CoseAlgorithm::EdDSA,
            _ => return None,
        };
        Some(alg)
    }

    /// The registered COSE identifier.
    pub fn to_i64(self) -> i64 {
        self.iana().to_i64()
    }

    /// Look up a supported algorithm by its registered COSE identifier.
    pub fn from_i64(value: i64) -> Option<Self> {
        iana::Algorithm::from_i64(value).and_then(Self::from_iana)
    }
}

impl From<CoseAlgorithm> for i64 {
    fn from(alg: CoseAlgorithm) -> Self {
        alg.to_i64()
    }
}

impl TryFrom<i64> for CoseAlgorithm {
    type Error = KeyDecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_i64(value).ok_or(KeyDecodeError::UnsupportedAlgorithm(i128::from(value)))
    }
}

/// The `kty` of a COSE key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseKeyType {
    /// Octet key pair, used for Ed25519.
    Okp,
    /// Elliptic curve key with x and y coordinates.
    Ec2,
    /// RSA key.
    Rsa,
}

impl CoseKeyType {
    fn from_iana(kty: iana::KeyType) -> Option<Self> {
        match kty {
            iana::KeyType::OKP => Some(CoseKeyType::Okp),
            iana::KeyType::EC2 => Some(CoseKeyType::Ec2),
            iana::KeyType::RSA => Some(CoseKeyType::Rsa),
            _ => None,
        }
    }
}

/// Curves understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseEllipticCurve {
    /// NIST P-256
    P256,
    /// NIST P-384
    P384,
    /// NIST P-521
    P521,
    /// Ed25519 for use with EdDSA
    Ed25519,
}

impl CoseEllipticCurve {
    /// Length in bytes of a single coordinate on this curve.
    pub fn coordinate_len(self) -> usize {
        match self {
            CoseEllipticCurve::P256 | CoseEllipticCurve::Ed25519 => 32,
            CoseEllipticCurve::P384 => 48,
            CoseEllipticCurve::P521 => 66,
        }
    }

    fn from_iana(crv: iana::EllipticCurve) -> Option<Self> {
        match crv {
            iana::EllipticCurve::P_256 => Some(CoseEllipticCurve::P256),
            iana::EllipticCurve::P_384 => Some(CoseEllipticCurve::P384),
            iana::EllipticCurve::P_521 => Some(CoseEllipticCurve::P521),
            iana::EllipticCurve::Ed25519 => Some(CoseEllipticCurve::Ed25519),
            _ => None,
        }
    }
}

/// Key type specific parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoseKeyParameters {
    /// An elliptic curve point given by both coordinates.
    Ec2 {
        /// The curve
        curve: CoseEllipticCurve,
        /// Big endian x coordinate, exactly [`CoseEllipticCurve::coordinate_len`] bytes
        x: Vec<u8>,
        /// Big endian y coordinate, exactly [`CoseEllipticCurve::coordinate_len`] bytes
        y: Vec<u8>,
    },
    /// An RSA public key.
    Rsa {
        /// Big endian modulus without leading zeros
        n: Vec<u8>,
        /// Big endian public exponent without leading zeros
        e: Vec<u8>,
    },
    /// An octet key pair public key.
    Okp {
        /// The curve
        curve: CoseEllipticCurve,
        /// The public key bytes
        x: Vec<u8>,
    },
}

/// A credential public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoseKey {
    /// The algorithm the key is used with.
    pub algorithm: CoseAlgorithm,
    /// The key material, its variant always matches the algorithm's key type.
    pub parameters: CoseKeyParameters,
}

/// Reasons a COSE key could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyDecodeError {
    /// The bytes were not a valid binary tree.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The key node was not a map.
    #[error("COSE key is not a map")]
    NotAMap,
    /// A required parameter is absent.
    #[error("COSE key is missing parameter `{0}`")]
    MissingParameter(&'static str),
    /// A parameter has the wrong type or an impossible value.
    #[error("COSE key parameter `{0}` is invalid")]
    InvalidParameter(&'static str),
    /// The `alg` is not one of the supported algorithms.
    #[error("unsupported COSE algorithm {0}")]
    UnsupportedAlgorithm(i128),
    /// The `kty` is not one of the supported key types.
    #[error("unsupported COSE key type {0}")]
    UnsupportedKeyType(i128),
    /// The `crv` is not one of the supported curves.
    #[error("unsupported COSE curve {0}")]
    UnsupportedCurve(i128),
    /// The key type or curve can not be used with the algorithm.
    #[error("algorithm {algorithm:?} can not be used with a {key_type:?} key")]
    AlgorithmKeyTypeMismatch {
        /// The declared algorithm
        algorithm: CoseAlgorithm,
        /// The declared key type
        key_type: CoseKeyType,
    },
    /// A coordinate has the wrong length for its curve.
    #[error("coordinate is {actual} bytes, expected {expected}")]
    InvalidCoordinateLength {
        /// Length required by the curve
        expected: usize,
        /// Length found
        actual: usize,
    },
}

impl CoseKey {
    /// Decode a key from bytes holding exactly one binary tree item.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyDecodeError> {
        let node = cbor::decode(bytes)?;
        Self::decode(&node)
    }

    /// Decode a key from the front of `bytes`, returning how many bytes it occupied.
    pub fn from_prefix(bytes: &[u8], limits: DecodeLimits) -> Result<(Self, usize), KeyDecodeError> {
        let (node, used) = cbor::decode_prefix(bytes, limits)?;
        Ok((Self::decode(&node)?, used))
    }

    /// Interpret a decoded map node as a public key.
    pub fn decode(node: &BinaryNode) -> Result<Self, KeyDecodeError> {
        if node.as_map().is_none() {
            return Err(KeyDecodeError::NotAMap);
        }

        let kty = int_param(node, LABEL_KTY, "kty")?;
        let key_type = i64::try_from(kty)
            .ok()
            .and_then(iana::KeyType::from_i64)
            .and_then(CoseKeyType::from_iana)
            .ok_or(KeyDecodeError::UnsupportedKeyType(kty))?;

        let alg = int_param(node, LABEL_ALG, "alg")?;
        let algorithm = i64::try_from(alg)
            .ok()
            .and_then(CoseAlgorithm::from_i64)
            .ok_or(KeyDecodeError::UnsupportedAlgorithm(alg))?;

        if algorithm.key_type() != key_type {
            return Err(KeyDecodeError::AlgorithmKeyTypeMismatch {
                algorithm,
                key_type,
            });
        }

        let parameters = match key_type {
            CoseKeyType::Ec2 => {
                let curve = curve_param(node)?;
                let x = coordinate(node, iana::Ec2KeyParameter::X.to_i64(), "x", curve)?;
                let y = coordinate(node, iana::Ec2KeyParameter::Y.to_i64(), "y", curve)?;
                CoseKeyParameters::Ec2 { curve, x, y }
            }
            CoseKeyType::Okp => {
                let curve = curve_param(node)?;
                let x = coordinate(node, iana::OkpKeyParameter::X.to_i64(), "x", curve)?;
                CoseKeyParameters::Okp { curve, x }
            }
            CoseKeyType::Rsa => {
                let n = unsigned_param(node, iana::RsaKeyParameter::N.to_i64(), "n")?;
                let e = unsigned_param(node, iana::RsaKeyParameter::E.to_i64(), "e")?;
                CoseKeyParameters::Rsa { n, e }
            }
        };

        if let Some(expected) = algorithm.curve() {
            let curve = match &parameters {
                CoseKeyParameters::Ec2 { curve, .. } | CoseKeyParameters::Okp { curve, .. } => {
                    Some(*curve)
                }
                CoseKeyParameters::Rsa { .. } => None,
            };
            if curve != Some(expected) {
                return Err(KeyDecodeError::AlgorithmKeyTypeMismatch {
                    algorithm,
                    key_type,
                });
            }
        }

        Ok(Self {
            algorithm,
            parameters,
        })
    }

    /// The key type of this key.
    pub fn key_type(&self) -> CoseKeyType {
        match self.parameters {
            CoseKeyParameters::Ec2 { .. } => CoseKeyType::Ec2,
            CoseKeyParameters::Rsa { .. } => CoseKeyType::Rsa,
            CoseKeyParameters::Okp { .. } => CoseKeyType::Okp,
        }
    }

    /// The uncompressed SEC1 encoding `0x04 || x || y` of an EC2 key.
    pub fn sec1_uncompressed(&self) -> Option<Vec<u8>> {
        match &self.parameters {
            CoseKeyParameters::Ec2 { x, y, .. } => {
                let mut point = Vec::with_capacity(1 + x.len() + y.len());
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                Some(point)
            }
            _ => None,
        }
    }
}

fn int_param(node: &BinaryNode, label: i64, name: &'static str) -> Result<i128, KeyDecodeError> {
    node.map_get_int(label)
        .ok_or(KeyDecodeError::MissingParameter(name))?
        .as_integer()
        .ok_or(KeyDecodeError::InvalidParameter(name))
}

fn curve_param(node: &BinaryNode) -> Result<CoseEllipticCurve, KeyDecodeError> {
    let crv = int_param(node, iana::Ec2KeyParameter::Crv.to_i64(), "crv")?;
    i64::try_from(crv)
        .ok()
        .and_then(iana::EllipticCurve::from_i64)
        .and_then(CoseEllipticCurve::from_iana)
        .ok_or(KeyDecodeError::UnsupportedCurve(crv))
}

fn coordinate(
    node: &BinaryNode,
    label: i64,
    name: &'static str,
    curve: CoseEllipticCurve,
) -> Result<Vec<u8>, KeyDecodeError> {
    let bytes = node
        .map_get_int(label)
        .ok_or(KeyDecodeError::MissingParameter(name))?
        .as_bytes()
        .ok_or(KeyDecodeError::InvalidParameter(name))?;
    let expected = curve.coordinate_len();
    if bytes.len() != expected {
        return Err(KeyDecodeError::InvalidCoordinateLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes.to_vec())
}

fn unsigned_param(
    node: &BinaryNode,
    label: i64,
    name: &'static str,
) -> Result<Vec<u8>, KeyDecodeError> {
    let bytes = node
        .map_get_int(label)
        .ok_or(KeyDecodeError::MissingParameter(name))?
        .as_bytes()
        .ok_or(KeyDecodeError::InvalidParameter(name))?;
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    let trimmed = &bytes[start..];
    if trimmed.is_empty() {
        return Err(KeyDecodeError::InvalidParameter(name));
    }
    Ok(trimmed.to_vec())
}
