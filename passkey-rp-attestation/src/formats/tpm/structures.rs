//! The two TPM 2.0 structures a `tpm` statement carries: `TPMS_ATTEST` (`certInfo`) and
//! `TPMT_PUBLIC` (`pubArea`). Everything is big endian and sized fields are `TPM2B` style, a
//! `u16` length followed by that many bytes.

use passkey_rp_types::cose::CoseEllipticCurve;
use rsa::BigUint;

use crate::{
    crypto::{HashAlgorithm, PublicKeyHandle},
    VerificationError,
};

/// `TPM_GENERATED_VALUE`
const TPM_GENERATED: u32 = 0xff54_4347;
/// `TPM_ST_ATTEST_CERTIFY`
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

const TPM_ALG_RSA: u16 = 0x0001;
const TPM_ALG_SHA1: u16 = 0x0004;
const TPM_ALG_SHA256: u16 = 0x000b;
const TPM_ALG_SHA384: u16 = 0x000c;
const TPM_ALG_SHA512: u16 = 0x000d;
const TPM_ALG_NULL: u16 = 0x0010;
const TPM_ALG_ECC: u16 = 0x0023;

const TPM_ECC_NIST_P256: u16 = 0x0003;
const TPM_ECC_NIST_P384: u16 = 0x0004;
const TPM_ECC_NIST_P521: u16 = 0x0005;

/// An RSA exponent of zero stands for the default exponent.
const RSA_DEFAULT_EXPONENT: u32 = 65537;

fn malformed(what: &'static str) -> VerificationError {
    VerificationError::TpmStructure(what)
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], VerificationError> {
        if self.data.len() < len {
            return Err(malformed(what));
        }
        let (head, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], VerificationError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, VerificationError> {
        self.array(what).map(u16::from_be_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, VerificationError> {
        self.array(what).map(u32::from_be_bytes)
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, VerificationError> {
        self.array(what).map(u64::from_be_bytes)
    }

    fn sized(&mut self, what: &'static str) -> Result<&'a [u8], VerificationError> {
        let len = self.u16(what)?;
        self.take(usize::from(len), what)
    }

    fn null_alg(&mut self, what: &'static str) -> Result<(), VerificationError> {
        if self.u16(what)? == TPM_ALG_NULL {
            Ok(())
        } else {
            Err(malformed(what))
        }
    }

    fn finish(self, what: &'static str) -> Result<(), VerificationError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(malformed(what))
        }
    }
}

/// `TPMS_CLOCK_INFO`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: bool,
}

/// `TPMS_ATTEST` restricted to the certify variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmAttest<'a> {
    pub qualified_signer: &'a [u8],
    pub extra_data: &'a [u8],
    pub clock_info: ClockInfo,
    pub firmware_version: u64,
    /// `TPMS_CERTIFY_INFO.name`
    pub attested_name: &'a [u8],
    /// `TPMS_CERTIFY_INFO.qualifiedName`
    pub attested_qualified_name: &'a [u8],
}

impl<'a> TpmAttest<'a> {
    pub fn parse(cert_info: &'a [u8]) -> Result<Self, VerificationError> {
        let mut reader = Reader::new(cert_info);
        if reader.u32("certInfo magic")? != TPM_GENERATED {
            return Err(VerificationError::TpmMismatch("certInfo magic is not TPM_GENERATED_VALUE"));
        }
        if reader.u16("certInfo type")? != TPM_ST_ATTEST_CERTIFY {
            return Err(VerificationError::TpmMismatch("certInfo is not TPM_ST_ATTEST_CERTIFY"));
        }
        let qualified_signer = reader.sized("certInfo qualifiedSigner")?;
        let extra_data = reader.sized("certInfo extraData")?;
        let clock_info = ClockInfo {
            clock: reader.u64("certInfo clockInfo")?,
            reset_count: reader.u32("certInfo clockInfo")?,
            restart_count: reader.u32("certInfo clockInfo")?,
            safe: reader.array::<1>("certInfo clockInfo")?[0] != 0,
        };
        let firmware_version = reader.u64("certInfo firmwareVersion")?;
        let attested_name = reader.sized("certInfo attested name")?;
        let attested_qualified_name = reader.sized("certInfo attested qualifiedName")?;
        reader.finish("trailing bytes after certInfo")?;

        Ok(Self {
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            attested_name,
            attested_qualified_name,
        })
    }
}

/// The algorithm specific part of `TPMT_PUBLIC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmPublicKey<'a> {
    Rsa {
        key_bits: u16,
        /// Already mapped from zero to the default exponent.
        exponent: u32,
        modulus: &'a [u8],
    },
    Ecc {
        curve: CoseEllipticCurve,
        x: &'a [u8],
        y: &'a [u8],
    },
}

/// `TPMT_PUBLIC`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmPublic<'a> {
    pub name_alg: HashAlgorithm,
    /// Raw `nameAlg` identifier, it prefixes the object name.
    pub name_alg_id: u16,
    pub object_attributes: u32,
    pub auth_policy: &'a [u8],
    pub key: TpmPublicKey<'a>,
}

impl<'a> TpmPublic<'a> {
    pub fn parse(pub_area: &'a [u8]) -> Result<Self, VerificationError> {
        let mut reader = Reader::new(pub_area);
        let alg_type = reader.u16("pubArea type")?;
        let name_alg_id = reader.u16("pubArea nameAlg")?;
        let name_alg = match name_alg_id {
            TPM_ALG_SHA1 => HashAlgorithm::Sha1,
            TPM_ALG_SHA256 => HashAlgorithm::Sha256,
            TPM_ALG_SHA384 => HashAlgorithm::Sha384,
            TPM_ALG_SHA512 => HashAlgorithm::Sha512,
            _ => return Err(malformed("pubArea nameAlg is not a supported hash")),
        };
        let object_attributes = reader.u32("pubArea objectAttributes")?;
        let auth_policy = reader.sized("pubArea authPolicy")?;

        // symmetric, scheme and kdf selections must all be TPM_ALG_NULL
        let key = match alg_type {
            TPM_ALG_RSA => {
                reader.null_alg("pubArea RSA symmetric must be TPM_ALG_NULL")?;
                reader.null_alg("pubArea RSA scheme must be TPM_ALG_NULL")?;
                let key_bits = reader.u16("pubArea RSA keyBits")?;
                let exponent = match reader.u32("pubArea RSA exponent")? {
                    0 => RSA_DEFAULT_EXPONENT,
                    e => e,
                };
                let modulus = reader.sized("pubArea RSA unique")?;
                TpmPublicKey::Rsa {
                    key_bits,
                    exponent,
                    modulus,
                }
            }
            TPM_ALG_ECC => {
                reader.null_alg("pubArea ECC symmetric must be TPM_ALG_NULL")?;
                reader.null_alg("pubArea ECC scheme must be TPM_ALG_NULL")?;
                let curve = match reader.u16("pubArea ECC curveID")? {
                    TPM_ECC_NIST_P256 => CoseEllipticCurve::P256,
                    TPM_ECC_NIST_P384 => CoseEllipticCurve::P384,
                    TPM_ECC_NIST_P521 => CoseEllipticCurve::P521,
                    _ => return Err(malformed("pubArea ECC curveID is not supported")),
                };
                reader.null_alg("pubArea ECC kdf must be TPM_ALG_NULL")?;
                let x = reader.sized("pubArea ECC unique x")?;
                let y = reader.sized("pubArea ECC unique y")?;
                TpmPublicKey::Ecc { curve, x, y }
            }
            _ => return Err(malformed("pubArea type is neither RSA nor ECC")),
        };
        reader.finish("trailing bytes after pubArea")?;

        Ok(Self {
            name_alg,
            name_alg_id,
            object_attributes,
            auth_policy,
            key,
        })
    }

    /// The key this area describes.
    pub fn public_key(&self) -> Result<PublicKeyHandle, VerificationError> {
        match &self.key {
            TpmPublicKey::Rsa {
                key_bits,
                exponent,
                modulus,
            } => {
                if modulus.len() * 8 != usize::from(*key_bits) {
                    return Err(VerificationError::TpmMismatch(
                        "RSA modulus length does not match keyBits",
                    ));
                }
                PublicKeyHandle::rsa(
                    BigUint::from_bytes_be(modulus),
                    BigUint::from(*exponent),
                )
            }
            TpmPublicKey::Ecc { curve, x, y } => {
                let mut point = Vec::with_capacity(1 + x.len() + y.len());
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                PublicKeyHandle::ec(*curve, &point)
            }
        }
    }

    /// The TPM name of an object with this public area: `nameAlg || H(pubArea)`.
    pub fn name(&self, pub_area: &[u8]) -> Vec<u8> {
        let mut name = self.name_alg_id.to_be_bytes().to_vec();
        name.extend(self.name_alg.digest(pub_area));
        name
    }
}

#[cfg(test)]
pub(crate) fn ecc_pub_area(x: &[u8], y: &[u8]) -> Vec<u8> {
    let mut area = Vec::new();
    area.extend_from_slice(&TPM_ALG_ECC.to_be_bytes());
    area.extend_from_slice(&TPM_ALG_SHA256.to_be_bytes());
    area.extend_from_slice(&0x0006_0472u32.to_be_bytes());
    area.extend_from_slice(&0u16.to_be_bytes());
    area.extend_from_slice(&TPM_ALG_NULL.to_be_bytes());
    area.extend_from_slice(&TPM_ALG_NULL.to_be_bytes());
    area.extend_from_slice(&TPM_ECC_NIST_P256.to_be_bytes());
    area.extend_from_slice(&TPM_ALG_NULL.to_be_bytes());
    for coordinate in [x, y] {
        area.extend_from_slice(&u16::try_from(coordinate.len()).unwrap().to_be_bytes());
        area.extend_from_slice(coordinate);
    }
    area
}

#[cfg(test)]
pub(crate) fn certify_info(extra_data: &[u8], name: &[u8]) -> Vec<u8> {
    let mut info = Vec::new();
    info.extend_from_slice(&TPM_GENERATED.to_be_bytes());
    info.extend_from_slice(&TPM_ST_ATTEST_CERTIFY.to_be_bytes());
    info.extend_from_slice(&[0, 2, 0xaa, 0xbb]);
    info.extend_from_slice(&u16::try_from(extra_data.len()).unwrap().to_be_bytes());
    info.extend_from_slice(extra_data);
    info.extend_from_slice(&7u64.to_be_bytes());
    info.extend_from_slice(&1u32.to_be_bytes());
    info.extend_from_slice(&2u32.to_be_bytes());
    info.push(1);
    info.extend_from_slice(&0x2020_0101u64.to_be_bytes());
    info.extend_from_slice(&u16::try_from(name.len()).unwrap().to_be_bytes());
    info.extend_from_slice(name);
    info.extend_from_slice(&[0, 0]);
    info
}
