use passkey_rp_types::{cbor::BinaryNode, cose::CoseAlgorithm};
use x509_parser::{certificate::X509Certificate, extensions::GeneralName};

use self::structures::{TpmAttest, TpmPublic};
use super::StatementFields;
use crate::{
    crypto::{verify_signature, PublicKeyHandle, SignatureScheme},
    x509, AttestationFormat, AttestationType, AttestationVerificationResult,
    StatementDecodeError, TpmManufacturerPolicy, VerificationContext, VerificationError,
};

mod structures;

const OID_TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";
const OID_TCG_AT_TPM_MANUFACTURER: &str = "2.23.133.2.1";
const OID_TCG_AT_TPM_MODEL: &str = "2.23.133.2.2";
const OID_TCG_AT_TPM_VERSION: &str = "2.23.133.2.3";

/// The `tpm` statement.
///
/// <https://w3c.github.io/webauthn/#sctn-tpm-attestation>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmStatement {
    /// Always `2.0`.
    pub ver: String,
    /// The algorithm used to produce `sig`.
    pub alg: CoseAlgorithm,
    /// The AIK certificate followed by its chain.
    pub x5c: Vec<Vec<u8>>,
    /// Signature over `cert_info` with the AIK.
    pub sig: Vec<u8>,
    /// A `TPMS_ATTEST` structure.
    pub cert_info: Vec<u8>,
    /// A `TPMT_PUBLIC` structure describing the credential public key.
    pub pub_area: Vec<u8>,
}

impl TpmStatement {
    /// Read the statement's fields. Only version `2.0` is understood.
    pub fn decode(att_stmt: &BinaryNode) -> Result<Self, StatementDecodeError> {
        let fields = StatementFields::new(
            att_stmt,
            &["ver", "alg", "x5c", "sig", "certInfo", "pubArea"],
        )?;
        let ver = fields.text("ver")?;
        if ver != "2.0" {
            return Err(StatementDecodeError::InvalidEnumValue {
                field: "ver",
                value: ver.to_owned(),
            });
        }
        Ok(Self {
            ver: ver.to_owned(),
            alg: fields.algorithm("alg")?,
            x5c: fields.required_certificates("x5c")?,
            sig: fields.bytes("sig")?,
            cert_info: fields.bytes("certInfo")?,
            pub_area: fields.bytes("pubArea")?,
        })
    }

    pub(crate) fn verify(
        &self,
        ctx: &VerificationContext<'_>,
        manufacturers: &dyn TpmManufacturerPolicy,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        let pub_area = TpmPublic::parse(&self.pub_area)?;
        let credential_key = PublicKeyHandle::from_cose_key(&ctx.credential.public_key)?;
        if pub_area.public_key()? != credential_key {
            return Err(VerificationError::PublicKeyMismatch);
        }

        let cert_info = TpmAttest::parse(&self.cert_info)?;
        log::trace!(
            "TPM certInfo: firmware {:#x}, clock {:?}, pubArea attributes {:#x}",
            cert_info.firmware_version,
            cert_info.clock_info,
            pub_area.object_attributes,
        );

        let scheme = SignatureScheme::from(self.alg);
        let hash = scheme.hash().ok_or_else(|| {
            VerificationError::UnsupportedAlgorithm(format!("{:?} in a TPM statement", self.alg))
        })?;
        if cert_info.extra_data != hash.digest(&ctx.signed_data()).as_slice() {
            return Err(VerificationError::TpmMismatch(
                "extraData is not the hash of the signed data",
            ));
        }
        if cert_info.attested_name != pub_area.name(&self.pub_area).as_slice() {
            return Err(VerificationError::TpmMismatch(
                "attested name does not match pubArea",
            ));
        }

        let aik = x509::parse_certificate(&self.x5c[0])?;
        let aik_key = x509::public_key(&aik)?;
        verify_signature(&aik_key, scheme, &self.cert_info, &self.sig, "certInfo")?;

        check_aik_requirements(&aik)?;
        x509::check_aaguid_extension(&aik, &ctx.credential.aaguid.0)?;

        let manufacturer = tpm_manufacturer(&aik)?;
        let extra_roots = manufacturers
            .check(&manufacturer)
            .ok_or(VerificationError::UnknownTpmManufacturer(manufacturer))?;

        ctx.verify_chain(AttestationFormat::Tpm, &self.x5c, &extra_roots)?;
        Ok(ctx.result(AttestationFormat::Tpm, AttestationType::AttCa, self.x5c.clone()))
    }
}

/// <https://w3c.github.io/webauthn/#sctn-tpm-cert-requirements>
fn check_aik_requirements(cert: &X509Certificate<'_>) -> Result<(), VerificationError> {
    if !x509::is_v3(cert) {
        return Err(VerificationError::CertificateRequirement(
            "AIK certificate must be version 3",
        ));
    }
    if cert.subject().iter().next().is_some() {
        return Err(VerificationError::CertificateRequirement(
            "AIK certificate subject must be empty",
        ));
    }

    let eku = cert
        .extended_key_usage()
        .map_err(|e| VerificationError::MalformedCertificate(e.to_string()))?
        .ok_or(VerificationError::MissingExtension("extended key usage"))?;
    let is_aik = eku
        .value
        .other
        .iter()
        .any(|oid| oid.to_id_string() == OID_TCG_KP_AIK_CERTIFICATE);
    if !is_aik {
        return Err(VerificationError::CertificateRequirement(
            "AIK certificate must have the tcg-kp-AIKCertificate key purpose",
        ));
    }

    if x509::is_ca(cert) {
        return Err(VerificationError::CertificateRequirement(
            "AIK certificate must not be a CA",
        ));
    }
    Ok(())
}

/// The TPM manufacturer from the directory name in the subject alternative name. Model and
/// version must be present as well.
fn tpm_manufacturer(cert: &X509Certificate<'_>) -> Result<String, VerificationError> {
    let san = cert
        .subject_alternative_name()
        .map_err(|e| VerificationError::MalformedCertificate(e.to_string()))?
        .ok_or(VerificationError::MissingExtension("subject alternative name"))?;

    let mut manufacturer = None;
    let mut model = false;
    let mut version = false;
    for name in &san.value.general_names {
        let GeneralName::DirectoryName(directory) = name else {
            continue;
        };
        for attribute in directory.iter_attributes() {
            match attribute.attr_type().to_id_string().as_str() {
                OID_TCG_AT_TPM_MANUFACTURER => {
                    manufacturer = attribute.as_str().ok().map(str::to_owned);
                }
                OID_TCG_AT_TPM_MODEL => model = true,
                OID_TCG_AT_TPM_VERSION => version = true,
                _ => {}
            }
        }
    }

    match manufacturer {
        Some(manufacturer) if model && version => Ok(manufacturer),
        _ => Err(VerificationError::ExtensionMismatch(
            "subject alternative name lacks the TPM manufacturer, model or version",
        )),
    }
}

#[cfg(test)]
mod tests {
    use p256::ecdsa::SigningKey;
    use passkey_rp_types::cbor::BinaryNode;
    use rcgen::{CertificateParams, CustomExtension, DistinguishedName, IsCa};

    use super::{
        structures::{certify_info, ecc_pub_area, TpmPublic},
        TpmStatement,
    };
    use crate::{
        test_support::*, AttestationFormat, AttestationStatement, AttestationType,
        AttestationVerifier, KnownTpmManufacturers, StatementDecodeError, TpmManufacturerOverride,
        TrustAnchors, VerificationError,
    };

    const CONFORMANCE_VENDOR: &str = "id:FFFFF1D0";

    fn utf8(text: &str) -> Vec<u8> {
        der(0x0c, text.as_bytes())
    }

    /// GeneralNames holding one directory name with the TCG device attributes.
    fn tpm_san(manufacturer: &str) -> CustomExtension {
        let attribute = |oid_tail: u8, value: &str| {
            let oid = der(0x06, &[0x67, 0x81, 0x05, 0x02, oid_tail]);
            der(0x31, &der(0x30, &[oid, utf8(value)].concat()))
        };
        let name = der(
            0x30,
            &[
                attribute(1, manufacturer),
                attribute(2, "NPCT75x"),
                attribute(3, "id:0007"),
            ]
            .concat(),
        );
        let general_names = der(0x30, &der(0xa4, &name));
        let mut ext = CustomExtension::from_oid_content(&[2, 5, 29, 17], general_names);
        ext.set_criticality(true);
        ext
    }

    fn aik_eku() -> CustomExtension {
        let purpose = der(0x06, &[0x67, 0x81, 0x05, 0x08, 0x03]);
        CustomExtension::from_oid_content(&[2, 5, 29, 37], der(0x30, &purpose))
    }

    fn aik_params(manufacturer: &str) -> CertificateParams {
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name = DistinguishedName::new();
        params.is_ca = IsCa::ExplicitNoCa;
        params.custom_extensions = vec![tpm_san(manufacturer), aik_eku()];
        params
    }

    struct Fixture {
        root: TestCert,
        auth_data: passkey_rp_types::ctap2::AuthenticatorData,
        statement: TpmStatement,
    }

    fn fixture(manufacturer: &str, tamper: impl FnOnce(&mut Vec<u8>, &mut Vec<u8>)) -> Fixture {
        let root = TestCert::root("TPM Root");
        let aik = root.issue(aik_params(manufacturer));

        let credential = SigningKey::from_slice(&[0x29; 32]).unwrap();
        let cose = cose_key_for(&credential);
        let auth_data = auth_data_with_key(&cose, [0x08; 16]);

        let point = credential.verifying_key().to_encoded_point(false);
        let mut pub_area = ecc_pub_area(point.x().unwrap(), point.y().unwrap());
        let name = TpmPublic::parse(&pub_area).unwrap().name(&pub_area);
        let extra_data = passkey_rp_types::crypto::sha256(&auth_data.signed_data(&CLIENT_DATA_HASH));
        let mut cert_info = certify_info(&extra_data, &name);
        tamper(&mut cert_info, &mut pub_area);

        let sig = sign(&aik.signing_key(), &cert_info);
        let statement = TpmStatement {
            ver: "2.0".into(),
            alg: passkey_rp_types::cose::CoseAlgorithm::ES256,
            x5c: vec![aik.der()],
            sig,
            cert_info,
            pub_area,
        };
        Fixture {
            root,
            auth_data,
            statement,
        }
    }

    fn verifier(root: &TestCert) -> AttestationVerifier {
        AttestationVerifier::new(TrustAnchors::new().with_root(AttestationFormat::Tpm, root.der()))
    }

    #[test]
    fn registered_vendor_verifies_as_attca() {
        let Fixture {
            root,
            auth_data,
            statement,
        } = fixture("id:4E544300", |_, _| {});
        let result = verify_with(
            &verifier(&root),
            &AttestationStatement::Tpm(statement.clone()),
            &auth_data,
        )
        .unwrap();
        assert_eq!(result.attestation_type, AttestationType::AttCa);
        assert_eq!(result.trust_path, statement.x5c);
    }

    #[test]
    fn unregistered_vendor_is_rejected_unless_overridden() {
        let Fixture {
            root,
            auth_data,
            statement,
        } = fixture(CONFORMANCE_VENDOR, |_, _| {});
        let statement = AttestationStatement::Tpm(statement);

        assert_eq!(
            verify_with(&verifier(&root), &statement, &auth_data),
            Err(VerificationError::UnknownTpmManufacturer(CONFORMANCE_VENDOR.into()))
        );

        // the override supplies the conformance root, no TPM anchor is configured at all
        let root_der = root.der();
        let policy = TpmManufacturerOverride::new(KnownTpmManufacturers, move |id: &str| {
            (id == CONFORMANCE_VENDOR).then(|| vec![root_der.clone()])
        });
        let verifier =
            AttestationVerifier::new(TrustAnchors::new()).with_tpm_manufacturer_policy(policy);
        let result = verify_with(&verifier, &statement, &auth_data).unwrap();
        assert_eq!(result.attestation_type, AttestationType::AttCa);
    }

    #[test]
    fn extra_data_must_bind_the_signed_data() {
        let Fixture {
            root,
            auth_data,
            statement,
        } = fixture("id:4E544300", |cert_info, _| {
            // first byte of extraData, after magic, type and the four byte qualifiedSigner
            cert_info[12] ^= 0xff;
        });
        assert_eq!(
            verify_with(&verifier(&root), &AttestationStatement::Tpm(statement), &auth_data),
            Err(VerificationError::TpmMismatch(
                "extraData is not the hash of the signed data"
            ))
        );
    }

    #[test]
    fn pub_area_must_be_the_credential_key() {
        let Fixture {
            root,
            auth_data,
            statement,
        } = fixture("id:4E544300", |_, pub_area| {
            let other = SigningKey::from_slice(&[0x31; 32]).unwrap();
            let point = other.verifying_key().to_encoded_point(false);
            *pub_area = ecc_pub_area(point.x().unwrap(), point.y().unwrap());
        });
        assert_eq!(
            verify_with(&verifier(&root), &AttestationStatement::Tpm(statement), &auth_data),
            Err(VerificationError::PublicKeyMismatch)
        );
    }

    #[test]
    fn signature_over_cert_info_is_checked() {
        let Fixture {
            root,
            auth_data,
            mut statement,
        } = fixture("id:4E544300", |_, _| {});
        let last = statement.sig.len() - 1;
        statement.sig[last] ^= 0x01;
        assert_eq!(
            verify_with(&verifier(&root), &AttestationStatement::Tpm(statement), &auth_data),
            Err(VerificationError::InvalidSignature("certInfo"))
        );
    }

    #[test]
    fn decode_requires_version_2() {
        let text = |s: &str| BinaryNode::TextString(s.into());
        let bytes = || BinaryNode::ByteString(vec![1]);
        let statement = |ver: &str| {
            BinaryNode::Map(vec![
                (text("ver"), text(ver)),
                (text("alg"), BinaryNode::NegativeInt(6)),
                (text("x5c"), BinaryNode::Array(vec![bytes()])),
                (text("sig"), bytes()),
                (text("certInfo"), bytes()),
                (text("pubArea"), bytes()),
            ])
        };

        assert!(TpmStatement::decode(&statement("2.0")).is_ok());
        assert_eq!(
            TpmStatement::decode(&statement("1.2")),
            Err(StatementDecodeError::InvalidEnumValue {
                field: "ver",
                value: "1.2".into()
            })
        );
    }
}
