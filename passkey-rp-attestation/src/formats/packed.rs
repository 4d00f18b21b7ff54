use passkey_rp_types::{cbor::BinaryNode, cose::CoseAlgorithm};
use x509_parser::certificate::X509Certificate;

use super::StatementFields;
use crate::{
    crypto::{verify_signature, PublicKeyHandle},
    x509, AttestationFormat, AttestationType, AttestationVerificationResult,
    StatementDecodeError, VerificationContext, VerificationError,
};

/// The `packed` statement.
///
/// <https://w3c.github.io/webauthn/#sctn-packed-attestation>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedStatement {
    /// The algorithm used to produce `sig`.
    pub alg: CoseAlgorithm,
    /// Signature over `authenticatorData || clientDataHash`.
    pub sig: Vec<u8>,
    /// The attestation certificate and its chain, leaf first. Absent for self attestation.
    pub x5c: Option<Vec<Vec<u8>>>,
}

impl PackedStatement {
    /// Read the statement's fields.
    pub fn decode(att_stmt: &BinaryNode) -> Result<Self, StatementDecodeError> {
        let fields = StatementFields::new(att_stmt, &["alg", "sig", "x5c"])?;
        Ok(Self {
            alg: fields.algorithm("alg")?,
            sig: fields.bytes("sig")?,
            x5c: fields.certificates("x5c")?,
        })
    }

    pub(crate) fn verify(
        &self,
        ctx: &VerificationContext<'_>,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        let signed_data = ctx.signed_data();

        let Some(x5c) = &self.x5c else {
            // self attestation
            let credential_alg = ctx.credential.public_key.algorithm;
            if self.alg != credential_alg {
                return Err(VerificationError::AlgorithmMismatch {
                    statement: self.alg,
                    credential: credential_alg,
                });
            }
            let key = PublicKeyHandle::from_cose_key(&ctx.credential.public_key)?;
            verify_signature(&key, self.alg.into(), &signed_data, &self.sig, "authenticator data")?;
            return Ok(ctx.result(AttestationFormat::Packed, AttestationType::Self_, Vec::new()));
        };

        let leaf = x509::parse_certificate(&x5c[0])?;
        check_certificate_requirements(&leaf)?;
        x509::check_aaguid_extension(&leaf, &ctx.credential.aaguid.0)?;

        let key = x509::public_key(&leaf)?;
        verify_signature(&key, self.alg.into(), &signed_data, &self.sig, "authenticator data")?;

        ctx.verify_chain(AttestationFormat::Packed, x5c, &[])?;
        Ok(ctx.result(AttestationFormat::Packed, AttestationType::Basic, x5c.clone()))
    }
}

/// <https://w3c.github.io/webauthn/#sctn-packed-attestation-cert-requirements>
fn check_certificate_requirements(cert: &X509Certificate<'_>) -> Result<(), VerificationError> {
    if !x509::is_v3(cert) {
        return Err(VerificationError::CertificateRequirement(
            "attestation certificate must be version 3",
        ));
    }

    let subject = cert.subject();
    if subject.iter_country().next().is_none() {
        return Err(VerificationError::CertificateRequirement("subject has no country"));
    }
    if subject.iter_organization().next().is_none() {
        return Err(VerificationError::CertificateRequirement("subject has no organization"));
    }
    if subject.iter_common_name().next().is_none() {
        return Err(VerificationError::CertificateRequirement("subject has no common name"));
    }
    let attestation_ou = subject
        .iter_organizational_unit()
        .any(|ou| matches!(ou.as_str(), Ok("Authenticator Attestation")));
    if !attestation_ou {
        return Err(VerificationError::CertificateRequirement(
            "subject organizational unit must be `Authenticator Attestation`",
        ));
    }

    if x509::is_ca(cert) {
        return Err(VerificationError::CertificateRequirement(
            "attestation certificate must not be a CA",
        ));
    }
    Ok(())
}
