use passkey_rp_types::{
    cbor::BinaryNode,
    cose::{CoseEllipticCurve, CoseKeyParameters},
};

use super::StatementFields;
use crate::{
    crypto::{verify_signature, HashAlgorithm, PublicKeyHandle, SignatureScheme},
    x509, AttestationFormat, AttestationType, AttestationVerificationResult,
    StatementDecodeError, VerificationContext, VerificationError,
};

/// The `fido-u2f` statement produced by legacy U2F authenticators.
///
/// <https://w3c.github.io/webauthn/#sctn-fido-u2f-attestation>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FidoU2fStatement {
    /// ECDSA P-256 signature over the U2F registration data.
    pub sig: Vec<u8>,
    /// The batch attestation certificate.
    pub x5c: Vec<Vec<u8>>,
}

impl FidoU2fStatement {
    /// Read the statement's fields.
    pub fn decode(att_stmt: &BinaryNode) -> Result<Self, StatementDecodeError> {
        let fields = StatementFields::new(att_stmt, &["sig", "x5c"])?;
        Ok(Self {
            sig: fields.bytes("sig")?,
            x5c: fields.required_certificates("x5c")?,
        })
    }

    pub(crate) fn verify(
        &self,
        ctx: &VerificationContext<'_>,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        let [certificate] = self.x5c.as_slice() else {
            return Err(VerificationError::CertificateRequirement(
                "U2F attestation carries exactly one certificate",
            ));
        };
        let certificate = x509::parse_certificate(certificate)?;
        let attestation_key = x509::public_key(&certificate)?;
        if !matches!(
            attestation_key,
            PublicKeyHandle::Ec {
                curve: CoseEllipticCurve::P256,
                ..
            }
        ) {
            return Err(VerificationError::CertificateRequirement(
                "U2F attestation key must be on P-256",
            ));
        }

        let CoseKeyParameters::Ec2 {
            curve: CoseEllipticCurve::P256,
            x,
            y,
        } = &ctx.credential.public_key.parameters
        else {
            return Err(VerificationError::InvalidPublicKey(
                "U2F credential key must be on P-256",
            ));
        };
        if !ctx.credential.aaguid.is_empty() {
            return Err(VerificationError::AaguidMismatch);
        }

        let credential_id = ctx.credential.credential_id();
        let mut verification_data =
            Vec::with_capacity(1 + 32 + ctx.client_data_hash.len() + credential_id.len() + 65);
        verification_data.push(0x00);
        verification_data.extend_from_slice(ctx.auth_data.rp_id_hash());
        verification_data.extend_from_slice(ctx.client_data_hash);
        verification_data.extend_from_slice(credential_id);
        verification_data.push(0x04);
        verification_data.extend_from_slice(x);
        verification_data.extend_from_slice(y);

        verify_signature(
            &attestation_key,
            SignatureScheme::Ecdsa(HashAlgorithm::Sha256),
            &verification_data,
            &self.sig,
            "U2F registration data",
        )?;

        ctx.verify_chain(AttestationFormat::FidoU2f, &self.x5c, &[])?;
        Ok(ctx.result(AttestationFormat::FidoU2f, AttestationType::Basic, self.x5c.clone()))
    }
}
