//! Certificate helpers and the certificate path check shared by every format with an `x5c`.

use chrono::{DateTime, Utc};
use x509_parser::{
    certificate::X509Certificate,
    extensions::{GeneralName, X509Extension},
    x509::X509Version,
};

use crate::{
    crypto::{PublicKeyHandle, SignatureScheme},
    VerificationError,
};


/// Paths longer than this are rejected, which also bounds issuer loops.
pub(crate) const MAX_CHAIN_DEPTH: usize = 16;

/// Parse a DER certificate, rejecting anything that follows it.
pub(crate) fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>, VerificationError> {
    let (rest, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| VerificationError::MalformedCertificate(e.to_string()))?;
    if !rest.is_empty() {
        return Err(VerificationError::MalformedCertificate(
            "trailing bytes after certificate".to_owned(),
        ));
    }
    Ok(cert)
}

/// The subject public key of `cert`.
pub(crate) fn public_key(cert: &X509Certificate<'_>) -> Result<PublicKeyHandle, VerificationError> {
    PublicKeyHandle::from_spki(cert.public_key())
}

pub(crate) fn check_validity(
    cert: &X509Certificate<'_>,
    now: DateTime<Utc>,
) -> Result<(), VerificationError> {
    let validity = cert.validity();
    let now = now.timestamp();
    if now < validity.not_before.timestamp() || now > validity.not_after.timestamp() {
        return Err(VerificationError::CertificateNotValid(cert.subject().to_string()));
    }
    Ok(())
}

pub(crate) fn find_extension<'a, 'b>(
    cert: &'a X509Certificate<'b>,
    oid: &str,
) -> Option<&'a X509Extension<'b>> {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == oid)
}

pub(crate) fn is_ca(cert: &X509Certificate<'_>) -> bool {
    matches!(cert.basic_constraints(), Ok(Some(bc)) if bc.value.ca)
}

pub(crate) fn is_v3(cert: &X509Certificate<'_>) -> bool {
    cert.version() == X509Version::V3
}

/// DNS names from the subject alternative name extension, falling back to the common names.
pub(crate) fn host_names<'a>(cert: &'a X509Certificate<'_>) -> Vec<&'a str> {
    let mut names = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                names.push(*dns);
            }
        }
    }
    names.extend(cert.subject().iter_common_name().filter_map(|cn| cn.as_str().ok()));
    names
}

/// The `id-fido-gen-ce-aaguid` extension, when present, must carry `aaguid` and must not be
/// critical.
pub(crate) fn check_aaguid_extension(
    cert: &X509Certificate<'_>,
    aaguid: &[u8],
) -> Result<(), VerificationError> {
    const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

    let Some(ext) = find_extension(cert, OID_FIDO_GEN_CE_AAGUID) else {
        return Ok(());
    };
    if ext.critical {
        return Err(VerificationError::CertificateRequirement(
            "AAGUID extension must not be critical",
        ));
    }
    let (_, value) = der_parser::der::parse_der_octetstring(ext.value)
        .map_err(|_| VerificationError::ExtensionMismatch("AAGUID extension is malformed"))?;
    let value = value
        .as_slice()
        .map_err(|_| VerificationError::ExtensionMismatch("AAGUID extension is malformed"))?;
    if value != aaguid {
        return Err(VerificationError::AaguidMismatch);
    }
    Ok(())
}

/// Whether `issuer` issued `cert`: the names line up and the signature verifies.
fn issued_by(cert: &X509Certificate<'_>, issuer: &X509Certificate<'_>) -> bool {
    if cert.issuer().as_raw() != issuer.subject().as_raw() {
        return false;
    }
    let Some(scheme) = SignatureScheme::from_oid(&cert.signature_algorithm.algorithm.to_id_string())
    else {
        return false;
    };
    let Ok(key) = public_key(issuer) else {
        return false;
    };
    key.verify(
        scheme,
        cert.tbs_certificate.as_ref(),
        cert.signature_value.data.as_ref(),
    )
    .unwrap_or(false)
}

/// Check that the leaf-first `x5c` path ends at one of `anchors`.
///
/// A certificate that is byte for byte one of the anchors ends the path. Otherwise its issuer is
/// looked up among the remaining `x5c` certificates, which must be CA certificates, and then
/// among the anchors. Every certificate on the path must be valid at `now`.
pub(crate) fn verify_chain(
    x5c: &[Vec<u8>],
    anchors: &[&[u8]],
    now: DateTime<Utc>,
) -> Result<(), VerificationError> {
    if anchors.is_empty() {
        return Err(VerificationError::UntrustedChain("no trust anchors are configured"));
    }
    if x5c.is_empty() {
        return Err(VerificationError::UntrustedChain("empty certificate chain"));
    }

    let chain = x5c
        .iter()
        .map(|der| parse_certificate(der))
        .collect::<Result<Vec<_>, _>>()?;
    let roots = anchors
        .iter()
        .filter_map(|der| parse_certificate(der).ok())
        .collect::<Vec<_>>();

    let mut current = 0;
    for _ in 0..MAX_CHAIN_DEPTH {
        let cert = &chain[current];
        check_validity(cert, now)?;

        if anchors.iter().any(|anchor| *anchor == x5c[current].as_slice()) {
            return Ok(());
        }

        if let Some(next) = (0..chain.len())
            .filter(|&i| i != current)
            .find(|&i| issued_by(cert, &chain[i]))
        {
            if !is_ca(&chain[next]) {
                return Err(VerificationError::CertificateRequirement(
                    "issuing certificate is not a CA",
                ));
            }
            current = next;
            continue;
        }

        return match roots.iter().find(|root| issued_by(cert, root)) {
            Some(root) => check_validity(root, now),
            None => Err(VerificationError::UntrustedChain(
                "certificate chain does not end at a trust anchor",
            )),
        };
    }

    Err(VerificationError::UntrustedChain("certificate chain is too long"))
}
