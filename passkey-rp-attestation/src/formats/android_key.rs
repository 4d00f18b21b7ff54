use der_parser::{
    ber::{BerObject, BerObjectContent, Tag},
    der::parse_der,
};
use passkey_rp_types::{cbor::BinaryNode, cose::CoseAlgorithm};

use super::StatementFields;
use crate::{
    crypto::{verify_signature, PublicKeyHandle},
    x509, AttestationFormat, AttestationType, AttestationVerificationResult,
    StatementDecodeError, VerificationContext, VerificationError,
};

/// The Android Key Attestation `KeyDescription` extension.
const OID_ANDROID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";

const TAG_PURPOSE: Tag = Tag(1);
const TAG_ALL_APPLICATIONS: Tag = Tag(600);
const TAG_ORIGIN: Tag = Tag(702);

const KM_ORIGIN_GENERATED: u64 = 0;
const KM_PURPOSE_SIGN: u64 = 2;

/// The `android-key` statement.
///
/// <https://w3c.github.io/webauthn/#sctn-android-key-attestation>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidKeyStatement {
    /// The algorithm used to produce `sig`.
    pub alg: CoseAlgorithm,
    /// Signature over `authenticatorData || clientDataHash`.
    pub sig: Vec<u8>,
    /// The credential certificate followed by the keystore chain.
    pub x5c: Vec<Vec<u8>>,
}

impl AndroidKeyStatement {
    /// Read the statement's fields.
    pub fn decode(att_stmt: &BinaryNode) -> Result<Self, StatementDecodeError> {
        let fields = StatementFields::new(att_stmt, &["alg", "sig", "x5c"])?;
        Ok(Self {
            alg: fields.algorithm("alg")?,
            sig: fields.bytes("sig")?,
            x5c: fields.required_certificates("x5c")?,
        })
    }

    pub(crate) fn verify(
        &self,
        ctx: &VerificationContext<'_>,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        let leaf = x509::parse_certificate(&self.x5c[0])?;
        let leaf_key = x509::public_key(&leaf)?;
        verify_signature(
            &leaf_key,
            self.alg.into(),
            &ctx.signed_data(),
            &self.sig,
            "authenticator data",
        )?;

        if leaf_key != PublicKeyHandle::from_cose_key(&ctx.credential.public_key)? {
            return Err(VerificationError::PublicKeyMismatch);
        }

        let extension = x509::find_extension(&leaf, OID_ANDROID_KEY_DESCRIPTION)
            .ok_or(VerificationError::MissingExtension("Android key description"))?;
        let description = KeyDescription::parse(extension.value)?;
        description.check(ctx.client_data_hash)?;

        ctx.verify_chain(AttestationFormat::AndroidKey, &self.x5c, &[])?;
        Ok(ctx.result(
            AttestationFormat::AndroidKey,
            AttestationType::Basic,
            self.x5c.clone(),
        ))
    }
}

fn malformed(_: impl std::fmt::Debug) -> VerificationError {
    VerificationError::ExtensionMismatch("Android key description is malformed")
}

/// The parts of an `AuthorizationList` that matter for WebAuthn.
#[derive(Debug, Default, PartialEq, Eq)]
struct AuthorizationList {
    purposes: Vec<u64>,
    all_applications: bool,
    origin: Option<u64>,
}

impl AuthorizationList {
    fn parse(list: &BerObject<'_>) -> Result<Self, VerificationError> {
        let mut parsed = Self::default();
        for entry in list.as_sequence().map_err(malformed)? {
            // every field is EXPLICIT tagged, the inner value is still undecoded
            let BerObjectContent::Unknown(any) = &entry.content else {
                continue;
            };
            match entry.tag() {
                TAG_PURPOSE => {
                    let (_, set) = parse_der(any.data).map_err(malformed)?;
                    for purpose in set.as_set().map_err(malformed)? {
                        parsed.purposes.push(purpose.as_u64().map_err(malformed)?);
                    }
                }
                TAG_ALL_APPLICATIONS => parsed.all_applications = true,
                TAG_ORIGIN => {
                    let (_, origin) = parse_der(any.data).map_err(malformed)?;
                    parsed.origin = Some(origin.as_u64().map_err(malformed)?);
                }
                _ => {}
            }
        }
        Ok(parsed)
    }
}

#[derive(Debug)]
struct KeyDescription {
    attestation_challenge: Vec<u8>,
    software_enforced: AuthorizationList,
    tee_enforced: AuthorizationList,
}

impl KeyDescription {
    fn parse(value: &[u8]) -> Result<Self, VerificationError> {
        let (_, description) = parse_der(value).map_err(malformed)?;
        let fields = description.as_sequence().map_err(malformed)?;
        if fields.len() < 8 {
            return Err(malformed("KeyDescription is too short"));
        }
        Ok(Self {
            attestation_challenge: fields[4].as_slice().map_err(malformed)?.to_vec(),
            software_enforced: AuthorizationList::parse(&fields[6])?,
            tee_enforced: AuthorizationList::parse(&fields[7])?,
        })
    }

    fn check(&self, client_data_hash: &[u8]) -> Result<(), VerificationError> {
        if self.attestation_challenge != client_data_hash {
            return Err(VerificationError::ExtensionMismatch(
                "attestationChallenge is not the client data hash",
            ));
        }

        let lists = [&self.software_enforced, &self.tee_enforced];
        if lists.iter().any(|list| list.all_applications) {
            return Err(VerificationError::ExtensionMismatch(
                "key is usable by all applications",
            ));
        }

        let origins = lists.iter().filter_map(|list| list.origin).collect::<Vec<_>>();
        if origins.is_empty() || origins.iter().any(|origin| *origin != KM_ORIGIN_GENERATED) {
            return Err(VerificationError::ExtensionMismatch(
                "key was not generated in the keystore",
            ));
        }

        let can_sign = lists
            .iter()
            .any(|list| list.purposes.contains(&KM_PURPOSE_SIGN));
        if !can_sign {
            return Err(VerificationError::ExtensionMismatch(
                "key purpose does not include signing",
            ));
        }
        Ok(())
    }
}
