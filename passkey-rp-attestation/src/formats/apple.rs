use der_parser::{ber::BerObjectContent, der::parse_der};
use passkey_rp_types::{cbor::BinaryNode, crypto::sha256};

use super::StatementFields;
use crate::{
    crypto::PublicKeyHandle, x509, AttestationFormat, AttestationType,
    AttestationVerificationResult, StatementDecodeError, VerificationContext, VerificationError,
};

const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";

/// The `apple` anonymous attestation statement.
///
/// <https://w3c.github.io/webauthn/#sctn-apple-anonymous-attestation>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleStatement {
    /// The per-credential certificate followed by its chain.
    pub x5c: Vec<Vec<u8>>,
}

impl AppleStatement {
    /// Read the statement's fields.
    pub fn decode(att_stmt: &BinaryNode) -> Result<Self, StatementDecodeError> {
        let fields = StatementFields::new(att_stmt, &["alg", "x5c"])?;
        Ok(Self {
            x5c: fields.required_certificates("x5c")?,
        })
    }

    pub(crate) fn verify(
        &self,
        ctx: &VerificationContext<'_>,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        let leaf = x509::parse_certificate(&self.x5c[0])?;

        let extension = x509::find_extension(&leaf, OID_APPLE_NONCE)
            .ok_or(VerificationError::MissingExtension("Apple nonce"))?;
        let nonce = certificate_nonce(extension.value)?;
        if nonce != sha256(&ctx.signed_data()).as_slice() {
            return Err(VerificationError::NonceMismatch);
        }

        if x509::public_key(&leaf)? != PublicKeyHandle::from_cose_key(&ctx.credential.public_key)? {
            return Err(VerificationError::PublicKeyMismatch);
        }

        ctx.verify_chain(AttestationFormat::Apple, &self.x5c, &[])?;
        Ok(ctx.result(AttestationFormat::Apple, AttestationType::AnonCa, self.x5c.clone()))
    }
}

fn malformed(_: impl std::fmt::Debug) -> VerificationError {
    VerificationError::ExtensionMismatch("Apple nonce extension is malformed")
}

/// `SEQUENCE { [1] EXPLICIT OCTET STRING }`
fn certificate_nonce(value: &[u8]) -> Result<Vec<u8>, VerificationError> {
    let (_, outer) = parse_der(value).map_err(malformed)?;
    let items = outer.as_sequence().map_err(malformed)?;
    let Some(BerObjectContent::Unknown(tagged)) = items.first().map(|item| &item.content) else {
        return Err(malformed("nonce is not tagged"));
    };
    let (_, nonce) = parse_der(tagged.data).map_err(malformed)?;
    Ok(nonce.as_slice().map_err(malformed)?.to_vec())
}

#[cfg(test)]
mod tests {
    use p256::{ecdsa::SigningKey, pkcs8::DecodePrivateKey};
    use passkey_rp_types::{cbor::BinaryNode, crypto::sha256, ctap2::AuthenticatorData};
    use rcgen::{CustomExtension, KeyPair, PKCS_ECDSA_P256_SHA256};

    use super::{certificate_nonce, AppleStatement};
    use crate::{
        test_support::*, AttestationFormat, AttestationStatement, AttestationType, TrustAnchors,
        VerificationError,
    };

    fn nonce_extension(nonce: &[u8]) -> CustomExtension {
        CustomExtension::from_oid_content(
            &[1, 2, 840, 113635, 100, 8, 2],
            der(0x30, &der(0xa1, &der(0x04, nonce))),
        )
    }

    struct AnonymousChain {
        root: TestCert,
        intermediate: TestCert,
        leaf: TestCert,
    }

    impl AnonymousChain {
        /// Issue the credential certificate for `key`, bound to `nonce`.
        fn new(key: KeyPair, nonce: &[u8]) -> Self {
            let root = TestCert::root("Apple WebAuthn Root CA");
            let intermediate = root.intermediate("Apple WebAuthn CA 1");
            let mut params = leaf_params("credential");
            params.custom_extensions.push(nonce_extension(nonce));
            let cert = params
                .signed_by(&key, &intermediate.cert, &intermediate.key)
                .unwrap();
            let leaf = TestCert { key, cert };
            Self {
                root,
                intermediate,
                leaf,
            }
        }

        fn statement(&self) -> AttestationStatement {
            AttestationStatement::Apple(AppleStatement {
                x5c: vec![self.leaf.der(), self.intermediate.der()],
            })
        }

        fn anchors(&self) -> TrustAnchors {
            TrustAnchors::new().with_root(AttestationFormat::Apple, self.root.der())
        }
    }

    fn credential_key() -> KeyPair {
        KeyPair::generate_for(&PKCS_ECDSA_P256_SHA256).unwrap()
    }

    fn auth_data_for(key: &KeyPair) -> AuthenticatorData {
        let signing_key = SigningKey::from_pkcs8_der(&key.serialize_der()).unwrap();
        auth_data_with_key(&cose_key_for(&signing_key), [0x61; 16])
    }

    #[test]
    fn anonymous_certificate_verifies_as_anonca() {
        let key = credential_key();
        let auth_data = auth_data_for(&key);
        let nonce = sha256(&auth_data.signed_data(&CLIENT_DATA_HASH));
        let chain = AnonymousChain::new(key, &nonce);

        let result = verify_at_fixed_time(chain.anchors(), &chain.statement(), &auth_data).unwrap();
        assert_eq!(result.attestation_type, AttestationType::AnonCa);
        assert_eq!(result.trust_path.len(), 2);

        assert!(matches!(
            verify_at_fixed_time(TrustAnchors::new(), &chain.statement(), &auth_data),
            Err(VerificationError::UntrustedChain(_))
        ));
    }

    #[test]
    fn safari_statement_with_alg_decodes_and_verifies() {
        let key = credential_key();
        let auth_data = auth_data_for(&key);
        let nonce = sha256(&auth_data.signed_data(&CLIENT_DATA_HASH));
        let chain = AnonymousChain::new(key, &nonce);

        // {"alg": -7, "x5c": [leaf, intermediate]}
        let att_stmt = BinaryNode::Map(vec![
            (
                BinaryNode::TextString("alg".into()),
                BinaryNode::NegativeInt(6),
            ),
            (
                BinaryNode::TextString("x5c".into()),
                BinaryNode::Array(vec![
                    BinaryNode::ByteString(chain.leaf.der()),
                    BinaryNode::ByteString(chain.intermediate.der()),
                ]),
            ),
        ]);
        let statement = AttestationStatement::decode(AttestationFormat::Apple, &att_stmt).unwrap();
        assert_eq!(statement, chain.statement());

        let result = verify_at_fixed_time(chain.anchors(), &statement, &auth_data).unwrap();
        assert_eq!(result.attestation_type, AttestationType::AnonCa);
    }

    #[test]
    fn nonce_must_bind_the_authenticator_data() {
        let key = credential_key();
        let auth_data = auth_data_for(&key);
        let chain = AnonymousChain::new(key, &[0; 32]);

        assert_eq!(
            verify_at_fixed_time(chain.anchors(), &chain.statement(), &auth_data),
            Err(VerificationError::NonceMismatch)
        );
    }

    #[test]
    fn certified_key_must_be_the_credential_key() {
        let (_, cose) = p256_cose_key();
        let auth_data = auth_data_with_key(&cose, [0x61; 16]);
        let nonce = sha256(&auth_data.signed_data(&CLIENT_DATA_HASH));
        let chain = AnonymousChain::new(credential_key(), &nonce);

        assert_eq!(
            verify_at_fixed_time(chain.anchors(), &chain.statement(), &auth_data),
            Err(VerificationError::PublicKeyMismatch)
        );
    }

    #[test]
    fn nonce_extension_must_be_tagged() {
        let untagged = der(0x30, &der(0x04, &[1; 32]));
        assert!(matches!(
            certificate_nonce(&untagged),
            Err(VerificationError::ExtensionMismatch(_))
        ));
        let tagged = der(0x30, &der(0xa1, &der(0x04, &[1; 32])));
        assert_eq!(certificate_nonce(&tagged).unwrap(), vec![1; 32]);
    }
}
