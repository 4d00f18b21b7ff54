use passkey_rp_types::cbor::BinaryNode;

use super::StatementFields;
use crate::{
    AttestationFormat, AttestationType, AttestationVerificationResult, StatementDecodeError,
    VerificationContext, VerificationError,
};

/// The `none` statement, always an empty map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoneStatement;

impl NoneStatement {
    /// Any field at all is rejected.
    pub fn decode(att_stmt: &BinaryNode) -> Result<Self, StatementDecodeError> {
        StatementFields::exact(att_stmt, &[]).map(|_| Self)
    }

    pub(crate) fn verify(
        &self,
        ctx: &VerificationContext<'_>,
    ) -> Result<AttestationVerificationResult, VerificationError> {
        Ok(ctx.result(AttestationFormat::None, AttestationType::None, Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use passkey_rp_types::cbor::BinaryNode;

    use super::NoneStatement;
    use crate::{
        test_support::{auth_data_with_key, p256_cose_key, verify_at_fixed_time},
        AttestationStatement, AttestationType, StatementDecodeError, TrustAnchors,
    };

    #[test]
    fn empty_map_verifies_as_none() {
        let (_, cose) = p256_cose_key();
        let auth_data = auth_data_with_key(&cose, [0; 16]);
        let statement = AttestationStatement::None(NoneStatement::decode(&BinaryNode::Map(vec![])).unwrap());

        let result = verify_at_fixed_time(TrustAnchors::new(), &statement, &auth_data).unwrap();
        assert_eq!(result.attestation_type, AttestationType::None);
        assert!(result.trust_path.is_empty());
    }

    #[test]
    fn fields_are_a_policy_violation() {
        let node = BinaryNode::Map(vec![(
            BinaryNode::TextString("sig".into()),
            BinaryNode::ByteString(vec![1]),
        )]);
        assert_eq!(
            NoneStatement::decode(&node),
            Err(StatementDecodeError::UnexpectedField("sig".into()))
        );
        assert_eq!(
            NoneStatement::decode(&BinaryNode::Array(vec![])),
            Err(StatementDecodeError::NotAMap)
        );
    }
}
