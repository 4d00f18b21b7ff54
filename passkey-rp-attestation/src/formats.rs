//! One module per attestation statement format.
//!
//! Each module owns a statement record with a `decode` function that only checks the shape of the
//! `attStmt` map, and a `verify` function that does the cryptography.

use passkey_rp_types::{cbor::BinaryNode, cose::CoseAlgorithm};

use crate::StatementDecodeError;

mod android_key;
mod android_safetynet;
mod apple;
mod fido_u2f;
mod none;
mod packed;
mod tpm;

pub use self::{
    android_key::AndroidKeyStatement,
    android_safetynet::{AndroidSafetyNetStatement, SafetyNetPolicy},
    apple::AppleStatement,
    fido_u2f::FidoU2fStatement,
    none::NoneStatement,
    packed::PackedStatement,
    tpm::TpmStatement,
};

/// A checked view of an `attStmt` map.
///
/// Keys outside the format's field list are skipped: authenticators add fields a format does not
/// define (Safari sends `alg` next to the `apple` chain). Only a format whose map is closed, such
/// as `none`, goes through [`StatementFields::exact`].
pub(crate) struct StatementFields<'a> {
    entries: &'a [(BinaryNode, BinaryNode)],
}

impl<'a> StatementFields<'a> {
    pub fn new(node: &'a BinaryNode, known: &[&str]) -> Result<Self, StatementDecodeError> {
        let entries = node.as_map().ok_or(StatementDecodeError::NotAMap)?;
        for (key, _) in entries {
            match key.as_text() {
                Some(name) if known.contains(&name) => {}
                Some(name) => log::trace!("ignoring attStmt field {name:?}"),
                None => log::trace!("ignoring attStmt {} key", key.type_name()),
            }
        }
        Ok(Self { entries })
    }

    /// Like [`StatementFields::new`], but any key outside `allowed` is an error.
    pub fn exact(node: &'a BinaryNode, allowed: &[&str]) -> Result<Self, StatementDecodeError> {
        let entries = node.as_map().ok_or(StatementDecodeError::NotAMap)?;
        for (key, _) in entries {
            match key.as_text() {
                Some(name) if allowed.contains(&name) => {}
                Some(name) => return Err(StatementDecodeError::UnexpectedField(name.to_owned())),
                None => {
                    return Err(StatementDecodeError::UnexpectedField(format!(
                        "<{} key>",
                        key.type_name()
                    )))
                }
            }
        }
        Ok(Self { entries })
    }

    fn get(&self, name: &str) -> Option<&'a BinaryNode> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(name))
            .map(|(_, v)| v)
    }

    fn required(&self, name: &'static str) -> Result<&'a BinaryNode, StatementDecodeError> {
        self.get(name).ok_or(StatementDecodeError::MissingField(name))
    }

    /// A mandatory, non-empty byte string.
    pub fn bytes(&self, name: &'static str) -> Result<Vec<u8>, StatementDecodeError> {
        match self.required(name)?.as_bytes() {
            Some(bytes) if !bytes.is_empty() => Ok(bytes.to_vec()),
            _ => Err(StatementDecodeError::InvalidFieldType(name)),
        }
    }

    /// A mandatory, non-empty text string.
    pub fn text(&self, name: &'static str) -> Result<&'a str, StatementDecodeError> {
        match self.required(name)?.as_text() {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(StatementDecodeError::InvalidFieldType(name)),
        }
    }

    /// A mandatory COSE algorithm identifier.
    pub fn algorithm(&self, name: &'static str) -> Result<CoseAlgorithm, StatementDecodeError> {
        let value = self
            .required(name)?
            .as_integer()
            .ok_or(StatementDecodeError::InvalidFieldType(name))?;
        i64::try_from(value)
            .ok()
            .and_then(CoseAlgorithm::from_i64)
            .ok_or_else(|| StatementDecodeError::InvalidEnumValue {
                field: name,
                value: value.to_string(),
            })
    }

    /// An optional certificate chain: when present, a non-empty array of non-empty byte strings.
    pub fn certificates(
        &self,
        name: &'static str,
    ) -> Result<Option<Vec<Vec<u8>>>, StatementDecodeError> {
        let Some(node) = self.get(name) else {
            return Ok(None);
        };
        let items = match node.as_array() {
            Some(items) if !items.is_empty() => items,
            _ => return Err(StatementDecodeError::InvalidFieldType(name)),
        };
        items
            .iter()
            .map(|item| match item.as_bytes() {
                Some(der) if !der.is_empty() => Ok(der.to_vec()),
                _ => Err(StatementDecodeError::InvalidFieldType(name)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// A mandatory certificate chain.
    pub fn required_certificates(
        &self,
        name: &'static str,
    ) -> Result<Vec<Vec<u8>>, StatementDecodeError> {
        self.certificates(name)?
            .ok_or(StatementDecodeError::MissingField(name))
    }
}

#[cfg(test)]
mod tests {
    use passkey_rp_types::cbor::BinaryNode;

    use super::StatementFields;
    use crate::StatementDecodeError;

    fn text(s: &str) -> BinaryNode {
        BinaryNode::TextString(s.to_owned())
    }

    #[test]
    fn unknown_keys_are_skipped() {
        let node = BinaryNode::Map(vec![
            (text("bogus"), BinaryNode::Null),
            (BinaryNode::UnsignedInt(1), BinaryNode::Null),
            (text("sig"), BinaryNode::ByteString(vec![7])),
        ]);
        let fields = StatementFields::new(&node, &["sig"]).unwrap();
        assert_eq!(fields.bytes("sig"), Ok(vec![7]));

        assert!(matches!(
            StatementFields::new(&BinaryNode::Array(vec![]), &["sig"]),
            Err(StatementDecodeError::NotAMap)
        ));
    }

    #[test]
    fn exact_rejects_unknown_keys() {
        let node = BinaryNode::Map(vec![(text("bogus"), BinaryNode::Null)]);
        let err = StatementFields::exact(&node, &["sig"]).err();
        assert_eq!(err, Some(StatementDecodeError::UnexpectedField("bogus".into())));

        let node = BinaryNode::Map(vec![(BinaryNode::UnsignedInt(1), BinaryNode::Null)]);
        assert!(matches!(
            StatementFields::exact(&node, &["sig"]),
            Err(StatementDecodeError::UnexpectedField(_))
        ));
        assert!(StatementFields::exact(&BinaryNode::Map(vec![]), &[]).is_ok());
    }

    #[test]
    fn algorithm_must_be_a_known_integer() {
        let node = BinaryNode::Map(vec![
            (text("a"), BinaryNode::NegativeInt(6)),
            (text("b"), BinaryNode::NegativeInt(999)),
            (text("c"), text("ES256")),
        ]);
        let fields = StatementFields::new(&node, &["a", "b", "c"]).unwrap();

        assert_eq!(
            fields.algorithm("a").unwrap(),
            passkey_rp_types::cose::CoseAlgorithm::ES256
        );
        assert_eq!(
            fields.algorithm("b"),
            Err(StatementDecodeError::InvalidEnumValue {
                field: "b",
                value: "-1000".into()
            })
        );
        assert_eq!(
            fields.algorithm("c"),
            Err(StatementDecodeError::InvalidFieldType("c"))
        );
        assert_eq!(
            fields.algorithm("d"),
            Err(StatementDecodeError::MissingField("d"))
        );
    }

    #[test]
    fn certificate_chains_must_hold_bytes() {
        let node = BinaryNode::Map(vec![
            (text("empty"), BinaryNode::Array(vec![])),
            (text("text"), BinaryNode::Array(vec![text("cert")])),
            (
                text("ok"),
                BinaryNode::Array(vec![BinaryNode::ByteString(vec![1, 2])]),
            ),
        ]);
        let fields = StatementFields::new(&node, &["empty", "text", "ok"]).unwrap();

        assert_eq!(
            fields.certificates("empty"),
            Err(StatementDecodeError::InvalidFieldType("empty"))
        );
        assert_eq!(
            fields.certificates("text"),
            Err(StatementDecodeError::InvalidFieldType("text"))
        );
        assert_eq!(fields.certificates("ok"), Ok(Some(vec![vec![1, 2]])));
        assert_eq!(fields.certificates("absent"), Ok(None));
        assert_eq!(
            fields.required_certificates("absent"),
            Err(StatementDecodeError::MissingField("absent"))
        );
    }

    #[test]
    fn empty_byte_strings_are_invalid() {
        let node = BinaryNode::Map(vec![(text("sig"), BinaryNode::ByteString(vec![]))]);
        let fields = StatementFields::new(&node, &["sig"]).unwrap();
        assert_eq!(
            fields.bytes("sig"),
            Err(StatementDecodeError::InvalidFieldType("sig"))
        );
    }
}
