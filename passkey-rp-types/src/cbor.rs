//! A bounded decoder for the binary tree format (CBOR) used by attestation objects, COSE keys and
//! authenticator extensions.
//!
//! The decoder is deliberately strict. Everything it reads comes from an authenticator the relying
//! party does not control, so:
//!
//! * every length field is checked against the bytes that remain before anything is allocated,
//! * indefinite length items are rejected,
//! * nesting depth and the total number of nodes are bounded by [`DecodeLimits`],
//! * map keys must be unique,
//! * text strings must be valid UTF-8.
//!
//! Framing is delegated to [`ciborium_ll`], the low level layer of the `ciborium` crate.

use ciborium_io::Read;
use ciborium_ll::{Decoder, Header};
use serde::{Deserialize, Serialize};


const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const SIMPLE_UNDEFINED: u8 = 23;

/// A single decoded node of the binary tree.
///
/// Maps keep their entries in wire order since signatures are computed over the original bytes
/// and some statement formats care about the order they were given in.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryNode {
    /// A map of key/value pairs, keys are unique.
    Map(Vec<(BinaryNode, BinaryNode)>),
    /// An ordered list of nodes.
    Array(Vec<BinaryNode>),
    /// Major type 0.
    UnsignedInt(u64),
    /// Major type 1, the represented value is `-1 - n`.
    NegativeInt(u64),
    /// Major type 2.
    ByteString(Vec<u8>),
    /// Major type 3.
    TextString(String),
    /// `true` or `false`
    Bool(bool),
    /// `null`
    Null,
    /// `undefined`
    Undefined,
    /// Half, single or double precision float, widened to `f64`.
    Float(f64),
    /// A semantic tag wrapping another node.
    Tag(u64, Box<BinaryNode>),
}

impl BinaryNode {
    /// A short name of the node's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            BinaryNode::Map(_) => "map",
            BinaryNode::Array(_) => "array",
            BinaryNode::UnsignedInt(_) | BinaryNode::NegativeInt(_) => "integer",
            BinaryNode::ByteString(_) => "byte string",
            BinaryNode::TextString(_) => "text string",
            BinaryNode::Bool(_) => "bool",
            BinaryNode::Null => "null",
            BinaryNode::Undefined => "undefined",
            BinaryNode::Float(_) => "float",
            BinaryNode::Tag(_, _) => "tag",
        }
    }

    /// The entries of a map node.
    pub fn as_map(&self) -> Option<&[(BinaryNode, BinaryNode)]> {
        match self {
            BinaryNode::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// The items of an array node.
    pub fn as_array(&self) -> Option<&[BinaryNode]> {
        match self {
            BinaryNode::Array(items) => Some(items),
            _ => None,
        }
    }

    /// The content of a byte string node.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BinaryNode::ByteString(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// The content of a text string node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BinaryNode::TextString(text) => Some(text),
            _ => None,
        }
    }

    /// The value of an integer node. Both major types fit losslessly in an `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            BinaryNode::UnsignedInt(n) => Some(i128::from(*n)),
            BinaryNode::NegativeInt(n) => Some(-1 - i128::from(*n)),
            _ => None,
        }
    }

    /// The value of a boolean node.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            BinaryNode::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up the value stored under a text key, if this is a map.
    pub fn map_get_text(&self, key: &str) -> Option<&BinaryNode> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }

    /// Look up the value stored under an integer key, if this is a map.
    pub fn map_get_int(&self, key: i64) -> Option<&BinaryNode> {
        let key = i128::from(key);
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_integer() == Some(key))
            .map(|(_, v)| v)
    }
}

/// Bounds applied while decoding untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DecodeLimits {
    /// How many containers (arrays, maps and tags) may be nested inside each other.
    pub max_depth: usize,
    /// How many nodes a single decode may produce in total.
    pub max_nodes: usize,
}

impl DecodeLimits {
    /// The default maximum nesting depth.
    pub const DEFAULT_MAX_DEPTH: usize = 16;
    /// The default maximum number of nodes.
    pub const DEFAULT_MAX_NODES: usize = 4096;
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_nodes: Self::DEFAULT_MAX_NODES,
        }
    }
}

/// Reasons the binary tree could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input is truncated or structurally invalid.
    #[error("malformed input at offset {offset}: {reason}")]
    Malformed {
        /// Byte offset at which the problem was detected.
        offset: usize,
        /// What was wrong.
        reason: &'static str,
    },
    /// Containers are nested deeper than allowed.
    #[error("nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded {
        /// The configured limit.
        limit: usize,
    },
    /// The input contains more nodes than allowed.
    #[error("node count exceeds the limit of {limit}")]
    NodeLimitExceeded {
        /// The configured limit.
        limit: usize,
    },
    /// A complete item was decoded but input remains.
    #[error("{remaining} trailing bytes after offset {offset}")]
    TrailingBytes {
        /// Where the item ended.
        offset: usize,
        /// How many bytes were left over.
        remaining: usize,
    },
    /// A map contains the same key twice.
    #[error("duplicate map key at offset {offset}")]
    DuplicateMapKey {
        /// Byte offset just after the repeated key.
        offset: usize,
    },
}

/// Decode exactly one item from `bytes` with the default limits.
pub fn decode(bytes: &[u8]) -> Result<BinaryNode, DecodeError> {
    decode_with_limits(bytes, DecodeLimits::default())
}

/// Decode exactly one item from `bytes`; trailing input is an error.
pub fn decode_with_limits(bytes: &[u8], limits: DecodeLimits) -> Result<BinaryNode, DecodeError> {
    let (node, used) = decode_prefix(bytes, limits)?;
    if used != bytes.len() {
        return Err(DecodeError::TrailingBytes {
            offset: used,
            remaining: bytes.len() - used,
        });
    }
    Ok(node)
}

/// Decode the first item in `bytes` and return it together with the number of bytes it used.
///
/// This is needed where an item is embedded in a larger structure without a length prefix, like
/// the credential public key inside authenticator data.
pub fn decode_prefix(bytes: &[u8], limits: DecodeLimits) -> Result<(BinaryNode, usize), DecodeError> {
    let mut parser = Parser {
        decoder: Decoder::from(bytes),
        input_len: bytes.len(),
        limits,
        nodes: 0,
    };
    let node = parser.item(0)?;
    let used = parser.decoder.offset();
    Ok((node, used))
}

struct Parser<'a> {
    decoder: Decoder<&'a [u8]>,
    input_len: usize,
    limits: DecodeLimits,
    nodes: usize,
}

impl Parser<'_> {
    fn offset(&mut self) -> usize {
        self.decoder.offset()
    }

    fn remaining(&mut self) -> usize {
        self.input_len.saturating_sub(self.offset())
    }

    fn malformed(&mut self, reason: &'static str) -> DecodeError {
        DecodeError::Malformed {
            offset: self.offset(),
            reason,
        }
    }

    fn count_node(&mut self) -> Result<(), DecodeError> {
        self.nodes += 1;
        if self.nodes > self.limits.max_nodes {
            log::trace!("binary tree node limit of {} reached", self.limits.max_nodes);
            return Err(DecodeError::NodeLimitExceeded {
                limit: self.limits.max_nodes,
            });
        }
        Ok(())
    }

    fn enter(&self, depth: usize) -> Result<usize, DecodeError> {
        if depth >= self.limits.max_depth {
            log::trace!("binary tree depth limit of {} reached", self.limits.max_depth);
            return Err(DecodeError::DepthLimitExceeded {
                limit: self.limits.max_depth,
            });
        }
        Ok(depth + 1)
    }

    fn read_payload(&mut self, len: usize) -> Result<Vec<u8>, DecodeError> {
        if len > self.remaining() {
            return Err(self.malformed("length exceeds remaining input"));
        }
        let mut buf = vec![0u8; len];
        if self.decoder.read_exact(&mut buf).is_err() {
            return Err(self.malformed("unexpected end of input"));
        }
        Ok(buf)
    }

    fn item(&mut self, depth: usize) -> Result<BinaryNode, DecodeError> {
        self.count_node()?;
        let header = match self.decoder.pull() {
            Ok(header) => header,
            Err(ciborium_ll::Error::Io(_)) => return Err(self.malformed("unexpected end of input")),
            Err(ciborium_ll::Error::Syntax(offset)) => {
                return Err(DecodeError::Malformed {
                    offset,
                    reason: "invalid initial byte",
                })
            }
        };

        match header {
            Header::Positive(n) => Ok(BinaryNode::UnsignedInt(n)),
            Header::Negative(n) => Ok(BinaryNode::NegativeInt(n)),
            Header::Float(f) => Ok(BinaryNode::Float(f)),
            Header::Simple(SIMPLE_FALSE) => Ok(BinaryNode::Bool(false)),
            Header::Simple(SIMPLE_TRUE) => Ok(BinaryNode::Bool(true)),
            Header::Simple(SIMPLE_NULL) => Ok(BinaryNode::Null),
            Header::Simple(SIMPLE_UNDEFINED) => Ok(BinaryNode::Undefined),
            Header::Simple(_) => Err(self.malformed("unsupported simple value")),
            Header::Break => Err(self.malformed("unexpected break")),
            Header::Bytes(None) | Header::Text(None) | Header::Array(None) | Header::Map(None) => {
                Err(self.malformed("indefinite length items are not allowed"))
            }
            Header::Bytes(Some(len)) => self.read_payload(len).map(BinaryNode::ByteString),
            Header::Text(Some(len)) => {
                let raw = self.read_payload(len)?;
                String::from_utf8(raw)
                    .map(BinaryNode::TextString)
                    .map_err(|_| self.malformed("text string is not valid UTF-8"))
            }
            Header::Tag(tag) => {
                let depth = self.enter(depth)?;
                let inner = self.item(depth)?;
                Ok(BinaryNode::Tag(tag, Box::new(inner)))
            }
            Header::Array(Some(len)) => {
                let depth = self.enter(depth)?;
                // Every item takes at least one byte.
                if len > self.remaining() {
                    return Err(self.malformed("array length exceeds remaining input"));
                }
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.item(depth)?);
                }
                Ok(BinaryNode::Array(items))
            }
            Header::Map(Some(len)) => {
                let depth = self.enter(depth)?;
                if len > self.remaining() / 2 {
                    return Err(self.malformed("map length exceeds remaining input"));
                }
                let mut entries: Vec<(BinaryNode, BinaryNode)> = Vec::with_capacity(len);
                for _ in 0..len {
                    let key = self.item(depth)?;
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(DecodeError::DuplicateMapKey {
                            offset: self.offset(),
                        });
                    }
                    let value = self.item(depth)?;
                    entries.push((key, value));
                }
                Ok(BinaryNode::Map(entries))
            }
        }
    }
}
