use std::fmt;

use serde::{Deserialize, Serialize};

/// An Authenticator Attestation GUID is a 128-bit identifier.
///
/// This indicates the type (e.g. make and model) of an Authenticator. Manufacturers are expected
/// to keep it identical across substantially identical authenticators, so a relying party may use
/// it to look up properties of the authenticator. Authenticators that do not attest, as well as
/// U2F devices, report an AAGUID of all `0`s.
///
/// [spec]: https://w3c.github.io/webauthn/#sctn-authenticator-model
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Aaguid(pub [u8; Self::LEN]);

impl Aaguid {
    /// Length in bytes
    pub const LEN: usize = 16;

    /// The all zero AAGUID
    pub const fn new_empty() -> Self {
        Self([0; 16])
    }

    /// Whether this is the all zero AAGUID
    pub fn is_empty(&self) -> bool {
        self.0 == [0; Self::LEN]
    }

    /// Build an AAGUID from exactly 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }
}

impl From<[u8; 16]> for Aaguid {
    fn from(inner: [u8; 16]) -> Self {
        Aaguid(inner)
    }
}

/// Formats as a hyphenated lowercase UUID, the way metadata services publish it.
impl fmt::Display for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = crate::encoding::hex(&self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &hex[..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..]
        )
    }
}

impl Serialize for Aaguid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Aaguid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AaguidVisitor;
        impl<'de> serde::de::Visitor<'de> for AaguidVisitor {
            type Value = Aaguid;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    f,
                    "A byte string of {} bytes long or a hyphenated UUID",
                    Aaguid::LEN
                )
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Aaguid::from_slice(v).ok_or_else(|| {
                    E::custom(format!("Byte string of len {}, is not of len 16", v.len()))
                })
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let digits: String = v.chars().filter(|c| *c != '-').collect();
                data_encoding::HEXLOWER_PERMISSIVE
                    .decode(digits.as_bytes())
                    .ok()
                    .and_then(|bytes| Aaguid::from_slice(&bytes))
                    .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Str(v), &self))
            }
        }
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(AaguidVisitor)
        } else {
            deserializer.deserialize_bytes(AaguidVisitor)
        }
    }
}
