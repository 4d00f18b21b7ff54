use crate::{
    cbor::{self, BinaryNode, DecodeError, DecodeLimits},
    cose::{CoseKey, KeyDecodeError},
    ctap2::{Aaguid, Flags},
};

/// hash len (32 bytes) + flags (1 byte) + counter (4 bytes)
const MIN_AUTH_DATA_LEN: usize = 37;

/// Credential ids longer than this are rejected.
///
/// <https://w3c.github.io/webauthn/#credential-id>
pub const MAX_CREDENTIAL_ID_LEN: usize = 1023;

/// Reasons authenticator data could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthenticatorDataError {
    /// Shorter than the fixed 37 byte prefix.
    #[error("authenticator data is {0} bytes, at least 37 are required")]
    TooShort(usize),
    /// A length prefixed field runs past the end of the data.
    #[error("authenticator data is truncated in {0}")]
    Truncated(&'static str),
    /// The credential id is longer than permitted.
    #[error("credential id is {0} bytes long")]
    CredentialIdTooLong(usize),
    /// The credential public key could not be decoded.
    #[error("invalid credential public key: {0}")]
    CredentialPublicKey(#[from] KeyDecodeError),
    /// The extensions could not be decoded.
    #[error("invalid extensions: {0}")]
    Extensions(DecodeError),
    /// The extensions are not a map.
    #[error("extensions are not a map")]
    ExtensionsNotAMap,
    /// Bytes remain that no flag accounts for.
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
}

/// The authenticator data structure encodes contextual bindings made by the authenticator. These
/// bindings are controlled by the authenticator itself, and derive their trust from the WebAuthn
/// Relying Party's assessment of the security properties of the authenticator.
///
/// The raw bytes are kept: signatures are computed over them and re-encoding is not guaranteed to
/// reproduce them.
///
/// <https://w3c.github.io/webauthn/#sctn-authenticator-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    raw: Vec<u8>,

    /// SHA-256 hash of the RP ID the credential is scoped to.
    rp_id_hash: [u8; 32],

    /// The flags representing the information of this credential. See [Flags] for more information.
    pub flags: Flags,

    /// Signature counter, 32-bit unsigned big-endian integer.
    pub sign_count: u32,

    /// Present if and only if [`Flags::AT`] is set.
    pub attested_credential_data: Option<AttestedCredentialData>,

    /// Extension-defined authenticator data, present if and only if [`Flags::ED`] is set. It is
    /// always a map node.
    pub extensions: Option<BinaryNode>,
}

impl AuthenticatorData {
    /// Decode authenticator data with the default decode limits.
    pub fn from_slice(v: &[u8]) -> Result<Self, AuthenticatorDataError> {
        Self::from_slice_with_limits(v, DecodeLimits::default())
    }

    /// Decode authenticator data, bounding the embedded binary tree items with `limits`.
    pub fn from_slice_with_limits(
        v: &[u8],
        limits: DecodeLimits,
    ) -> Result<Self, AuthenticatorDataError> {
        if v.len() < MIN_AUTH_DATA_LEN {
            return Err(AuthenticatorDataError::TooShort(v.len()));
        }

        let (rp_id_hash, rest) = v.split_at(32);
        let (flag_byte, rest) = rest.split_at(1);
        let (counter, mut rest) = rest.split_at(4);

        let mut rp_id_hash_arr = [0; 32];
        rp_id_hash_arr.copy_from_slice(rp_id_hash);
        let mut counter_arr = [0; 4];
        counter_arr.copy_from_slice(counter);

        let flags = Flags::from_byte(flag_byte[0]);

        let attested_credential_data = if flags.contains(Flags::AT) {
            let (acd, used) = AttestedCredentialData::from_prefix(rest, limits)?;
            rest = &rest[used..];
            Some(acd)
        } else {
            None
        };

        let extensions = if flags.contains(Flags::ED) {
            let (node, used) =
                cbor::decode_prefix(rest, limits).map_err(AuthenticatorDataError::Extensions)?;
            if node.as_map().is_none() {
                return Err(AuthenticatorDataError::ExtensionsNotAMap);
            }
            rest = &rest[used..];
            Some(node)
        } else {
            None
        };

        if !rest.is_empty() {
            return Err(AuthenticatorDataError::TrailingBytes(rest.len()));
        }

        Ok(AuthenticatorData {
            raw: v.to_vec(),
            rp_id_hash: rp_id_hash_arr,
            flags,
            sign_count: u32::from_be_bytes(counter_arr),
            attested_credential_data,
            extensions,
        })
    }

    /// Get read access to the RP ID hash
    pub fn rp_id_hash(&self) -> &[u8] {
        &self.rp_id_hash
    }

    /// The bytes this was decoded from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// The bytes every attestation and assertion signature covers: `authenticatorData ||
    /// clientDataHash`.
    pub fn signed_data(&self, client_data_hash: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.raw.len() + client_data_hash.len());
        data.extend_from_slice(&self.raw);
        data.extend_from_slice(client_data_hash);
        data
    }
}

/// Attested credential data is a variable-length byte array added to the authenticator data when
/// generating an attestation object for a credential
///
/// <https://w3c.github.io/webauthn/#attested-credential-data>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedCredentialData {
    /// The AAGUID of the authenticator.
    pub aaguid: Aaguid,

    /// The credential ID whose length is prepended to the byte array.
    credential_id: Vec<u8>,

    /// The decoded credential public key.
    pub public_key: CoseKey,

    /// The credential public key exactly as it was encoded, for storage.
    public_key_bytes: Vec<u8>,
}

impl AttestedCredentialData {
    fn from_prefix(v: &[u8], limits: DecodeLimits) -> Result<(Self, usize), AuthenticatorDataError> {
        if v.len() < Aaguid::LEN + 2 {
            return Err(AuthenticatorDataError::Truncated("attested credential data"));
        }
        let (aaguid, rest) = v.split_at(Aaguid::LEN);
        let (cred_len, rest) = rest.split_at(2);

        let aaguid =
            Aaguid::from_slice(aaguid).ok_or(AuthenticatorDataError::Truncated("aaguid"))?;
        let cred_len = usize::from(u16::from_be_bytes([cred_len[0], cred_len[1]]));
        if cred_len > MAX_CREDENTIAL_ID_LEN {
            return Err(AuthenticatorDataError::CredentialIdTooLong(cred_len));
        }
        if rest.len() < cred_len {
            return Err(AuthenticatorDataError::Truncated("credential id"));
        }
        let (credential_id, rest) = rest.split_at(cred_len);

        let (public_key, key_len) = CoseKey::from_prefix(rest, limits)?;

        Ok((
            Self {
                aaguid,
                credential_id: credential_id.to_vec(),
                public_key,
                public_key_bytes: rest[..key_len].to_vec(),
            },
            Aaguid::LEN + 2 + cred_len + key_len,
        ))
    }

    /// Get read access to the credential ID,
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// The COSE encoded credential public key as sent by the authenticator.
    pub fn public_key_bytes(&self) -> &[u8] {
        &self.public_key_bytes
    }
}

/// Reasons an attestation object could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttestationObjectError {
    /// The envelope is not a valid binary tree.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// The envelope is not a map.
    #[error("attestation object is not a map")]
    NotAMap,
    /// A mandatory field is absent.
    #[error("attestation object is missing `{0}`")]
    MissingField(&'static str),
    /// A field has the wrong type.
    #[error("attestation object field `{0}` has the wrong type")]
    InvalidFieldType(&'static str),
    /// The embedded authenticator data is invalid.
    #[error(transparent)]
    AuthenticatorData(#[from] AuthenticatorDataError),
    /// Registration requires attested credential data.
    #[error("attestation object carries no attested credential data")]
    MissingAttestedCredentialData,
}

/// The container returned by the authenticator at registration.
///
/// The statement is kept as an undecoded node: how it is read depends on `fmt`, which is the
/// attestation crate's business.
///
/// <https://w3c.github.io/webauthn/#sctn-attestation>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    /// The attestation statement format identifier.
    pub fmt: String,
    /// The attestation statement, a map node.
    pub att_stmt: BinaryNode,
    /// The authenticator data, which must carry attested credential data.
    pub auth_data: AuthenticatorData,
}

impl AttestationObject {
    /// Decode an attestation object with the default limits.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AttestationObjectError> {
        Self::from_slice_with_limits(bytes, DecodeLimits::default())
    }

    /// Decode an attestation object bounding every binary tree decode with `limits`.
    pub fn from_slice_with_limits(
        bytes: &[u8],
        limits: DecodeLimits,
    ) -> Result<Self, AttestationObjectError> {
        let node = cbor::decode_with_limits(bytes, limits)?;
        if node.as_map().is_none() {
            return Err(AttestationObjectError::NotAMap);
        }

        let fmt = node
            .map_get_text("fmt")
            .ok_or(AttestationObjectError::MissingField("fmt"))?
            .as_text()
            .ok_or(AttestationObjectError::InvalidFieldType("fmt"))?
            .to_owned();

        let att_stmt = node
            .map_get_text("attStmt")
            .ok_or(AttestationObjectError::MissingField("attStmt"))?;
        if att_stmt.as_map().is_none() {
            return Err(AttestationObjectError::InvalidFieldType("attStmt"));
        }

        let raw_auth_data = node
            .map_get_text("authData")
            .ok_or(AttestationObjectError::MissingField("authData"))?
            .as_bytes()
            .ok_or(AttestationObjectError::InvalidFieldType("authData"))?;
        let auth_data = AuthenticatorData::from_slice_with_limits(raw_auth_data, limits)?;
        if auth_data.attested_credential_data.is_none() {
            return Err(AttestationObjectError::MissingAttestedCredentialData);
        }

        Ok(Self {
            fmt,
            att_stmt: att_stmt.clone(),
            auth_data,
        })
    }

    /// The attested credential data, always present on a decoded object.
    pub fn attested_credential_data(&self) -> Option<&AttestedCredentialData> {
        self.auth_data.attested_credential_data.as_ref()
    }
}

#[cfg(test)]
mod tests;
