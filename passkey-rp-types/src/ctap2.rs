//! Binary structures produced by an authenticator: the authenticator data and the attestation
//! object that wraps it at registration.
//!
//! <https://w3c.github.io/webauthn/#sctn-authenticator-data>

mod aaguid;
mod attestation_fmt;
mod flags;

pub use self::{
    aaguid::Aaguid,
    attestation_fmt::{
        AttestationObject, AttestationObjectError, AttestedCredentialData, AuthenticatorData,
        AuthenticatorDataError,
    },
    flags::Flags,
};
