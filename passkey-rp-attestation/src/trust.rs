//! Trust anchors and the TPM manufacturer policy.
//!
//! Both are handed to the [`AttestationVerifier`](crate::AttestationVerifier) once and only read
//! afterwards.

use std::collections::HashMap;

use crate::AttestationFormat;

/// Google's hardware attestation root, which Android Key attestation chains to.
const GOOGLE_HARDWARE_ATTESTATION_ROOT: &[u8] = include_bytes!("roots/google_hardware_attestation_root.der");

/// DER encoded root certificates a certificate path may end at.
///
/// Roots are either bound to one statement format or shared by all of them. A format with no roots
/// at all never verifies: a chain is not trusted just because it is well formed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchors {
    per_format: HashMap<AttestationFormat, Vec<Vec<u8>>>,
    shared: Vec<Vec<u8>>,
}

impl TrustAnchors {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `der` for statements of `format`.
    pub fn with_root(mut self, format: AttestationFormat, der: impl Into<Vec<u8>>) -> Self {
        self.per_format.entry(format).or_default().push(der.into());
        self
    }

    /// Trust `der` for every format.
    pub fn with_shared_root(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.shared.push(der.into());
        self
    }

    /// Add the roots that ship with this crate.
    pub fn with_well_known_roots(self) -> Self {
        self.with_root(AttestationFormat::AndroidKey, GOOGLE_HARDWARE_ATTESTATION_ROOT)
    }

    /// The roots a path for `format` may end at.
    pub fn roots_for(&self, format: AttestationFormat) -> Vec<&[u8]> {
        self.per_format
            .get(&format)
            .into_iter()
            .flatten()
            .chain(&self.shared)
            .map(Vec::as_slice)
            .collect()
    }
}

/// Decides which TPM vendors are acceptable.
///
/// The manufacturer is the `id:XXXXXXXX` value from the subject alternative name of the AIK
/// certificate.
pub trait TpmManufacturerPolicy: Send + Sync {
    /// `None` rejects the manufacturer. `Some(roots)` accepts it, the returned DER roots are
    /// trusted in addition to the configured TPM anchors.
    fn check(&self, manufacturer: &str) -> Option<Vec<Vec<u8>>>;
}

impl<F> TpmManufacturerPolicy for F
where
    F: Fn(&str) -> Option<Vec<Vec<u8>>> + Send + Sync,
{
    fn check(&self, manufacturer: &str) -> Option<Vec<Vec<u8>>> {
        self(manufacturer)
    }
}

/// The vendor identifiers registered with the Trusted Computing Group.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownTpmManufacturers;

impl KnownTpmManufacturers {
    /// `(id, vendor)` pairs.
    pub const VENDORS: &'static [(&'static str, &'static str)] = &[
        ("id:414D4400", "AMD"),
        ("id:41544D4C", "Atmel"),
        ("id:4252434D", "Broadcom"),
        ("id:4353434F", "Cisco"),
        ("id:464C5953", "Flyslice Technologies"),
        ("id:474F4F47", "Google"),
        ("id:48504500", "HPE"),
        ("id:48495349", "Huawei"),
        ("id:49424D00", "IBM"),
        ("id:49465800", "Infineon"),
        ("id:494E5443", "Intel"),
        ("id:4C454E00", "Lenovo"),
        ("id:4D534654", "Microsoft"),
        ("id:4E534D20", "National Semiconductor"),
        ("id:4E545A00", "Nationz"),
        ("id:4E544300", "Nuvoton Technology"),
        ("id:51434F4D", "Qualcomm"),
        ("id:524F4343", "Fuzhou Rockchip"),
        ("id:534D5343", "SMSC"),
        ("id:534D534E", "Samsung"),
        ("id:534E5300", "Sinosun"),
        ("id:53544D20", "ST Microelectronics"),
        ("id:54584E00", "Texas Instruments"),
        ("id:57454300", "Winbond"),
    ];
}

impl TpmManufacturerPolicy for KnownTpmManufacturers {
    fn check(&self, manufacturer: &str) -> Option<Vec<Vec<u8>>> {
        Self::VENDORS
            .iter()
            .any(|(id, _)| id.eq_ignore_ascii_case(manufacturer))
            .then(Vec::new)
    }
}

/// Consults `fallback` for manufacturers the wrapped policy rejects.
///
/// Conformance tooling uses a test vendor id that is not registered, for example:
///
/// ```
/// # use passkey_rp_attestation::{KnownTpmManufacturers, TpmManufacturerOverride};
/// let conformance_roots: Vec<Vec<u8>> = Vec::new();
/// let policy = TpmManufacturerOverride::new(KnownTpmManufacturers, move |id: &str| {
///     (id == "id:FFFFF1D0").then(|| conformance_roots.clone())
/// });
/// ```
#[derive(Debug, Clone)]
pub struct TpmManufacturerOverride<P, F> {
    inner: P,
    fallback: F,
}

impl<P, F> TpmManufacturerOverride<P, F>
where
    P: TpmManufacturerPolicy,
    F: TpmManufacturerPolicy,
{
    /// Wrap `inner`.
    pub fn new(inner: P, fallback: F) -> Self {
        Self { inner, fallback }
    }
}

impl<P, F> TpmManufacturerPolicy for TpmManufacturerOverride<P, F>
where
    P: TpmManufacturerPolicy,
    F: TpmManufacturerPolicy,
{
    fn check(&self, manufacturer: &str) -> Option<Vec<Vec<u8>>> {
        self.inner
            .check(manufacturer)
            .or_else(|| self.fallback.check(manufacturer))
    }
}
