use bitflags::bitflags;

bitflags! {
    /// Flags for authenticator Data
    ///
    /// <https://w3c.github.io/webauthn/#authdata-flags>
    #[repr(transparent)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Flags: u8 {
        /// User Present, bit 0
        const UP = 1 << 0;
        /// User Verified, bit 2
        const UV = 1 << 2;
        /// Backup Eligibility, bit 3
        const BE = 1 << 3;
        /// Backup state, bit 4
        const BS = 1 << 4;
        /// Attested Credential Data, bit 6
        const AT = 1 << 6;
        /// Extension Data Included, bit 7
        const ED = 1 << 7;
    }
}

impl Flags {
    /// Parse the flags byte of authenticator data.
    ///
    /// Bits 1 and 5 are reserved for future use and must be ignored by a relying party, so they
    /// are dropped rather than rejected.
    pub fn from_byte(byte: u8) -> Self {
        Flags::from_bits_truncate(byte)
    }

    /// Whether the backup state is consistent: a credential can only be backed up when it is
    /// eligible for backup.
    pub fn backup_state_is_valid(self) -> bool {
        !self.contains(Flags::BS) || self.contains(Flags::BE)
    }
}

impl From<Flags> for u8 {
    fn from(src: Flags) -> Self {
        src.bits()
    }
}
