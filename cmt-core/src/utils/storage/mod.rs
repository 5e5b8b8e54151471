//! Non-volatile storage seam.
//!
//! The storage block driver itself is an external collaborator; the core
//! consumes it as a word-addressed read/write service. Two records live in
//! the medium: the catalog image at [`CATALOG_ADDR`] and the calibration
//! record at [`CALIBRATION_ADDR`]. A freshly erased medium reads as all
//! ones, which the record decoders normalize instead of surfacing as
//! corrupt data.

/// Capability interface for the non-volatile store.
pub trait NvStore {
    type Error: core::fmt::Debug;

    fn read(
        &mut self,
        addr: u32,
        out: &mut [u32],
    ) -> Result<(), Self::Error>;

    fn write(
        &mut self,
        addr: u32,
        words: &[u32],
    ) -> Result<(), Self::Error>;

    /// Restore the whole medium to its erased pattern.
    fn mass_erase(&mut self) -> Result<(), Self::Error>;
}

/// Word offset of the catalog record.
pub const CATALOG_ADDR: u32 = 0x000;

/// Word offset of the calibration record.
pub const CALIBRATION_ADDR: u32 = 0x400;

/// Value every word of an erased medium reads as.
pub const ERASED_WORD: u32 = 0xFFFF_FFFF;
