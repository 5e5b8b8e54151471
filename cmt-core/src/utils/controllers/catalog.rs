//! Reference color catalog.
//!
//! A fixed table of 16 slots, each holding a validity flag and one
//! 8-bit-normalized (r, g, b) triplet. The word-level encoding mirrors the
//! persisted record: four words per slot `(validity, r, g, b)`, where 0
//! marks a valid slot and the all-ones erased pattern marks an invalid one.

use super::optics::Triplet;

/// Number of catalog slots.
pub const CATALOG_SLOTS: usize = 16;

const SLOT_WORDS: usize = 4;

/// Size of the persisted catalog record in words.
pub const CATALOG_WORDS: usize = CATALOG_SLOTS * SLOT_WORDS;

const SLOT_VALID: u32 = 0;
const SLOT_INVALID: u32 = 0xFFFF_FFFF;

/// Catalog addressing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogError {
    /// Index at or beyond [`CATALOG_SLOTS`].
    IndexOutOfRange(u16),
}

/// In-memory catalog mirror. Authoritative for the session; persistence
/// failures are reported but do not touch this state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCatalog {
    slots: [Option<Triplet>; CATALOG_SLOTS],
}

impl ColorCatalog {
    pub const fn empty() -> Self {
        Self {
            slots: [None; CATALOG_SLOTS],
        }
    }

    fn slot(index: u16) -> Result<usize, CatalogError> {
        let i = index as usize;
        if i < CATALOG_SLOTS {
            Ok(i)
        } else {
            Err(CatalogError::IndexOutOfRange(index))
        }
    }

    /// Store `rgb` at `index`, marking the slot valid.
    pub fn save(
        &mut self,
        index: u16,
        rgb: Triplet,
    ) -> Result<(), CatalogError> {
        self.slots[Self::slot(index)?] = Some(rgb);
        Ok(())
    }

    /// Invalidate `index`. Returns whether the slot held a color.
    pub fn erase(
        &mut self,
        index: u16,
    ) -> Result<bool, CatalogError> {
        Ok(self.slots[Self::slot(index)?].take().is_some())
    }

    pub fn get(
        &self,
        index: u16,
    ) -> Result<Option<Triplet>, CatalogError> {
        Ok(self.slots[Self::slot(index)?])
    }

    /// Valid entries in index order. Lazy, finite and restartable.
    pub fn entries(&self) -> impl Iterator<Item = (usize, Triplet)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|rgb| (i, rgb)))
    }

    pub fn count(&self) -> usize {
        self.entries().count()
    }

    /// Word image for the persisted record.
    pub fn encode(&self) -> [u32; CATALOG_WORDS] {
        let mut words = [SLOT_INVALID; CATALOG_WORDS];
        for (i, slot) in self.slots.iter().enumerate() {
            let base = i * SLOT_WORDS;
            match slot {
                Some(rgb) => {
                    words[base] = SLOT_VALID;
                    words[base + 1] = rgb.r as u32;
                    words[base + 2] = rgb.g as u32;
                    words[base + 3] = rgb.b as u32;
                }
                None => words[base] = SLOT_INVALID,
            }
        }
        words
    }

    /// Rebuild from a persisted word image. Anything but an exact valid
    /// marker (erased pattern included) reads as an empty slot.
    pub fn decode(words: &[u32; CATALOG_WORDS]) -> Self {
        let mut catalog = Self::empty();
        for i in 0..CATALOG_SLOTS {
            let base = i * SLOT_WORDS;
            if words[base] == SLOT_VALID {
                catalog.slots[i] = Some(Triplet::new(
                    words[base + 1] as u16,
                    words[base + 2] as u16,
                    words[base + 3] as u16,
                ));
            }
        }
        catalog
    }
}

impl Default for ColorCatalog {
    fn default() -> Self {
        Self::empty()
    }
}
