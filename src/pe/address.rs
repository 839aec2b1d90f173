//! Translation between relative virtual addresses and file offsets.
//!
//! Structures referenced from headers (the import table, the names it points at) are
//! addressed by RVA, while the bytes live in the file at the owning section's
//! `PointerToRawData`. [`AddressTranslator`] maps between the two using the section table.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pepatch::{pe::AddressTranslator, PeImage};
//!
//! let image = PeImage::from_file(std::path::Path::new("usbstor.sys"))?;
//! let translator = AddressTranslator::new(image.section_headers());
//!
//! let offset = translator.offset_for_rva(0x1000)?;
//! println!("RVA 0x1000 is stored at file offset 0x{offset:x}");
//! # Ok::<(), pepatch::Error>(())
//! ```

use crate::{pe::section::SectionHeader, RangeError, Result};

/// Maps RVAs to file offsets and section-relative addresses over a section table.
#[derive(Debug, Clone, Copy)]
pub struct AddressTranslator<'a> {
    sections: &'a [SectionHeader],
}

impl<'a> AddressTranslator<'a> {
    /// Create a translator over the given section table.
    #[must_use]
    pub fn new(sections: &'a [SectionHeader]) -> Self {
        AddressTranslator { sections }
    }

    /// Index of the first section whose virtual range contains `rva`.
    #[must_use]
    pub fn section_index_for_rva(&self, rva: u32) -> Option<usize> {
        self.sections
            .iter()
            .position(|section| section.contains_rva(rva))
    }

    /// The first section whose virtual range contains `rva`.
    #[must_use]
    pub fn section_for_rva(&self, rva: u32) -> Option<&'a SectionHeader> {
        self.section_index_for_rva(rva)
            .map(|index| &self.sections[index])
    }

    /// File offset at which the byte addressed by `rva` is stored.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::AddressOutOfRange`] if no section contains `rva`.
    pub fn offset_for_rva(&self, rva: u32) -> Result<u32> {
        let section = self
            .section_for_rva(rva)
            .ok_or(RangeError::AddressOutOfRange(rva))?;

        section
            .pointer_to_raw_data
            .checked_add(rva - section.virtual_address)
            .ok_or_else(|| RangeError::AddressOutOfRange(rva).into())
    }

    /// Section index and section-relative address of `rva`.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::AddressOutOfRange`] if no section contains `rva`.
    pub fn locate(&self, rva: u32) -> Result<(usize, u32)> {
        let index = self
            .section_index_for_rva(rva)
            .ok_or(RangeError::AddressOutOfRange(rva))?;

        Ok((
            index,
            Self::address_in_section(&self.sections[index], rva),
        ))
    }

    /// RVA of a file offset inside `section`'s raw data.
    #[must_use]
    pub fn rva_for_offset(section: &SectionHeader, offset: u32) -> u32 {
        offset
            .wrapping_add(section.virtual_address)
            .wrapping_sub(section.pointer_to_raw_data)
    }

    /// Position of `rva` relative to the start of `section`.
    #[must_use]
    pub fn address_in_section(section: &SectionHeader, rva: u32) -> u32 {
        rva.wrapping_sub(section.virtual_address)
    }

    /// RVA of a position relative to the start of `section`.
    #[must_use]
    pub fn rva_for_address_in_section(section: &SectionHeader, address: u32) -> u32 {
        address.wrapping_add(section.virtual_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{pe::section::SectionCharacteristics, Error};

    fn section(virtual_address: u32, virtual_size: u32, pointer_to_raw_data: u32) -> SectionHeader {
        SectionHeader {
            name: *b".text\0\0\0",
            virtual_size,
            virtual_address,
            size_of_raw_data: virtual_size,
            pointer_to_raw_data,
            pointer_to_relocations: 0,
            pointer_to_line_numbers: 0,
            number_of_relocations: 0,
            number_of_line_numbers: 0,
            characteristics: SectionCharacteristics::empty(),
        }
    }

    #[test]
    fn offset_for_rva() {
        let sections = [section(0x1000, 0x200, 0x400), section(0x2000, 0x100, 0x600)];
        let translator = AddressTranslator::new(&sections);

        assert_eq!(translator.offset_for_rva(0x1000).unwrap(), 0x400);
        assert_eq!(translator.offset_for_rva(0x11FF).unwrap(), 0x5FF);
        assert_eq!(translator.offset_for_rva(0x2010).unwrap(), 0x610);
        assert_eq!(translator.section_index_for_rva(0x2010), Some(1));
        assert_eq!(translator.locate(0x2010).unwrap(), (1, 0x10));
    }

    #[test]
    fn rva_outside_sections() {
        let sections = [section(0x1000, 0x200, 0x400)];
        let translator = AddressTranslator::new(&sections);

        for rva in [0x0, 0x0FFF, 0x1200, 0xFFFF_FFFF] {
            assert!(matches!(
                translator.offset_for_rva(rva),
                Err(Error::Range(RangeError::AddressOutOfRange(found))) if found == rva
            ));
        }
        assert!(translator.locate(0x1200).is_err());
    }

    #[test]
    fn rva_inverse() {
        let sections = [section(0x1000, 0x200, 0x400), section(0x3000, 0x80, 0x600)];
        let translator = AddressTranslator::new(&sections);

        for rva in (0x1000..0x1200).chain(0x3000..0x3080) {
            let offset = translator.offset_for_rva(rva).unwrap();
            let owner = translator.section_for_rva(rva).unwrap();
            assert_eq!(AddressTranslator::rva_for_offset(owner, offset), rva);

            let address = AddressTranslator::address_in_section(owner, rva);
            assert_eq!(
                AddressTranslator::rva_for_address_in_section(owner, address),
                rva
            );
        }
    }

    #[test]
    fn empty_section_table() {
        let translator = AddressTranslator::new(&[]);
        assert!(translator.offset_for_rva(0x1000).is_err());
    }
}
