//! Section table entries and the raw bytes they describe.

use std::fmt;

use bitflags::bitflags;

use crate::{
    file::{io::push_le, parser::Parser},
    Result,
};

/// Size of one section table entry in bytes.
pub const SECTION_HEADER_SIZE: usize = 40;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `IMAGE_SCN_*` characteristics of a section
    pub struct SectionCharacteristics: u32 {
        /// Do not pad the section, object files only
        const TYPE_NO_PAD = 0x0000_0008;
        /// Contains executable code
        const CNT_CODE = 0x0000_0020;
        /// Contains initialized data
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        /// Contains uninitialized data
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        /// Contains comments or other information, object files only
        const LNK_INFO = 0x0000_0200;
        /// Will not become part of the image, object files only
        const LNK_REMOVE = 0x0000_0800;
        /// COMDAT data, object files only
        const LNK_COMDAT = 0x0000_1000;
        /// Reset speculative exception handling bits in the TLB
        const NO_DEFER_SPEC_EXC = 0x0000_4000;
        /// Data referenced through the global pointer
        const GPREL = 0x0000_8000;
        /// Contains extended relocations
        const LNK_NRELOC_OVFL = 0x0100_0000;
        /// Can be discarded as needed
        const MEM_DISCARDABLE = 0x0200_0000;
        /// Cannot be cached
        const MEM_NOT_CACHED = 0x0400_0000;
        /// Not pageable
        const MEM_NOT_PAGED = 0x0800_0000;
        /// Can be shared in memory
        const MEM_SHARED = 0x1000_0000;
        /// Can be executed as code
        const MEM_EXECUTE = 0x2000_0000;
        /// Can be read
        const MEM_READ = 0x4000_0000;
        /// Can be written to
        const MEM_WRITE = 0x8000_0000;
    }
}

/// One entry of the section table (`IMAGE_SECTION_HEADER`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    /// Raw 8-byte name, null padded and not necessarily null terminated
    pub name: [u8; 8],
    /// Size of the section in memory
    pub virtual_size: u32,
    /// RVA of the section in memory
    pub virtual_address: u32,
    /// Size of the section's raw data in the file
    pub size_of_raw_data: u32,
    /// File offset of the section's raw data
    pub pointer_to_raw_data: u32,
    /// File offset of COFF relocations, zero for images
    pub pointer_to_relocations: u32,
    /// File offset of COFF line numbers, zero for images
    pub pointer_to_line_numbers: u32,
    /// Number of COFF relocations
    pub number_of_relocations: u16,
    /// Number of COFF line numbers
    pub number_of_line_numbers: u16,
    /// Section characteristics
    pub characteristics: SectionCharacteristics,
}

impl SectionHeader {
    /// Parse one section table entry at the parser's current position.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if fewer than 40 bytes remain.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        Ok(SectionHeader {
            name: parser.read_array::<8>()?,
            virtual_size: parser.read_le::<u32>()?,
            virtual_address: parser.read_le::<u32>()?,
            size_of_raw_data: parser.read_le::<u32>()?,
            pointer_to_raw_data: parser.read_le::<u32>()?,
            pointer_to_relocations: parser.read_le::<u32>()?,
            pointer_to_line_numbers: parser.read_le::<u32>()?,
            number_of_relocations: parser.read_le::<u16>()?,
            number_of_line_numbers: parser.read_le::<u16>()?,
            characteristics: SectionCharacteristics::from_bits_retain(parser.read_le::<u32>()?),
        })
    }

    /// Append the serialized entry to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.name);
        push_le(out, self.virtual_size);
        push_le(out, self.virtual_address);
        push_le(out, self.size_of_raw_data);
        push_le(out, self.pointer_to_raw_data);
        push_le(out, self.pointer_to_relocations);
        push_le(out, self.pointer_to_line_numbers);
        push_le(out, self.number_of_relocations);
        push_le(out, self.number_of_line_numbers);
        push_le(out, self.characteristics.bits());
    }

    /// The section name up to the first null byte, e.g. `.text`.
    #[must_use]
    pub fn name_str(&self) -> String {
        let len = self.name.iter().position(|&byte| byte == 0).unwrap_or(8);
        String::from_utf8_lossy(&self.name[..len]).into_owned()
    }

    /// Returns `true` if `rva` lies in `[VirtualAddress, VirtualAddress + VirtualSize)`.
    #[must_use]
    pub fn contains_rva(&self, rva: u32) -> bool {
        rva >= self.virtual_address
            && u64::from(rva) < u64::from(self.virtual_address) + u64::from(self.virtual_size)
    }
}

impl fmt::Display for SectionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name_str())
    }
}

/// The raw file bytes of one section.
///
/// The length is fixed when the image is parsed and always equals the owning header's
/// `SizeOfRawData`. Contents may be changed in place through [`SectionBuffer::as_mut_slice`],
/// but nothing can grow or shrink the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBuffer(Vec<u8>);

impl SectionBuffer {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        SectionBuffer(data)
    }

    /// The section's bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// The section's bytes, writable in place.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }

    /// Length in bytes, equal to the header's `SizeOfRawData`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for sections without raw data, such as `.bss`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SectionBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
