//! The `PE\0\0` signature and the COFF file header that follows it.

use bitflags::bitflags;

use crate::{
    file::{io::push_le, parser::Parser},
    FormatError, Result,
};

/// The `PE\0\0` signature, read as a little-endian `u32`.
pub const PE_SIGNATURE: u32 = 0x0000_4550;

/// Size of the signature plus the COFF file header in bytes.
pub const COFF_HEADER_SIZE: usize = 24;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `IMAGE_FILE_*` characteristics of the COFF header
    pub struct CoffCharacteristics: u16 {
        /// Base relocations have been removed
        const RELOCS_STRIPPED = 0x0001;
        /// The image is executable
        const EXECUTABLE_IMAGE = 0x0002;
        /// COFF line numbers have been removed
        const LINE_NUMS_STRIPPED = 0x0004;
        /// COFF local symbols have been removed
        const LOCAL_SYMS_STRIPPED = 0x0008;
        /// Aggressively trim the working set
        const AGGRESSIVE_WS_TRIM = 0x0010;
        /// The application can handle addresses above 2 GB
        const LARGE_ADDRESS_AWARE = 0x0020;
        /// Little endian byte order (deprecated)
        const BYTES_REVERSED_LO = 0x0080;
        /// 32-bit word machine
        const MACHINE_32BIT = 0x0100;
        /// Debug information has been removed
        const DEBUG_STRIPPED = 0x0200;
        /// Copy to swap when run from removable media
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        /// Copy to swap when run from network media
        const NET_RUN_FROM_SWAP = 0x0800;
        /// System file, such as a kernel-mode driver
        const SYSTEM = 0x1000;
        /// The image is a DLL
        const DLL = 0x2000;
        /// Run only on a uniprocessor machine
        const UP_SYSTEM_ONLY = 0x4000;
        /// Big endian byte order (deprecated)
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// Target machine of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Machine {
    /// Intel 386 and compatible
    I386,
    /// Intel Itanium
    Ia64,
    /// x64
    Amd64,
    /// ARM64 little endian
    Arm64,
    /// Any other machine value, kept verbatim
    Other(u16),
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            0x014C => Machine::I386,
            0x0200 => Machine::Ia64,
            0x8664 => Machine::Amd64,
            0xAA64 => Machine::Arm64,
            other => Machine::Other(other),
        }
    }
}

impl From<Machine> for u16 {
    fn from(value: Machine) -> Self {
        match value {
            Machine::I386 => 0x014C,
            Machine::Ia64 => 0x0200,
            Machine::Amd64 => 0x8664,
            Machine::Arm64 => 0xAA64,
            Machine::Other(other) => other,
        }
    }
}

/// The COFF file header (`IMAGE_FILE_HEADER`), preceded on disk by the PE signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoffHeader {
    /// Target machine
    pub machine: Machine,
    /// Number of entries in the section table
    pub number_of_sections: u16,
    /// Link time, seconds since 1970-01-01
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table, zero for images
    pub pointer_to_symbol_table: u32,
    /// Number of COFF symbols, zero for images
    pub number_of_symbols: u32,
    /// Size of the optional header that follows
    pub size_of_optional_header: u16,
    /// Image characteristics
    pub characteristics: CoffCharacteristics,
}

impl CoffHeader {
    /// Parse the PE signature and COFF header at the parser's current position.
    ///
    /// # Errors
    /// - [`crate::FormatError::InvalidSignature`] if the signature is not `PE\0\0`
    /// - [`crate::RangeError::OutOfBounds`] if the data ends inside the header
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        let offset = parser.pos();
        let signature = parser.read_le::<u32>()?;
        if signature != PE_SIGNATURE {
            return Err(FormatError::InvalidSignature {
                expected: PE_SIGNATURE,
                found: signature,
                offset,
            }
            .into());
        }

        Ok(CoffHeader {
            machine: Machine::from(parser.read_le::<u16>()?),
            number_of_sections: parser.read_le::<u16>()?,
            time_date_stamp: parser.read_le::<u32>()?,
            pointer_to_symbol_table: parser.read_le::<u32>()?,
            number_of_symbols: parser.read_le::<u32>()?,
            size_of_optional_header: parser.read_le::<u16>()?,
            characteristics: CoffCharacteristics::from_bits_retain(parser.read_le::<u16>()?),
        })
    }

    /// Append the PE signature and serialized header to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        push_le(out, PE_SIGNATURE);
        push_le(out, u16::from(self.machine));
        push_le(out, self.number_of_sections);
        push_le(out, self.time_date_stamp);
        push_le(out, self.pointer_to_symbol_table);
        push_le(out, self.number_of_symbols);
        push_le(out, self.size_of_optional_header);
        push_le(out, self.characteristics.bits());
    }
}
