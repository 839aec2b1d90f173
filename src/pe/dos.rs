//! The MS-DOS header at the start of every PE image.
//!
//! Only two fields matter to a PE loader: the `MZ` signature and `e_lfanew`
//! ([`DosHeader::coff_header_offset`]), which points at the `PE\0\0` signature. Everything
//! else, including the reserved words, is kept so the header re-serializes byte for byte.

use crate::{
    file::{io::push_le, parser::Parser},
    FormatError, Result,
};

/// The `MZ` signature, read as a little-endian `u16`.
pub const DOS_SIGNATURE: u16 = 0x5A4D;

/// Size of the DOS header in bytes.
pub const DOS_HEADER_SIZE: usize = 64;

/// The 64-byte `IMAGE_DOS_HEADER`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DosHeader {
    /// Bytes on the last 512-byte page of the DOS program
    pub bytes_on_last_page: u16,
    /// Number of 512-byte pages of the DOS program
    pub page_count: u16,
    /// Number of DOS relocation entries
    pub relocation_count: u16,
    /// Size of the DOS header in paragraphs
    pub header_paragraphs: u16,
    /// Minimum extra paragraphs needed
    pub min_extra_paragraphs: u16,
    /// Maximum extra paragraphs needed
    pub max_extra_paragraphs: u16,
    /// Initial SS register value
    pub initial_ss: u16,
    /// Initial SP register value
    pub initial_sp: u16,
    /// DOS checksum, unused by Windows
    pub checksum: u16,
    /// Initial IP register value
    pub initial_ip: u16,
    /// Initial CS register value
    pub initial_cs: u16,
    /// File offset of the DOS relocation table
    pub relocation_table_offset: u16,
    /// Overlay number
    pub overlay_number: u16,
    /// First block of reserved words
    pub reserved: [u16; 4],
    /// OEM identifier
    pub oem_id: u16,
    /// OEM specific information
    pub oem_info: u16,
    /// Second block of reserved words
    pub reserved2: [u16; 10],
    /// File offset of the `PE\0\0` signature (`e_lfanew`)
    pub coff_header_offset: u32,
}

impl DosHeader {
    /// Parse the DOS header at the parser's current position.
    ///
    /// The signature is validated before anything else is read, so a foreign file is
    /// rejected even if it is shorter than a DOS header.
    ///
    /// # Errors
    /// - [`crate::FormatError::InvalidSignature`] if the first word is not `MZ`
    /// - [`crate::RangeError::OutOfBounds`] if the data ends inside the header
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        let offset = parser.pos();
        let signature = parser.read_le::<u16>()?;
        if signature != DOS_SIGNATURE {
            return Err(FormatError::InvalidSignature {
                expected: u32::from(DOS_SIGNATURE),
                found: u32::from(signature),
                offset,
            }
            .into());
        }

        let bytes_on_last_page = parser.read_le::<u16>()?;
        let page_count = parser.read_le::<u16>()?;
        let relocation_count = parser.read_le::<u16>()?;
        let header_paragraphs = parser.read_le::<u16>()?;
        let min_extra_paragraphs = parser.read_le::<u16>()?;
        let max_extra_paragraphs = parser.read_le::<u16>()?;
        let initial_ss = parser.read_le::<u16>()?;
        let initial_sp = parser.read_le::<u16>()?;
        let checksum = parser.read_le::<u16>()?;
        let initial_ip = parser.read_le::<u16>()?;
        let initial_cs = parser.read_le::<u16>()?;
        let relocation_table_offset = parser.read_le::<u16>()?;
        let overlay_number = parser.read_le::<u16>()?;

        let mut reserved = [0u16; 4];
        for word in &mut reserved {
            *word = parser.read_le::<u16>()?;
        }

        let oem_id = parser.read_le::<u16>()?;
        let oem_info = parser.read_le::<u16>()?;

        let mut reserved2 = [0u16; 10];
        for word in &mut reserved2 {
            *word = parser.read_le::<u16>()?;
        }

        let coff_header_offset = parser.read_le::<u32>()?;

        Ok(DosHeader {
            bytes_on_last_page,
            page_count,
            relocation_count,
            header_paragraphs,
            min_extra_paragraphs,
            max_extra_paragraphs,
            initial_ss,
            initial_sp,
            checksum,
            initial_ip,
            initial_cs,
            relocation_table_offset,
            overlay_number,
            reserved,
            oem_id,
            oem_info,
            reserved2,
            coff_header_offset,
        })
    }

    /// Append the serialized header to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        push_le(out, DOS_SIGNATURE);
        push_le(out, self.bytes_on_last_page);
        push_le(out, self.page_count);
        push_le(out, self.relocation_count);
        push_le(out, self.header_paragraphs);
        push_le(out, self.min_extra_paragraphs);
        push_le(out, self.max_extra_paragraphs);
        push_le(out, self.initial_ss);
        push_le(out, self.initial_sp);
        push_le(out, self.checksum);
        push_le(out, self.initial_ip);
        push_le(out, self.initial_cs);
        push_le(out, self.relocation_table_offset);
        push_le(out, self.overlay_number);
        for word in self.reserved {
            push_le(out, word);
        }
        push_le(out, self.oem_id);
        push_le(out, self.oem_info);
        for word in self.reserved2 {
            push_le(out, word);
        }
        push_le(out, self.coff_header_offset);
    }
}
