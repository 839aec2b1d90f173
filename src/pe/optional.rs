//! The optional header in its PE32 and PE32+ layouts.
//!
//! The magic word at the start of the header selects the layout of everything after it:
//! PE32 images carry a `BaseOfData` field and 4-byte `ImageBase`/stack/heap fields, PE32+
//! images drop `BaseOfData` and widen those fields to 8 bytes. Both layouts place the
//! checksum at the same relative offset, [`CHECKSUM_FIELD_OFFSET`].

use bitflags::bitflags;

use crate::{
    file::{io::push_le, parser::Parser},
    pe::directory::{DataDirectories, DATA_DIRECTORY_SIZE},
    FormatError, Result,
};

/// Offset of the `CheckSum` field relative to the start of the optional header.
pub const CHECKSUM_FIELD_OFFSET: usize = 64;

/// Magic of a PE32 optional header.
pub const PE32_MAGIC: u16 = 0x10B;

/// Magic of a PE32+ optional header.
pub const PE64_MAGIC: u16 = 0x20B;

/// Layout variant of the optional header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeFormat {
    /// 32-bit image, magic 0x10B
    Pe32,
    /// 64-bit image, magic 0x20B
    Pe64,
}

impl PeFormat {
    /// Select the layout for an optional header magic.
    ///
    /// # Errors
    /// Returns [`crate::FormatError::UnsupportedOptionalHeader`] for any other magic.
    pub fn from_magic(magic: u16) -> Result<Self> {
        match magic {
            PE32_MAGIC => Ok(PeFormat::Pe32),
            PE64_MAGIC => Ok(PeFormat::Pe64),
            other => Err(FormatError::UnsupportedOptionalHeader(other).into()),
        }
    }

    /// The magic word written for this layout.
    #[must_use]
    pub fn magic(self) -> u16 {
        match self {
            PeFormat::Pe32 => PE32_MAGIC,
            PeFormat::Pe64 => PE64_MAGIC,
        }
    }

    /// Size of the header up to and including `NumberOfRvaAndSizes`.
    #[must_use]
    pub fn fixed_size(self) -> usize {
        match self {
            PeFormat::Pe32 => 96,
            PeFormat::Pe64 => 112,
        }
    }
}

/// Subsystem required to run the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    /// Unknown subsystem
    Unknown,
    /// Device drivers and native processes
    Native,
    /// Windows GUI
    Windows,
    /// Windows character mode
    WindowsConsole,
    /// OS/2 character mode
    Os2,
    /// POSIX character mode
    Posix,
    /// Windows CE
    WindowsCe,
    /// EFI application
    EfiApplication,
    /// EFI driver with boot services
    EfiBootServiceDriver,
    /// EFI driver with runtime services
    EfiRuntimeDriver,
    /// EFI ROM image
    EfiRom,
    /// Xbox
    Xbox,
    /// Windows boot application
    WindowsBootApplication,
    /// Any other subsystem value, kept verbatim
    Other(u16),
}

impl From<u16> for Subsystem {
    fn from(value: u16) -> Self {
        match value {
            0 => Subsystem::Unknown,
            1 => Subsystem::Native,
            2 => Subsystem::Windows,
            3 => Subsystem::WindowsConsole,
            5 => Subsystem::Os2,
            7 => Subsystem::Posix,
            9 => Subsystem::WindowsCe,
            10 => Subsystem::EfiApplication,
            11 => Subsystem::EfiBootServiceDriver,
            12 => Subsystem::EfiRuntimeDriver,
            13 => Subsystem::EfiRom,
            14 => Subsystem::Xbox,
            16 => Subsystem::WindowsBootApplication,
            other => Subsystem::Other(other),
        }
    }
}

impl From<Subsystem> for u16 {
    fn from(value: Subsystem) -> Self {
        match value {
            Subsystem::Unknown => 0,
            Subsystem::Native => 1,
            Subsystem::Windows => 2,
            Subsystem::WindowsConsole => 3,
            Subsystem::Os2 => 5,
            Subsystem::Posix => 7,
            Subsystem::WindowsCe => 9,
            Subsystem::EfiApplication => 10,
            Subsystem::EfiBootServiceDriver => 11,
            Subsystem::EfiRuntimeDriver => 12,
            Subsystem::EfiRom => 13,
            Subsystem::Xbox => 14,
            Subsystem::WindowsBootApplication => 16,
            Subsystem::Other(other) => other,
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// `IMAGE_DLLCHARACTERISTICS_*` flags of the optional header
    pub struct DllCharacteristics: u16 {
        /// Can handle a high entropy 64-bit address space
        const HIGH_ENTROPY_VA = 0x0020;
        /// Can be relocated at load time
        const DYNAMIC_BASE = 0x0040;
        /// Code integrity checks are enforced
        const FORCE_INTEGRITY = 0x0080;
        /// Compatible with data execution prevention
        const NX_COMPAT = 0x0100;
        /// Isolation aware, but do not isolate
        const NO_ISOLATION = 0x0200;
        /// Does not use structured exception handling
        const NO_SEH = 0x0400;
        /// Do not bind the image
        const NO_BIND = 0x0800;
        /// Must execute in an AppContainer
        const APPCONTAINER = 0x1000;
        /// WDM driver
        const WDM_DRIVER = 0x2000;
        /// Supports control flow guard
        const GUARD_CF = 0x4000;
        /// Terminal server aware
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

/// A PE32 or PE32+ optional header including its data directories.
///
/// Pointer-width fields are held as `u64` for both layouts; a PE32 header refuses to
/// serialize if one of them no longer fits in 32 bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionalHeader {
    /// Layout selected by the magic word
    pub format: PeFormat,
    /// Linker major version
    pub major_linker_version: u8,
    /// Linker minor version
    pub minor_linker_version: u8,
    /// Combined size of all code sections
    pub size_of_code: u32,
    /// Combined size of all initialized data sections
    pub size_of_initialized_data: u32,
    /// Combined size of all uninitialized data sections
    pub size_of_uninitialized_data: u32,
    /// RVA of the entry point
    pub address_of_entry_point: u32,
    /// RVA of the first code section
    pub base_of_code: u32,
    /// RVA of the first data section; only present in PE32 images, zero otherwise
    pub base_of_data: u32,
    /// Preferred load address
    pub image_base: u64,
    /// Alignment of sections in memory
    pub section_alignment: u32,
    /// Alignment of section data in the file
    pub file_alignment: u32,
    /// Required operating system major version
    pub major_operating_system_version: u16,
    /// Required operating system minor version
    pub minor_operating_system_version: u16,
    /// Image major version
    pub major_image_version: u16,
    /// Image minor version
    pub minor_image_version: u16,
    /// Subsystem major version
    pub major_subsystem_version: u16,
    /// Subsystem minor version
    pub minor_subsystem_version: u16,
    /// Reserved, must be zero
    pub win32_version_value: u32,
    /// Size of the image in memory, including headers
    pub size_of_image: u32,
    /// Combined size of all headers, rounded to the file alignment
    pub size_of_headers: u32,
    /// Image checksum as stored in the file
    pub checksum: u32,
    /// Subsystem required to run the image
    pub subsystem: Subsystem,
    /// DLL characteristics
    pub dll_characteristics: DllCharacteristics,
    /// Stack size to reserve
    pub size_of_stack_reserve: u64,
    /// Stack size to commit
    pub size_of_stack_commit: u64,
    /// Heap size to reserve
    pub size_of_heap_reserve: u64,
    /// Heap size to commit
    pub size_of_heap_commit: u64,
    /// Reserved, must be zero
    pub loader_flags: u32,
    /// The data directory array
    pub data_directories: DataDirectories,
    /// Bytes between the last data directory and `SizeOfOptionalHeader`
    pub padding: Vec<u8>,
}

impl OptionalHeader {
    /// Parse an optional header that the COFF header declares as `declared_size` bytes long.
    ///
    /// The parser is left exactly `declared_size` bytes past the start, which is where the
    /// section table begins.
    ///
    /// # Errors
    /// - [`crate::FormatError::UnsupportedOptionalHeader`] for an unknown magic
    /// - [`crate::FormatError::Malformed`] if the fields do not fit into `declared_size`
    ///   or more than 16 data directories are declared
    /// - [`crate::RangeError::OutOfBounds`] if the data ends inside the header
    pub fn parse(parser: &mut Parser, declared_size: u16) -> Result<Self> {
        let start = parser.pos();
        let format = PeFormat::from_magic(parser.read_le::<u16>()?)?;

        let major_linker_version = parser.read_le::<u8>()?;
        let minor_linker_version = parser.read_le::<u8>()?;
        let size_of_code = parser.read_le::<u32>()?;
        let size_of_initialized_data = parser.read_le::<u32>()?;
        let size_of_uninitialized_data = parser.read_le::<u32>()?;
        let address_of_entry_point = parser.read_le::<u32>()?;
        let base_of_code = parser.read_le::<u32>()?;

        let (base_of_data, image_base) = match format {
            PeFormat::Pe32 => (
                parser.read_le::<u32>()?,
                u64::from(parser.read_le::<u32>()?),
            ),
            PeFormat::Pe64 => (0, parser.read_le::<u64>()?),
        };

        let section_alignment = parser.read_le::<u32>()?;
        let file_alignment = parser.read_le::<u32>()?;
        let major_operating_system_version = parser.read_le::<u16>()?;
        let minor_operating_system_version = parser.read_le::<u16>()?;
        let major_image_version = parser.read_le::<u16>()?;
        let minor_image_version = parser.read_le::<u16>()?;
        let major_subsystem_version = parser.read_le::<u16>()?;
        let minor_subsystem_version = parser.read_le::<u16>()?;
        let win32_version_value = parser.read_le::<u32>()?;
        let size_of_image = parser.read_le::<u32>()?;
        let size_of_headers = parser.read_le::<u32>()?;
        let checksum = parser.read_le::<u32>()?;
        let subsystem = Subsystem::from(parser.read_le::<u16>()?);
        let dll_characteristics = DllCharacteristics::from_bits_retain(parser.read_le::<u16>()?);

        let size_of_stack_reserve = read_wide(parser, format)?;
        let size_of_stack_commit = read_wide(parser, format)?;
        let size_of_heap_reserve = read_wide(parser, format)?;
        let size_of_heap_commit = read_wide(parser, format)?;

        let loader_flags = parser.read_le::<u32>()?;
        let directory_count = parser.read_le::<u32>()?;

        let required = Self::required_size(format, directory_count);
        if required > usize::from(declared_size) {
            return Err(malformed_error!(
                "Optional header needs {} bytes but SizeOfOptionalHeader is {}",
                required,
                declared_size
            ));
        }

        let data_directories = DataDirectories::parse(parser, directory_count)?;
        let padding = parser
            .read_bytes(usize::from(declared_size) - (parser.pos() - start))?
            .to_vec();

        Ok(OptionalHeader {
            format,
            major_linker_version,
            minor_linker_version,
            size_of_code,
            size_of_initialized_data,
            size_of_uninitialized_data,
            address_of_entry_point,
            base_of_code,
            base_of_data,
            image_base,
            section_alignment,
            file_alignment,
            major_operating_system_version,
            minor_operating_system_version,
            major_image_version,
            minor_image_version,
            major_subsystem_version,
            minor_subsystem_version,
            win32_version_value,
            size_of_image,
            size_of_headers,
            checksum,
            subsystem,
            dll_characteristics,
            size_of_stack_reserve,
            size_of_stack_commit,
            size_of_heap_reserve,
            size_of_heap_commit,
            loader_flags,
            data_directories,
            padding,
        })
    }

    /// Append the serialized header, data directories and padding to `out`.
    ///
    /// # Errors
    /// Returns [`crate::FormatError::Malformed`] if a PE32 header holds a pointer-width
    /// value that does not fit in 32 bits.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        push_le(out, self.format.magic());
        push_le(out, self.major_linker_version);
        push_le(out, self.minor_linker_version);
        push_le(out, self.size_of_code);
        push_le(out, self.size_of_initialized_data);
        push_le(out, self.size_of_uninitialized_data);
        push_le(out, self.address_of_entry_point);
        push_le(out, self.base_of_code);

        match self.format {
            PeFormat::Pe32 => {
                push_le(out, self.base_of_data);
                push_le(out, narrow(self.image_base, "ImageBase")?);
            }
            PeFormat::Pe64 => push_le(out, self.image_base),
        }

        push_le(out, self.section_alignment);
        push_le(out, self.file_alignment);
        push_le(out, self.major_operating_system_version);
        push_le(out, self.minor_operating_system_version);
        push_le(out, self.major_image_version);
        push_le(out, self.minor_image_version);
        push_le(out, self.major_subsystem_version);
        push_le(out, self.minor_subsystem_version);
        push_le(out, self.win32_version_value);
        push_le(out, self.size_of_image);
        push_le(out, self.size_of_headers);
        push_le(out, self.checksum);
        push_le(out, u16::from(self.subsystem));
        push_le(out, self.dll_characteristics.bits());

        for (value, field) in [
            (self.size_of_stack_reserve, "SizeOfStackReserve"),
            (self.size_of_stack_commit, "SizeOfStackCommit"),
            (self.size_of_heap_reserve, "SizeOfHeapReserve"),
            (self.size_of_heap_commit, "SizeOfHeapCommit"),
        ] {
            match self.format {
                PeFormat::Pe32 => push_le(out, narrow(value, field)?),
                PeFormat::Pe64 => push_le(out, value),
            }
        }

        push_le(out, self.loader_flags);
        push_le(out, self.data_directories.count());
        self.data_directories.write(out);
        out.extend_from_slice(&self.padding);
        Ok(())
    }

    /// Serialized size of this header, which equals its `SizeOfOptionalHeader`.
    #[must_use]
    pub fn size(&self) -> usize {
        Self::required_size(self.format, self.data_directories.count()) + self.padding.len()
    }

    fn required_size(format: PeFormat, directory_count: u32) -> usize {
        format.fixed_size() + directory_count as usize * DATA_DIRECTORY_SIZE
    }
}

fn read_wide(parser: &mut Parser, format: PeFormat) -> Result<u64> {
    match format {
        PeFormat::Pe32 => Ok(u64::from(parser.read_le::<u32>()?)),
        PeFormat::Pe64 => parser.read_le::<u64>(),
    }
}

fn narrow(value: u64, field: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| malformed_error!("{} 0x{:x} does not fit a PE32 header", field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        pe::directory::{DataDirectory, DataDirectoryName},
        Error,
    };

    fn header_bytes(format: PeFormat, directories: u32, padding: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        push_le(&mut bytes, format.magic());
        bytes.extend_from_slice(&[14, 0]); // linker version
        push_le(&mut bytes, 0x200_u32); // size of code
        push_le(&mut bytes, 0x200_u32);
        push_le(&mut bytes, 0_u32);
        push_le(&mut bytes, 0x1000_u32); // entry point
        push_le(&mut bytes, 0x1000_u32); // base of code
        match format {
            PeFormat::Pe32 => {
                push_le(&mut bytes, 0x2000_u32);
                push_le(&mut bytes, 0x0001_0000_u32);
            }
            PeFormat::Pe64 => push_le(&mut bytes, 0x0001_4000_0000_u64),
        }
        push_le(&mut bytes, 0x1000_u32);
        push_le(&mut bytes, 0x200_u32);
        for version in [6_u16, 1, 6, 1, 6, 1] {
            push_le(&mut bytes, version);
        }
        push_le(&mut bytes, 0_u32); // win32 version
        push_le(&mut bytes, 0x3000_u32);
        push_le(&mut bytes, 0x400_u32);
        push_le(&mut bytes, 0xDEAD_BEEF_u32); // checksum
        push_le(&mut bytes, 1_u16); // native
        push_le(&mut bytes, 0x0140_u16);
        for value in [0x4_0000_u64, 0x1000, 0x10_0000, 0x1000] {
            match format {
                PeFormat::Pe32 => push_le(&mut bytes, value as u32),
                PeFormat::Pe64 => push_le(&mut bytes, value),
            }
        }
        push_le(&mut bytes, 0_u32);
        push_le(&mut bytes, directories);
        for index in 0..directories {
            push_le(&mut bytes, index * 0x100);
            push_le(&mut bytes, index);
        }
        bytes.resize(bytes.len() + padding, 0xCC);
        bytes
    }

    #[test]
    fn parse_pe32() {
        let bytes = header_bytes(PeFormat::Pe32, 16, 0);
        assert_eq!(bytes.len(), 0xE0);

        let mut parser = Parser::new(&bytes);
        let header = OptionalHeader::parse(&mut parser, 0xE0).unwrap();
        assert_eq!(parser.pos(), 0xE0);
        assert_eq!(header.format, PeFormat::Pe32);
        assert_eq!(header.base_of_data, 0x2000);
        assert_eq!(header.image_base, 0x0001_0000);
        assert_eq!(header.checksum, 0xDEAD_BEEF);
        assert_eq!(header.subsystem, Subsystem::Native);
        assert!(header
            .dll_characteristics
            .contains(DllCharacteristics::DYNAMIC_BASE | DllCharacteristics::NX_COMPAT));
        assert_eq!(header.size_of_stack_reserve, 0x4_0000);
        assert_eq!(
            header.data_directories[DataDirectoryName::Import],
            DataDirectory {
                virtual_address: 0x100,
                size: 1
            }
        );
        assert_eq!(header.size(), 0xE0);
    }

    #[test]
    fn parse_pe64() {
        let bytes = header_bytes(PeFormat::Pe64, 16, 0);
        assert_eq!(bytes.len(), 0xF0);

        let header = OptionalHeader::parse(&mut Parser::new(&bytes), 0xF0).unwrap();
        assert_eq!(header.format, PeFormat::Pe64);
        assert_eq!(header.base_of_data, 0);
        assert_eq!(header.image_base, 0x0001_4000_0000);
        assert_eq!(header.checksum, 0xDEAD_BEEF);
        assert_eq!(header.size_of_heap_reserve, 0x10_0000);
    }

    #[test]
    fn checksum_offset_matches_both_layouts() {
        for format in [PeFormat::Pe32, PeFormat::Pe64] {
            let bytes = header_bytes(format, 16, 0);
            let field = u32::from_le_bytes(
                bytes[CHECKSUM_FIELD_OFFSET..CHECKSUM_FIELD_OFFSET + 4]
                    .try_into()
                    .unwrap(),
            );
            assert_eq!(field, 0xDEAD_BEEF);
        }
    }

    #[test]
    fn write_is_byte_exact() {
        for (format, directories, padding) in
            [(PeFormat::Pe32, 16, 0), (PeFormat::Pe64, 16, 0), (PeFormat::Pe32, 10, 8)]
        {
            let bytes = header_bytes(format, directories, padding);
            let declared = u16::try_from(bytes.len()).unwrap();
            let header = OptionalHeader::parse(&mut Parser::new(&bytes), declared).unwrap();
            assert_eq!(header.padding.len(), padding);

            let mut out = Vec::new();
            header.write(&mut out).unwrap();
            assert_eq!(out, bytes);
        }
    }

    #[test]
    fn unsupported_magic() {
        let mut bytes = header_bytes(PeFormat::Pe32, 16, 0);
        bytes[0] = 0x07;
        bytes[1] = 0x01;
        assert!(matches!(
            OptionalHeader::parse(&mut Parser::new(&bytes), 0xE0),
            Err(Error::Format(FormatError::UnsupportedOptionalHeader(0x107)))
        ));
    }

    #[test]
    fn declared_size_too_small() {
        let bytes = header_bytes(PeFormat::Pe32, 16, 0);
        assert!(matches!(
            OptionalHeader::parse(&mut Parser::new(&bytes), 0xD8),
            Err(Error::Format(FormatError::Malformed { .. }))
        ));
    }

    #[test]
    fn pe32_rejects_wide_image_base() {
        let bytes = header_bytes(PeFormat::Pe32, 16, 0);
        let mut header = OptionalHeader::parse(&mut Parser::new(&bytes), 0xE0).unwrap();
        header.image_base = 0x1_0000_0000;
        assert!(header.write(&mut Vec::new()).is_err());
    }
}
