//! Synthetic driver images for the integration tests.
//!
//! The images are laid out the way the linker emits kernel drivers: a `.text` section with
//! code and string literals, followed by an `.idata` section holding import descriptors,
//! lookup and address tables, hint/name entries and the DLL names. They are complete enough
//! for an independent PE parser to resolve every import.

#![allow(dead_code)]

use pepatch::pe::{checksum, PeFormat};

pub const COFF_HEADER_OFFSET: usize = 0xC8;
pub const OPTIONAL_HEADER_OFFSET: usize = COFF_HEADER_OFFSET + 24;
pub const CHECKSUM_OFFSET: usize = OPTIONAL_HEADER_OFFSET + 64;

const FILE_ALIGNMENT: usize = 0x200;
const SECTION_ALIGNMENT: usize = 0x1000;
const SIZE_OF_HEADERS: usize = 0x400;

pub const TEXT_RVA: u32 = 0x1000;
pub const IDATA_RVA: u32 = 0x2000;

/// One imported DLL and the functions taken from it
pub struct Import {
    pub dll: &'static str,
    pub functions: &'static [&'static str],
}

pub struct Driver {
    pub format: PeFormat,
    pub text: Vec<u8>,
    pub imports: Vec<Import>,
    pub signature: Vec<u8>,
    pub checksum: Option<u32>,
}

impl Driver {
    /// A driver importing from the kernel and the HAL, with a kernel name in its strings
    pub fn usbport(format: PeFormat) -> Self {
        let mut text = vec![0x8B, 0xFF, 0x55, 0x8B, 0xEC, 0x33, 0xC0, 0x5D, 0xC2, 0x08, 0x00];
        text.extend_from_slice(b"\0\\SystemRoot\\System32\\ntkrnlmp.exe\0USBD.SYS\0");

        Driver {
            format,
            text,
            imports: vec![
                Import {
                    dll: "ntoskrnl.exe",
                    functions: &["IoCreateDevice", "KeBugCheckEx"],
                },
                Import {
                    dll: "IMPORTEDFILE.SYS",
                    functions: &["USBD_GetInterfaceLength"],
                },
                Import {
                    dll: "HAL.dll",
                    functions: &["KfRaiseIrql"],
                },
            ],
            signature: Vec::new(),
            checksum: None,
        }
    }

    /// Append an opaque certificate blob after the last section
    pub fn signed(mut self) -> Self {
        let mut signature = vec![0x00, 0x04, 0x00, 0x00, 0x00, 0x02, 0x02, 0x00];
        signature.extend((0..0x3F8).map(|index| (index * 7 % 251) as u8));
        self.signature = signature;
        self
    }

    /// Store a checksum that does not match the contents
    pub fn stale_checksum(mut self) -> Self {
        self.checksum = Some(0x0001_2345);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let thunk_size = match self.format {
            PeFormat::Pe32 => 4,
            PeFormat::Pe64 => 8,
        };
        let idata = import_section(&self.imports, thunk_size);
        let import_directory_size = ((self.imports.len() + 1) * 20) as u32;

        let text_raw = align(self.text.len(), FILE_ALIGNMENT);
        let idata_raw = align(idata.len(), FILE_ALIGNMENT);
        let size_of_image = IDATA_RVA as usize + align(idata.len(), SECTION_ALIGNMENT);
        let optional_header_size: u16 = match self.format {
            PeFormat::Pe32 => 0xE0,
            PeFormat::Pe64 => 0xF0,
        };

        let mut out = Vec::with_capacity(SIZE_OF_HEADERS + text_raw + idata_raw);

        // DOS header and stub
        out.extend_from_slice(b"MZ");
        for word in [0x90_u16, 3, 0, 4, 0, 0xFFFF, 0, 0xB8, 0, 0, 0, 0x40, 0] {
            u16_le(&mut out, word);
        }
        out.resize(0x3C, 0);
        u32_le(&mut out, COFF_HEADER_OFFSET as u32);
        out.extend_from_slice(&[
            0x0E, 0x1F, 0xBA, 0x0E, 0x00, 0xB4, 0x09, 0xCD, 0x21, 0xB8, 0x01, 0x4C, 0xCD, 0x21,
        ]);
        out.extend_from_slice(b"This program cannot be run in DOS mode.\r\r\n$");
        out.resize(COFF_HEADER_OFFSET, 0);

        // COFF header
        out.extend_from_slice(b"PE\0\0");
        match self.format {
            PeFormat::Pe32 => u16_le(&mut out, 0x014C),
            PeFormat::Pe64 => u16_le(&mut out, 0x8664),
        }
        u16_le(&mut out, 2);
        u32_le(&mut out, 0x4802_5B2E);
        u32_le(&mut out, 0);
        u32_le(&mut out, 0);
        u16_le(&mut out, optional_header_size);
        match self.format {
            PeFormat::Pe32 => u16_le(&mut out, 0x010E),
            PeFormat::Pe64 => u16_le(&mut out, 0x0022),
        }

        // Optional header
        let wide = |out: &mut Vec<u8>, value: u64| match self.format {
            PeFormat::Pe32 => u32_le(out, value as u32),
            PeFormat::Pe64 => out.extend_from_slice(&value.to_le_bytes()),
        };
        match self.format {
            PeFormat::Pe32 => u16_le(&mut out, 0x10B),
            PeFormat::Pe64 => u16_le(&mut out, 0x20B),
        }
        out.extend_from_slice(&[7, 10]);
        u32_le(&mut out, text_raw as u32);
        u32_le(&mut out, idata_raw as u32);
        u32_le(&mut out, 0);
        u32_le(&mut out, TEXT_RVA);
        u32_le(&mut out, TEXT_RVA);
        if self.format == PeFormat::Pe32 {
            u32_le(&mut out, IDATA_RVA);
            wide(&mut out, 0x0001_0000);
        } else {
            wide(&mut out, 0x0001_4000_0000);
        }
        u32_le(&mut out, SECTION_ALIGNMENT as u32);
        u32_le(&mut out, FILE_ALIGNMENT as u32);
        for version in [5_u16, 1, 5, 1, 5, 1] {
            u16_le(&mut out, version);
        }
        u32_le(&mut out, 0);
        u32_le(&mut out, size_of_image as u32);
        u32_le(&mut out, SIZE_OF_HEADERS as u32);
        u32_le(&mut out, 0);
        u16_le(&mut out, 1);
        u16_le(&mut out, 0x0540);
        for value in [0x4_0000, 0x1000, 0x10_0000, 0x1000] {
            wide(&mut out, value);
        }
        u32_le(&mut out, 0);
        u32_le(&mut out, 16);
        for slot in 0..16 {
            let (rva, size) = match slot {
                1 => (IDATA_RVA, import_directory_size),
                _ => (0, 0),
            };
            u32_le(&mut out, rva);
            u32_le(&mut out, size);
        }

        // Section table
        section_header(
            &mut out,
            b".text\0\0\0",
            self.text.len(),
            TEXT_RVA,
            text_raw,
            SIZE_OF_HEADERS,
            0x6800_0020,
        );
        section_header(
            &mut out,
            b".idata\0\0",
            idata.len(),
            IDATA_RVA,
            idata_raw,
            SIZE_OF_HEADERS + text_raw,
            0xC000_0040,
        );
        out.resize(SIZE_OF_HEADERS, 0);

        out.extend_from_slice(&self.text);
        out.resize(SIZE_OF_HEADERS + text_raw, 0);
        out.extend_from_slice(&idata);
        out.resize(SIZE_OF_HEADERS + text_raw + idata_raw, 0);
        out.extend_from_slice(&self.signature);

        let value = self
            .checksum
            .unwrap_or_else(|| checksum::compute(&out, CHECKSUM_OFFSET));
        out[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&value.to_le_bytes());
        out
    }
}

/// File offset of the `.idata` section in a built image
pub fn idata_offset(bytes: &[u8]) -> usize {
    let table = OPTIONAL_HEADER_OFFSET + usize::from(u16::from_le_bytes([
        bytes[COFF_HEADER_OFFSET + 20],
        bytes[COFF_HEADER_OFFSET + 21],
    ]));
    let second = table + 40;
    u32::from_le_bytes([
        bytes[second + 20],
        bytes[second + 21],
        bytes[second + 22],
        bytes[second + 23],
    ]) as usize
}

/// Positions at which `left` and `right` differ
pub fn differing_offsets(left: &[u8], right: &[u8]) -> Vec<usize> {
    assert_eq!(left.len(), right.len());
    (0..left.len()).filter(|&index| left[index] != right[index]).collect()
}

pub fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

fn import_section(imports: &[Import], thunk_size: usize) -> Vec<u8> {
    let descriptors_size = (imports.len() + 1) * 20;
    let mut descriptors = Vec::with_capacity(descriptors_size);
    let mut tables = Vec::new();

    for import in imports {
        // Lookup table and address table both list the same hint/name entries
        let entries = import.functions.len() + 1;
        let lookup_offset = descriptors_size + tables.len();
        let address_offset = lookup_offset + entries * thunk_size;
        let hint_names_offset = address_offset + entries * thunk_size;

        let mut thunks = Vec::with_capacity(entries * thunk_size);
        let mut names = Vec::new();
        for (hint, function) in import.functions.iter().enumerate() {
            let rva = u64::from(IDATA_RVA) + (hint_names_offset + names.len()) as u64;
            thunks.extend_from_slice(&rva.to_le_bytes()[..thunk_size]);
            u16_le(&mut names, hint as u16);
            names.extend_from_slice(function.as_bytes());
            names.push(0);
            if names.len() % 2 == 1 {
                names.push(0);
            }
        }
        thunks.resize(entries * thunk_size, 0);

        tables.extend_from_slice(&thunks);
        tables.extend_from_slice(&thunks);
        tables.extend_from_slice(&names);
        let dll_name_offset = descriptors_size + tables.len();
        tables.extend_from_slice(import.dll.as_bytes());
        tables.push(0);
        if tables.len() % 2 == 1 {
            tables.push(0);
        }

        u32_le(&mut descriptors, IDATA_RVA + lookup_offset as u32);
        u32_le(&mut descriptors, 0);
        u32_le(&mut descriptors, 0);
        u32_le(&mut descriptors, IDATA_RVA + dll_name_offset as u32);
        u32_le(&mut descriptors, IDATA_RVA + address_offset as u32);
    }
    descriptors.resize(descriptors_size, 0);

    descriptors.extend_from_slice(&tables);
    descriptors
}

fn section_header(
    out: &mut Vec<u8>,
    name: &[u8; 8],
    virtual_size: usize,
    virtual_address: u32,
    raw_size: usize,
    raw_pointer: usize,
    characteristics: u32,
) {
    out.extend_from_slice(name);
    u32_le(out, virtual_size as u32);
    u32_le(out, virtual_address);
    u32_le(out, raw_size as u32);
    u32_le(out, raw_pointer as u32);
    out.extend_from_slice(&[0; 12]);
    u32_le(out, characteristics);
}

fn align(value: usize, alignment: usize) -> usize {
    value.div_ceil(alignment) * alignment
}

fn u16_le(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}
