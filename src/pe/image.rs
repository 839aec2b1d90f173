//! The [`PeImage`] aggregate: a parsed image that serializes back byte for byte.

use std::path::Path;

use crate::{
    file::{io::write_le_at, parser::Parser, write_file, File},
    patch::bytes::{check_replacement, replace_all},
    pe::{
        address::AddressTranslator,
        checksum,
        coff::CoffHeader,
        directory::{DataDirectory, DataDirectoryName},
        dos::DosHeader,
        imports::ImportDirectory,
        optional::{OptionalHeader, PeFormat, CHECKSUM_FIELD_OFFSET},
        section::{SectionBuffer, SectionHeader},
    },
    Result,
};

/// A parsed PE image that can be patched in place and written back.
///
/// `PeImage` splits a file into its headers and the opaque regions between them:
///
/// ```text
/// DOS header | DOS stub | COFF header | optional header | section table | filler
///            | section 0 raw data | ... | section n raw data | trailing bytes
/// ```
///
/// The headers are decoded into typed values, everything else is owned verbatim. Only the
/// contents of section buffers can be changed, and never their length, so no structure
/// moves and every offset stored in the image stays valid. [`PeImage::serialize`] writes
/// the regions back in the same order and finishes by recomputing the checksum.
///
/// The trailing bytes typically hold the Authenticode signature of a signed driver. They
/// are preserved but not validated; a patched image carries a signature that no longer
/// matches its contents.
///
/// # Examples
///
/// ```rust,no_run
/// use pepatch::PeImage;
/// use std::path::Path;
///
/// let mut image = PeImage::from_file(Path::new("setupdd.sys"))?;
/// println!("{} sections, {:?}", image.section_headers().len(), image.format());
///
/// if image.replace_in_sections(b"ntkrnlmp.exe", b"ntoskrnl.exe")? {
///     image.write_to_file(Path::new("setupdd.sys"))?;
/// }
/// # Ok::<(), pepatch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeImage {
    dos_header: DosHeader,
    dos_stub: Vec<u8>,
    coff_header: CoffHeader,
    optional_header_offset: usize,
    optional_header: OptionalHeader,
    section_headers: Vec<SectionHeader>,
    filler: Vec<u8>,
    sections: Vec<SectionBuffer>,
    trailing_bytes: Vec<u8>,
    import_directory: Option<ImportDirectory>,
}

impl PeImage {
    /// Parse an image from a byte buffer.
    ///
    /// # Errors
    /// - [`crate::FormatError::InvalidSignature`] if the `MZ` or `PE\0\0` signature is wrong
    /// - [`crate::FormatError::UnsupportedOptionalHeader`] for an optional header that is
    ///   neither PE32 nor PE32+
    /// - [`crate::FormatError::Malformed`] if regions overlap or raw section data is not
    ///   laid out back to back
    /// - [`crate::RangeError::OutOfBounds`] if the buffer is truncated
    /// - [`crate::RangeError::AddressOutOfRange`] if the import directory lies outside every section
    pub fn parse(data: &[u8]) -> Result<PeImage> {
        let mut parser = Parser::new(data);

        let dos_header = DosHeader::parse(&mut parser)?;
        let coff_header_offset = dos_header.coff_header_offset as usize;
        if coff_header_offset < parser.pos() {
            return Err(malformed_error!(
                "COFF header offset 0x{:x} points into the DOS header",
                coff_header_offset
            ));
        }
        let dos_stub = parser.read_bytes(coff_header_offset - parser.pos())?.to_vec();

        let coff_header = CoffHeader::parse(&mut parser)?;
        let optional_header_offset = parser.pos();
        let optional_header =
            OptionalHeader::parse(&mut parser, coff_header.size_of_optional_header)?;

        let mut section_headers = Vec::with_capacity(usize::from(coff_header.number_of_sections));
        for _ in 0..coff_header.number_of_sections {
            section_headers.push(SectionHeader::parse(&mut parser)?);
        }

        let raw_data_start = section_headers
            .iter()
            .find(|section| section.size_of_raw_data > 0)
            .map_or(parser.pos(), |section| section.pointer_to_raw_data as usize);
        if raw_data_start < parser.pos() {
            return Err(malformed_error!(
                "Section data at 0x{:x} overlaps the section table ending at 0x{:x}",
                raw_data_start,
                parser.pos()
            ));
        }
        let filler = parser.read_bytes(raw_data_start - parser.pos())?.to_vec();

        let mut sections = Vec::with_capacity(section_headers.len());
        for section in &section_headers {
            if section.size_of_raw_data > 0 && section.pointer_to_raw_data as usize != parser.pos()
            {
                return Err(malformed_error!(
                    "Raw data of section {} starts at 0x{:x}, expected 0x{:x}",
                    section,
                    section.pointer_to_raw_data,
                    parser.pos()
                ));
            }

            let raw = parser.read_bytes(section.size_of_raw_data as usize)?;
            sections.push(SectionBuffer::new(raw.to_vec()));
        }

        let trailing_bytes = parser.read_bytes(parser.remaining())?.to_vec();

        let import_directory = match optional_header
            .data_directories
            .get(DataDirectoryName::Import)
        {
            Some(entry) if entry.is_present() => {
                let offset = AddressTranslator::new(&section_headers)
                    .offset_for_rva(entry.virtual_address)?;
                parser.seek(offset as usize)?;
                Some(ImportDirectory::parse(&mut parser)?)
            }
            _ => None,
        };

        Ok(PeImage {
            dos_header,
            dos_stub,
            coff_header,
            optional_header_offset,
            optional_header,
            section_headers,
            filler,
            sections,
            trailing_bytes,
            import_directory,
        })
    }

    /// Load and parse an image from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read, otherwise the errors
    /// of [`PeImage::parse`].
    pub fn from_file(path: &Path) -> Result<PeImage> {
        let file = File::from_file(path)?;
        PeImage::parse(file.data())
    }

    /// Parse an image from an owned buffer, for example a member unpacked from a CAB archive.
    ///
    /// # Errors
    /// See [`PeImage::parse`].
    pub fn from_mem(data: Vec<u8>) -> Result<PeImage> {
        PeImage::parse(&data)
    }

    /// Write the image back into a new buffer.
    ///
    /// All regions are emitted in their original order and size. The import directory is
    /// then rewritten at its file offset with a fresh terminator, and finally the checksum
    /// field is set to the checksum of everything written.
    ///
    /// # Errors
    /// - [`crate::FormatError::Malformed`] if the headers no longer serialize to their
    ///   original size
    /// - [`crate::RangeError::AddressOutOfRange`] if the import directory RVA cannot be resolved
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.serialized_len());

        self.dos_header.write(&mut out);
        out.extend_from_slice(&self.dos_stub);
        self.coff_header.write(&mut out);

        if out.len() != self.optional_header_offset {
            return Err(malformed_error!(
                "Optional header would move from 0x{:x} to 0x{:x}",
                self.optional_header_offset,
                out.len()
            ));
        }

        self.optional_header.write(&mut out)?;
        for section in &self.section_headers {
            section.write(&mut out);
        }
        out.extend_from_slice(&self.filler);
        for section in &self.sections {
            out.extend_from_slice(section.as_slice());
        }
        out.extend_from_slice(&self.trailing_bytes);

        if let (Some(directory), Some(entry)) =
            (&self.import_directory, self.import_directory_entry())
        {
            let offset = self.translator().offset_for_rva(entry.virtual_address)?;
            directory.write_at(&mut out, offset as usize)?;
        }

        let mut checksum_offset = self.checksum_offset();
        let value = checksum::compute(&out, checksum_offset);
        write_le_at(&mut out, &mut checksum_offset, value)?;

        Ok(out)
    }

    /// Serialize the image and write it to `path`, clearing the read-only attribute first.
    ///
    /// # Errors
    /// Returns the errors of [`PeImage::serialize`] and [`crate::file::write_file`].
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let bytes = self.serialize()?;
        write_file(path, &bytes)
    }

    /// Replace every occurrence of `old` with `new` inside the raw data of one section.
    ///
    /// # Errors
    /// - [`crate::PreconditionError`] if `old` and `new` differ in length or are empty
    /// - [`crate::RangeError::OutOfBounds`] if `index` is not a section index
    pub fn replace_in_section(&mut self, index: usize, old: &[u8], new: &[u8]) -> Result<bool> {
        check_replacement(old, new)?;

        let section = self
            .sections
            .get_mut(index)
            .ok_or(out_of_bounds_error!())?;
        replace_all(section.as_mut_slice(), old, new)
    }

    /// Replace every occurrence of `old` with `new` in the raw data of all sections.
    ///
    /// Returns `Ok(true)` if any section changed. Headers, filler and trailing bytes are
    /// never searched.
    ///
    /// # Errors
    /// Returns [`crate::PreconditionError`] if `old` and `new` differ in length or are
    /// empty. Nothing is modified in that case.
    pub fn replace_in_sections(&mut self, old: &[u8], new: &[u8]) -> Result<bool> {
        check_replacement(old, new)?;

        let mut changed = false;
        for section in &mut self.sections {
            changed |= replace_all(section.as_mut_slice(), old, new)?;
        }
        Ok(changed)
    }

    /// Names of all imported files, in import directory order.
    ///
    /// # Errors
    /// - [`crate::RangeError::AddressOutOfRange`] if a name RVA is outside every section
    /// - [`crate::RangeError::OutOfBounds`] if a name RVA is beyond its section's raw data
    pub fn dependencies(&self) -> Result<Vec<String>> {
        let Some(directory) = &self.import_directory else {
            return Ok(Vec::new());
        };

        directory
            .descriptors
            .iter()
            .map(|descriptor| {
                self.read_section_string(descriptor.name_rva)
                    .map(|(_, _, name)| name)
            })
            .collect()
    }

    /// Read the null-terminated ASCII string at `rva`.
    ///
    /// Returns the owning section's index, the string's position inside that section and
    /// the string itself.
    pub(crate) fn read_section_string(&self, rva: u32) -> Result<(usize, usize, String)> {
        let (index, address) = self.translator().locate(rva)?;
        let mut parser = Parser::new(self.sections[index].as_slice());
        parser.seek(address as usize)?;
        let value = parser.read_string_ascii()?;
        Ok((index, address as usize, value))
    }

    /// An [`AddressTranslator`] over this image's section table.
    #[must_use]
    pub fn translator(&self) -> AddressTranslator<'_> {
        AddressTranslator::new(&self.section_headers)
    }

    /// The DOS header.
    #[must_use]
    pub fn dos_header(&self) -> &DosHeader {
        &self.dos_header
    }

    /// Bytes between the DOS header and the PE signature.
    #[must_use]
    pub fn dos_stub(&self) -> &[u8] {
        &self.dos_stub
    }

    /// The COFF file header.
    #[must_use]
    pub fn coff_header(&self) -> &CoffHeader {
        &self.coff_header
    }

    /// The optional header, including the data directories.
    #[must_use]
    pub fn optional_header(&self) -> &OptionalHeader {
        &self.optional_header
    }

    /// Whether this is a PE32 or PE32+ image.
    #[must_use]
    pub fn format(&self) -> PeFormat {
        self.optional_header.format
    }

    /// The data directory for `name`, if the header has that slot.
    #[must_use]
    pub fn data_directory(&self, name: DataDirectoryName) -> Option<&DataDirectory> {
        self.optional_header.data_directories.get(name)
    }

    /// The section table, in file order.
    #[must_use]
    pub fn section_headers(&self) -> &[SectionHeader] {
        &self.section_headers
    }

    /// Bytes between the section table and the first section's raw data.
    #[must_use]
    pub fn filler(&self) -> &[u8] {
        &self.filler
    }

    /// Raw data of every section, indexed like [`PeImage::section_headers`].
    #[must_use]
    pub fn sections(&self) -> &[SectionBuffer] {
        &self.sections
    }

    /// Raw data of the section at `index`.
    #[must_use]
    pub fn section(&self, index: usize) -> Option<&SectionBuffer> {
        self.sections.get(index)
    }

    /// Writable raw data of the section at `index`.
    pub fn section_mut(&mut self, index: usize) -> Option<&mut SectionBuffer> {
        self.sections.get_mut(index)
    }

    /// Index of the first section named `name`, e.g. `.data`.
    #[must_use]
    pub fn section_index(&self, name: &str) -> Option<usize> {
        self.section_headers
            .iter()
            .position(|section| section.name_str() == name)
    }

    /// Bytes after the last section's raw data, usually the digital signature.
    #[must_use]
    pub fn trailing_bytes(&self) -> &[u8] {
        &self.trailing_bytes
    }

    /// The import directory, if the image imports anything.
    #[must_use]
    pub fn import_directory(&self) -> Option<&ImportDirectory> {
        self.import_directory.as_ref()
    }

    /// File offset of the optional header.
    #[must_use]
    pub fn optional_header_offset(&self) -> usize {
        self.optional_header_offset
    }

    /// File offset of the checksum field.
    #[must_use]
    pub fn checksum_offset(&self) -> usize {
        self.optional_header_offset + CHECKSUM_FIELD_OFFSET
    }

    /// The checksum stored in the parsed header, which may be stale.
    #[must_use]
    pub fn stored_checksum(&self) -> u32 {
        self.optional_header.checksum
    }

    /// Size in bytes of the output of [`PeImage::serialize`].
    #[must_use]
    pub fn serialized_len(&self) -> usize {
        self.optional_header_offset
            + self.optional_header.size()
            + self.section_headers.len() * crate::pe::section::SECTION_HEADER_SIZE
            + self.filler.len()
            + self.sections.iter().map(SectionBuffer::len).sum::<usize>()
            + self.trailing_bytes.len()
    }

    fn import_directory_entry(&self) -> Option<&DataDirectory> {
        self.data_directory(DataDirectoryName::Import)
            .filter(|entry| entry.is_present())
    }
}
