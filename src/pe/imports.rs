//! The import directory: one descriptor per imported file.
//!
//! On disk the descriptors form an array terminated by a record whose `NameRVA` is zero.
//! The terminator is not kept in [`ImportDirectory::descriptors`]; it is regenerated as an
//! all-zero record whenever the directory is written.

use crate::{
    file::{
        io::{push_le, write_le_at},
        parser::Parser,
    },
    Result,
};

/// Size of one import descriptor in bytes.
pub const IMPORT_DESCRIPTOR_SIZE: usize = 20;

/// One `IMAGE_IMPORT_DESCRIPTOR`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportDescriptor {
    /// RVA of the import lookup table
    pub import_lookup_table_rva: u32,
    /// Zero until the image is bound
    pub time_date_stamp: u32,
    /// Index of the first forwarder reference
    pub forward_chain: u32,
    /// RVA of the null-terminated ASCII name of the imported file
    pub name_rva: u32,
    /// RVA of the import address table
    pub import_address_table_rva: u32,
}

impl ImportDescriptor {
    /// Parse one descriptor at the parser's current position.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if fewer than 20 bytes remain.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        Ok(ImportDescriptor {
            import_lookup_table_rva: parser.read_le::<u32>()?,
            time_date_stamp: parser.read_le::<u32>()?,
            forward_chain: parser.read_le::<u32>()?,
            name_rva: parser.read_le::<u32>()?,
            import_address_table_rva: parser.read_le::<u32>()?,
        })
    }

    /// Append the serialized descriptor to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        push_le(out, self.import_lookup_table_rva);
        push_le(out, self.time_date_stamp);
        push_le(out, self.forward_chain);
        push_le(out, self.name_rva);
        push_le(out, self.import_address_table_rva);
    }

    fn write_at(&self, data: &mut [u8], offset: &mut usize) -> Result<()> {
        write_le_at(data, offset, self.import_lookup_table_rva)?;
        write_le_at(data, offset, self.time_date_stamp)?;
        write_le_at(data, offset, self.forward_chain)?;
        write_le_at(data, offset, self.name_rva)?;
        write_le_at(data, offset, self.import_address_table_rva)
    }
}

/// The list of import descriptors of an image, without its terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportDirectory {
    /// Descriptors in on-disk order
    pub descriptors: Vec<ImportDescriptor>,
}

impl ImportDirectory {
    /// Parse descriptors at the parser's current position up to the first one whose
    /// `NameRVA` is zero. The parser is left just past that terminator.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if the data ends before a terminator.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        let mut descriptors = Vec::new();
        loop {
            let descriptor = ImportDescriptor::parse(parser)?;
            if descriptor.name_rva == 0 {
                break;
            }
            descriptors.push(descriptor);
        }

        Ok(ImportDirectory { descriptors })
    }

    /// Append all descriptors followed by an all-zero terminator to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        for descriptor in &self.descriptors {
            descriptor.write(out);
        }
        ImportDescriptor::default().write(out);
    }

    /// Overwrite `data` at `offset` with all descriptors followed by an all-zero terminator.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if the directory does not fit into `data`.
    pub fn write_at(&self, data: &mut [u8], offset: usize) -> Result<()> {
        match offset.checked_add(self.size()) {
            Some(end) if end <= data.len() => {}
            _ => return Err(out_of_bounds_error!()),
        }

        let mut position = offset;
        for descriptor in &self.descriptors {
            descriptor.write_at(data, &mut position)?;
        }
        ImportDescriptor::default().write_at(data, &mut position)
    }

    /// Size of the serialized directory including its terminator.
    #[must_use]
    pub fn size(&self) -> usize {
        (self.descriptors.len() + 1) * IMPORT_DESCRIPTOR_SIZE
    }

    /// Number of imported files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if nothing is imported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
