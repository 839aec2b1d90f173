//! The data directory array at the end of the optional header.
//!
//! Every slot of the array has a fixed meaning, so the directories are addressed through
//! [`DataDirectoryName`] rather than bare indices:
//!
//! ```rust
//! use pepatch::pe::{DataDirectories, DataDirectory, DataDirectoryName};
//!
//! let mut directories = DataDirectories::default();
//! directories[DataDirectoryName::Import] = DataDirectory {
//!     virtual_address: 0x2000,
//!     size: 0x28,
//! };
//! assert_eq!(directories[DataDirectoryName::Import].to_string(), "RVA=0x2000, Size=0x28");
//! ```

use std::{
    fmt,
    ops::{Index, IndexMut},
};

use strum::{EnumCount, EnumIter};

use crate::{
    file::{io::push_le, parser::Parser},
    Result,
};

/// Size of one data directory entry in bytes.
pub const DATA_DIRECTORY_SIZE: usize = 8;

/// Meaning of each slot of the data directory array, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, strum::Display)]
#[repr(usize)]
pub enum DataDirectoryName {
    /// Export table
    Export,
    /// Import table, the list of [`crate::pe::ImportDescriptor`]s
    Import,
    /// Resource table
    Resource,
    /// Exception table
    Exception,
    /// Attribute certificate table; its address is a file offset, not an RVA
    Security,
    /// Base relocation table
    BaseRelocation,
    /// Debug data
    Debug,
    /// Architecture specific data, reserved
    Architecture,
    /// Global pointer register value
    GlobalPointer,
    /// Thread local storage table
    Tls,
    /// Load configuration table
    LoadConfig,
    /// Bound import table
    BoundImport,
    /// Import address table
    Iat,
    /// Delay-load import descriptors
    DelayImport,
    /// CLR runtime header
    CorHeader,
    /// Reserved, must be zero
    Reserved,
}

/// One `(RVA, size)` pair of the data directory array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    /// Relative virtual address of the table
    pub virtual_address: u32,
    /// Size of the table in bytes
    pub size: u32,
}

impl DataDirectory {
    /// Parse one entry at the parser's current position.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if fewer than 8 bytes remain.
    pub fn parse(parser: &mut Parser) -> Result<Self> {
        Ok(DataDirectory {
            virtual_address: parser.read_le::<u32>()?,
            size: parser.read_le::<u32>()?,
        })
    }

    /// Append the serialized entry to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        push_le(out, self.virtual_address);
        push_le(out, self.size);
    }

    /// Returns `true` if the directory points at a table.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0
    }
}

impl fmt::Display for DataDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RVA=0x{:x}, Size=0x{:x}", self.virtual_address, self.size)
    }
}

/// The data directory array of an optional header.
///
/// `NumberOfRvaAndSizes` may legally be smaller than 16; only that many entries exist on
/// disk and only that many are written back. Slots past the count read as empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectories {
    entries: [DataDirectory; DataDirectoryName::COUNT],
    count: u32,
}

impl Default for DataDirectories {
    fn default() -> Self {
        DataDirectories {
            entries: [DataDirectory::default(); DataDirectoryName::COUNT],
            count: DataDirectoryName::COUNT as u32,
        }
    }
}

impl DataDirectories {
    /// Parse `count` entries at the parser's current position.
    ///
    /// # Errors
    /// - [`crate::FormatError::Malformed`] if `count` exceeds 16
    /// - [`crate::RangeError::OutOfBounds`] if the data ends inside the array
    pub fn parse(parser: &mut Parser, count: u32) -> Result<Self> {
        if count as usize > DataDirectoryName::COUNT {
            return Err(malformed_error!(
                "NumberOfRvaAndSizes is {} - at most {} data directories are defined",
                count,
                DataDirectoryName::COUNT
            ));
        }

        let mut entries = [DataDirectory::default(); DataDirectoryName::COUNT];
        for entry in entries.iter_mut().take(count as usize) {
            *entry = DataDirectory::parse(parser)?;
        }

        Ok(DataDirectories { entries, count })
    }

    /// Append the first [`DataDirectories::count`] entries to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        for entry in self.entries.iter().take(self.count as usize) {
            entry.write(out);
        }
    }

    /// Number of entries present on disk (`NumberOfRvaAndSizes`).
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns the directory for `name`, or `None` if the header does not contain that slot.
    #[must_use]
    pub fn get(&self, name: DataDirectoryName) -> Option<&DataDirectory> {
        if (name as usize) < self.count as usize {
            Some(&self.entries[name as usize])
        } else {
            None
        }
    }

    /// Iterate over the entries present on disk, in order.
    pub fn iter(&self) -> impl Iterator<Item = &DataDirectory> {
        self.entries.iter().take(self.count as usize)
    }
}

impl Index<DataDirectoryName> for DataDirectories {
    type Output = DataDirectory;

    fn index(&self, name: DataDirectoryName) -> &Self::Output {
        &self.entries[name as usize]
    }
}

impl IndexMut<DataDirectoryName> for DataDirectories {
    fn index_mut(&mut self, name: DataDirectoryName) -> &mut Self::Output {
        &mut self.entries[name as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, FormatError};
    use strum::IntoEnumIterator;

    #[test]
    fn slot_order() {
        let names: Vec<_> = DataDirectoryName::iter().collect();
        assert_eq!(names.len(), 16);
        assert_eq!(names[1], DataDirectoryName::Import);
        assert_eq!(names[4], DataDirectoryName::Security);
        assert_eq!(names[12], DataDirectoryName::Iat);
        assert_eq!(names[14], DataDirectoryName::CorHeader);
        assert_eq!(DataDirectoryName::LoadConfig.to_string(), "LoadConfig");
    }

    #[test]
    fn parse_partial_array() {
        let mut bytes = Vec::new();
        for index in 0..3u32 {
            push_le(&mut bytes, 0x1000 * (index + 1));
            push_le(&mut bytes, 0x10 * (index + 1));
        }

        let mut parser = Parser::new(&bytes);
        let directories = DataDirectories::parse(&mut parser, 3).unwrap();
        assert_eq!(parser.pos(), 24);
        assert_eq!(directories.count(), 3);
        assert_eq!(directories[DataDirectoryName::Import].virtual_address, 0x2000);
        assert_eq!(
            directories.get(DataDirectoryName::Resource),
            Some(&DataDirectory {
                virtual_address: 0x3000,
                size: 0x30
            })
        );
        assert_eq!(directories.get(DataDirectoryName::Exception), None);
        assert!(!directories[DataDirectoryName::Debug].is_present());

        let mut out = Vec::new();
        directories.write(&mut out);
        assert_eq!(out, bytes);
    }

    #[test]
    fn too_many_directories() {
        let bytes = [0u8; 17 * DATA_DIRECTORY_SIZE];
        assert!(matches!(
            DataDirectories::parse(&mut Parser::new(&bytes), 17),
            Err(Error::Format(FormatError::Malformed { .. }))
        ));
    }

    #[test]
    fn display() {
        let directory = DataDirectory {
            virtual_address: 0x5000,
            size: 0x3C,
        };
        assert_eq!(directory.to_string(), "RVA=0x5000, Size=0x3c");
    }
}
