//! The PE/COFF image model.
//!
//! Each header has a small value type with a `parse` function reading from a
//! [`crate::Parser`] and a `write` function appending to a `Vec<u8>`. [`crate::PeImage`]
//! composes them with the opaque byte regions of the file into a model that serializes
//! back to the exact input.
//!
//! # Key Components
//!
//! - [`crate::pe::dos`], [`crate::pe::coff`], [`crate::pe::optional`] - header codecs
//! - [`crate::pe::directory`] - the enum-indexed data directory array
//! - [`crate::pe::section`] - section table entries and raw section buffers
//! - [`crate::pe::AddressTranslator`] - RVA to file offset mapping
//! - [`crate::pe::imports`] - the import directory
//! - [`crate::pe::checksum`] - the image checksum
//! - [`crate::PeImage`] - the aggregate tying everything together

mod address;
pub mod checksum;
pub mod coff;
pub mod directory;
pub mod dos;
mod image;
pub mod imports;
pub mod optional;
pub mod section;

pub use address::AddressTranslator;
pub use coff::{CoffCharacteristics, CoffHeader, Machine};
pub use directory::{DataDirectories, DataDirectory, DataDirectoryName};
pub use dos::DosHeader;
pub use image::PeImage;
pub use imports::{ImportDescriptor, ImportDirectory};
pub use optional::{DllCharacteristics, OptionalHeader, PeFormat, Subsystem};
pub use section::{SectionBuffer, SectionCharacteristics, SectionHeader};
