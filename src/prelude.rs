//! # pepatch Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and functions
//! of the pepatch library. Import it to get quick access to everything needed for a
//! parse, patch and write cycle.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pepatch operations
pub use crate::Error;

/// The error categories wrapped by [`Error`]
pub use crate::{FormatError, PreconditionError, RangeError};

/// The result type used throughout pepatch
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Parsed PE image
pub use crate::PeImage;

/// Images preceded by a boot loader
pub use crate::patch::EmbeddedImage;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Image Model
// ================================================================================================

/// Header types
pub use crate::pe::{CoffHeader, DosHeader, OptionalHeader, SectionHeader};

/// Typed header fields
pub use crate::pe::{
    CoffCharacteristics, DllCharacteristics, Machine, PeFormat, SectionCharacteristics, Subsystem,
};

/// Data directories
pub use crate::pe::{DataDirectories, DataDirectory, DataDirectoryName};

/// Sections, addresses and imports
pub use crate::pe::{AddressTranslator, ImportDescriptor, ImportDirectory, SectionBuffer};

// ================================================================================================
// Patching
// ================================================================================================

/// Patch operations
pub use crate::patch::{
    exclude_from_file_protection, rename_dependency, rename_dependency_in_file, replace_all,
};

/// Checksum helpers
pub use crate::pe::checksum;
