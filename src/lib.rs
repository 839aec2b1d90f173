// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # pepatch
//!
//! Byte-exact parsing, patching and re-checksumming of Windows PE images, aimed at the
//! drivers and loaders found on Windows installation media.
//!
//! `pepatch` reads an executable into a model that knows its headers but treats
//! everything else as opaque bytes. Patches change section contents in place without ever
//! moving a structure, and writing the model back reproduces the input exactly, except for
//! the patched bytes and a freshly computed checksum. Setup and the boot loaders refuse to
//! load kernel-mode images with a wrong checksum, so that last step is what makes a patched
//! driver usable.
//!
//! ## Features
//!
//! - **Lossless round trip** - DOS stub, header padding, inter-section filler and trailing
//!   bytes such as Authenticode signatures are carried over verbatim
//! - **PE32 and PE32+** - both optional header layouts, with typed flags and enums
//! - **Fixed-length patching** - find and replace inside sections, never across headers
//! - **Import renaming** - point a driver at a differently named dependency
//! - **File-protection lists** - drop a driver from the list kept in `sfcfiles.dll`
//! - **Loader-prefixed images** - patch the executable embedded in `setupldr.bin`
//!
//! ## Quick Start
//!
//! ### Using the Prelude
//!
//! ```rust,no_run
//! use pepatch::prelude::*;
//! use std::path::Path;
//!
//! let mut image = PeImage::from_file(Path::new("usbport.sys"))?;
//! for name in image.dependencies()? {
//!     println!("imports {name}");
//! }
//!
//! if rename_dependency(&mut image, "USBD.SYS", "USBX.SYS")? {
//!     image.write_to_file(Path::new("usbport.sys"))?;
//! }
//! # Ok::<(), pepatch::Error>(())
//! ```
//!
//! ### Patching in Memory
//!
//! ```rust,no_run
//! use pepatch::PeImage;
//!
//! let data = std::fs::read("setupdd.sys")?;
//! let mut image = PeImage::parse(&data)?;
//!
//! // Windows 2000 keeps the string in .data, XP in .text
//! image.replace_in_sections(b"ntkrnlmp.exe", b"ntoskrnl.exe")?;
//!
//! let patched = image.serialize()?;
//! assert_eq!(patched.len(), data.len());
//! # Ok::<(), pepatch::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], whose [`Error`] groups failures into
//! format, range, precondition and I/O categories. Precondition errors are raised before
//! anything is modified. A patch that finds nothing to change is not an error and returns
//! `Ok(false)`.
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and functions.
///
/// # Example
///
/// ```rust,no_run
/// use pepatch::prelude::*;
///
/// let image = PeImage::from_file("tcpip.sys".as_ref())?;
/// println!("{:?} image, {} sections", image.format(), image.section_headers().len());
/// # Ok::<(), pepatch::Error>(())
/// ```
pub mod prelude;

/// Loading and storing raw image bytes, and the bounds-checked readers built on them.
pub mod file;

/// The PE/COFF image model: header codecs, address translation, imports and the checksum
///
/// # Key Components
///
/// - [`PeImage`] - parsed image, the entry point for every patch
/// - [`pe::AddressTranslator`] - RVA to file offset mapping over the section table
/// - [`pe::ImportDirectory`] - the descriptors of imported files
/// - [`pe::checksum`] - the image checksum used by the Windows loaders
///
/// # Examples
///
/// ```rust,no_run
/// use pepatch::{pe::DataDirectoryName, PeImage};
/// use std::path::Path;
///
/// let image = PeImage::from_file(Path::new("atapi.sys"))?;
/// for header in image.section_headers() {
///     println!("{header}: {} bytes at 0x{:x}", header.size_of_raw_data, header.pointer_to_raw_data);
/// }
/// if let Some(imports) = image.data_directory(DataDirectoryName::Import) {
///     println!("imports: {imports}");
/// }
/// # Ok::<(), pepatch::Error>(())
/// ```
pub mod pe;

/// Patch operations for driver images
///
/// See [`patch::replace_all`], [`patch::rename_dependency`],
/// [`patch::exclude_from_file_protection`] and [`patch::EmbeddedImage`].
pub mod patch;

/// `pepatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use pepatch::{PeImage, Result};
///
/// fn imports_of(path: &str) -> Result<Vec<String>> {
///     PeImage::from_file(std::path::Path::new(path))?.dependencies()
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `pepatch` Error type
///
/// The main error type for all operations in this crate. Failures are grouped into
/// [`FormatError`], [`RangeError`] and [`PreconditionError`], plus I/O errors.
///
/// # Examples
///
/// ```rust,no_run
/// use pepatch::{Error, PeImage, PreconditionError};
///
/// let mut image = PeImage::from_file(std::path::Path::new("usbport.sys"))?;
/// match image.replace_in_sections(b"USBD.SYS", b"USB.SYS") {
///     Ok(changed) => println!("changed: {changed}"),
///     Err(Error::Precondition(PreconditionError::LengthMismatch { old, new })) => {
///         println!("cannot replace {old} bytes with {new}");
///     }
///     Err(e) => println!("Error: {e}"),
/// }
/// # Ok::<(), pepatch::Error>(())
/// ```
pub use error::Error;

/// The error categories wrapped by [`Error`].
pub use error::{FormatError, PreconditionError, RangeError};

/// Main entry point for parsing and patching an image.
///
/// See [`pe::PeImage`] for the full interface.
pub use pe::PeImage;

/// Provides access to low-level file and memory parsing utilities.
///
/// # Example
///
/// ```rust
/// use pepatch::Parser;
///
/// let data = [0x4D, 0x5A, 0x90, 0x00];
/// let mut parser = Parser::new(&data);
/// assert_eq!(parser.read_le::<u16>()?, 0x5A4D);
/// assert_eq!(parser.read_le::<u16>()?, 0x0090);
/// # Ok::<(), pepatch::Error>(())
/// ```
pub use file::{parser::Parser, File};
