//! In-place patch operations on PE images.
//!
//! All patches keep every byte at its position: a replacement is always exactly as long as
//! what it replaces, and arguments that break this rule are rejected before anything is
//! modified. Finding nothing to patch is a normal outcome reported as `Ok(false)`, so a
//! caller can try a patch speculatively, for example "disable this in-box driver if it is
//! the one that is installed".
//!
//! # Key Components
//!
//! - [`crate::patch::replace_all`] - fixed-length find and replace over any byte buffer
//! - [`crate::patch::rename_dependency`] - rename an imported file in the import directory
//! - [`crate::patch::exclude_from_file_protection`] - drop a driver from the `sfcfiles.dll` list
//! - [`crate::patch::EmbeddedImage`] - images preceded by a boot loader, such as `setupldr.bin`

pub mod bytes;
mod embedded;
mod protection;
mod rename;

pub use bytes::{check_replacement, find, replace_all};
pub use embedded::EmbeddedImage;
pub use protection::{exclude_from_file_protection, protection_entries, DRIVER_PATH_PREFIX};
pub use rename::{rename_dependency, rename_dependency_in_file};
