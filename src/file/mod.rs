//! Input and output of raw image bytes.
//!
//! This module is the file-system collaborator of the patching pipeline. It loads and
//! stores the bytes of an image and provides the low-level readers the PE codecs are built
//! on. Buffers that are already in memory, such as a member just unpacked from a CAB
//! archive, go straight to [`crate::PeImage::parse`].
//!
//! # Key Components
//!
//! - [`crate::file::File`] - a memory-mapped input file
//! - [`crate::file::parser::Parser`] - cursor based reader used by all header codecs
//! - [`crate::file::io`] - bounds-checked little-endian primitives
//! - [`crate::file::write_file`] - writes a buffer back, clearing the read-only attribute first
//!
//! # Examples
//!
//! ```rust,no_run
//! use pepatch::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("usbstor.sys"))?;
//! println!("Loaded {} bytes", file.len());
//! assert_eq!(&file.data()[0..2], b"MZ");
//! # Ok::<(), pepatch::Error>(())
//! ```

pub mod io;
pub mod parser;

use std::{fs, path::Path};

use crate::Result;
use memmap2::Mmap;

/// A loaded input file.
///
/// The file is memory-mapped read-only. It does not interpret the bytes; see
/// [`crate::PeImage`] for that. Images copy what they need while parsing, so the mapping is
/// released before a patched image is written back to the same path.
#[derive(Debug)]
pub struct File {
    data: Mmap,
}

impl File {
    /// Maps the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped.
    pub fn from_file(path: &Path) -> Result<File> {
        let file = fs::File::open(path)?;

        // Read-only mapping, dropped before the caller can write the file back.
        let data = unsafe { Mmap::map(&file) }?;

        Ok(File { data })
    }

    /// Returns the total size of the loaded file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file has a length of zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the raw bytes of the file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Writes `bytes` to `path`, replacing any existing content.
///
/// Windows installation media is frequently copied from read-only sources, so an existing
/// target has its read-only attribute cleared before it is overwritten.
///
/// # Errors
///
/// Returns [`crate::Error::FileError`] if the attribute cannot be changed or the write fails.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    clear_read_only(path)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Clears the read-only attribute of `path` if the file exists.
///
/// # Errors
///
/// Returns [`crate::Error::FileError`] if the permissions cannot be read or updated.
#[allow(clippy::permissions_set_readonly_false)]
pub fn clear_read_only(path: &Path) -> Result<()> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(error.into()),
    };

    let mut permissions = metadata.permissions();
    if permissions.readonly() {
        permissions.set_readonly(false);
        fs::set_permissions(path, permissions)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.sys");
        fs::write(&path, b"MZ\x90\x00").unwrap();

        let file = File::from_file(&path).unwrap();
        assert_eq!(file.len(), 4);
        assert!(!file.is_empty());
        assert_eq!(file.data(), b"MZ\x90\x00");
    }

    #[test]
    fn missing_file() {
        match File::from_file(Path::new("/nonexistent/path/to/driver.sys")) {
            Err(crate::Error::FileError(error)) => {
                assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("Expected FileError, got {other:?}"),
        }
    }

    #[test]
    fn write_file_clears_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sfcfiles.dll");
        fs::write(&path, b"old").unwrap();

        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        write_file(&path, b"new contents").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new contents");
        assert!(!fs::metadata(&path).unwrap().permissions().readonly());
    }

    #[test]
    fn write_file_creates_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.sys");
        write_file(&path, &[1, 2, 3]).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
    }
}
