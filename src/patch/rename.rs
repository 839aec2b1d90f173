//! Renaming imported files in the import directory.
//!
//! A driver that imports `IMPORTEDFILE.SYS` can be redirected to `NEWFILENAME1.SYS` by
//! overwriting the name string its import descriptor points at. The new name must have the
//! same length, so the string is patched in place and nothing else in the image moves.

use std::path::Path;

use crate::{patch::bytes::check_replacement, PeImage, PreconditionError, Result};

/// Rename every import of `old_name` (compared case-insensitively) to `new_name`.
///
/// All descriptors are examined and every one whose name matches is patched; returns
/// `Ok(true)` if at least one was. The image is only modified after every descriptor has
/// been resolved, so on error it is left untouched.
///
/// # Errors
/// - [`crate::PreconditionError::LengthMismatch`] if the names differ in length
/// - [`crate::PreconditionError::EmptyPattern`] if the names are empty
/// - [`crate::PreconditionError::NonAsciiName`] if either name is not 7-bit ASCII
/// - [`crate::RangeError::AddressOutOfRange`] if a descriptor's name lies outside every section
/// - [`crate::RangeError::OutOfBounds`] if a descriptor's name lies beyond its section's raw data
///
/// # Examples
///
/// ```rust,no_run
/// use pepatch::{patch::rename_dependency, PeImage};
/// use std::path::Path;
///
/// let mut image = PeImage::from_file(Path::new("usbport.sys"))?;
/// if rename_dependency(&mut image, "USBD.SYS", "USBX.SYS")? {
///     image.write_to_file(Path::new("usbport.sys"))?;
/// }
/// # Ok::<(), pepatch::Error>(())
/// ```
pub fn rename_dependency(image: &mut PeImage, old_name: &str, new_name: &str) -> Result<bool> {
    check_replacement(old_name.as_bytes(), new_name.as_bytes())?;
    for name in [old_name, new_name] {
        if !name.is_ascii() {
            return Err(PreconditionError::NonAsciiName(name.to_string()).into());
        }
    }

    let Some(directory) = image.import_directory() else {
        return Ok(false);
    };

    let mut matches = Vec::new();
    for descriptor in &directory.descriptors {
        let (index, address, name) = image.read_section_string(descriptor.name_rva)?;
        if name.eq_ignore_ascii_case(old_name) {
            matches.push((index, address));
        }
    }

    for &(index, address) in &matches {
        let Some(section) = image.section_mut(index) else {
            return Err(out_of_bounds_error!());
        };
        section.as_mut_slice()[address..address + new_name.len()]
            .copy_from_slice(new_name.as_bytes());
    }

    Ok(!matches.is_empty())
}

/// Load the image at `path`, rename `old_name` to `new_name` and write it back.
///
/// The file is only rewritten when a rename happened. Returns whether it was.
///
/// # Errors
/// Returns the errors of [`rename_dependency`], [`crate::PeImage::from_file`] and
/// [`crate::PeImage::write_to_file`].
pub fn rename_dependency_in_file(path: &Path, old_name: &str, new_name: &str) -> Result<bool> {
    let mut image = PeImage::from_file(path)?;
    let changed = rename_dependency(&mut image, old_name, new_name)?;
    if changed {
        image.write_to_file(path)?;
    }
    Ok(changed)
}
