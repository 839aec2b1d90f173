//! Removing a driver from the Windows File Protection list.
//!
//! Windows 2000, XP and Server 2003 keep the list of protected system files inside
//! `sfcfiles.dll` as UTF-16LE paths of the form `%systemroot%\system32\drivers\<name>`, all
//! lowercase. When GUI-mode setup finishes, `sfc.exe` restores any listed file whose content
//! differs from the in-box version, which silently replaces an updated driver. Renaming the
//! entry's last character to `0` (`e1000325.sys` becomes `e1000325.sy0`) keeps the table
//! layout intact while the real file is no longer protected.

use widestring::U16String;

use crate::{PeImage, PreconditionError, Result};

/// Directory prefix of driver entries in the protected file list.
pub const DRIVER_PATH_PREFIX: &str = r"%systemroot%\system32\drivers\";

/// Disable file protection for the driver `file_name` in a parsed `sfcfiles.dll`.
///
/// Every section is searched, since the list lives in `.text` on XP and in `.data` on
/// Windows 2000. Returns `Ok(true)` if an entry was found and renamed.
///
/// # Errors
/// - [`crate::PreconditionError::EmptyPattern`] if `file_name` is empty
/// - [`crate::PreconditionError::LengthMismatch`] if the renamed entry would change length,
///   which happens when the last character needs a UTF-16 surrogate pair
///
/// # Examples
///
/// ```rust,no_run
/// use pepatch::{patch::exclude_from_file_protection, PeImage};
/// use std::path::Path;
///
/// let mut image = PeImage::from_file(Path::new("sfcfiles.dll"))?;
/// if exclude_from_file_protection(&mut image, "E1000325.SYS")? {
///     image.write_to_file(Path::new("sfcfiles.dll"))?;
/// }
/// # Ok::<(), pepatch::Error>(())
/// ```
pub fn exclude_from_file_protection(image: &mut PeImage, file_name: &str) -> Result<bool> {
    let (protected, excluded) = protection_entries(file_name)?;
    image.replace_in_sections(&protected, &excluded)
}

/// The UTF-16LE bytes of the protected entry for `file_name` and of its renamed form.
///
/// # Errors
/// Returns [`crate::PreconditionError::EmptyPattern`] if `file_name` is empty.
pub fn protection_entries(file_name: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let file_name = file_name.to_lowercase();
    let mut renamed = file_name.chars();
    if renamed.next_back().is_none() {
        return Err(PreconditionError::EmptyPattern.into());
    }

    let protected = U16String::from_str(&format!("{DRIVER_PATH_PREFIX}{file_name}"));
    let excluded = U16String::from_str(&format!("{DRIVER_PATH_PREFIX}{}0", renamed.as_str()));

    Ok((utf16le_bytes(&protected), utf16le_bytes(&excluded)))
}

fn utf16le_bytes(value: &U16String) -> Vec<u8> {
    value
        .as_slice()
        .iter()
        .flat_map(|unit| unit.to_le_bytes())
        .collect()
}
