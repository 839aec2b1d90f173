//! Fixed-length find and replace over a byte buffer.
//!
//! Patching never moves bytes: every offset stored elsewhere in an image stays valid only
//! as long as each replacement is exactly as long as what it replaces. [`replace_all`]
//! therefore refuses sequences of different lengths before it touches the buffer.

use crate::{PreconditionError, Result};

/// Check that `new` can replace `old` without moving any bytes.
///
/// # Errors
/// - [`crate::PreconditionError::LengthMismatch`] if the lengths differ
/// - [`crate::PreconditionError::EmptyPattern`] if both are empty
pub fn check_replacement(old: &[u8], new: &[u8]) -> Result<()> {
    if old.len() != new.len() {
        return Err(PreconditionError::LengthMismatch {
            old: old.len(),
            new: new.len(),
        }
        .into());
    }

    if old.is_empty() {
        return Err(PreconditionError::EmptyPattern.into());
    }

    Ok(())
}

/// Position of the first occurrence of `needle` in `haystack` at or after `start`.
///
/// An empty needle never matches.
#[must_use]
pub fn find(haystack: &[u8], needle: &[u8], start: usize) -> Option<usize> {
    if needle.is_empty() || start >= haystack.len() {
        return None;
    }

    haystack[start..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|position| start + position)
}

/// Replace every non-overlapping occurrence of `old` in `buffer` with `new`.
///
/// The buffer is scanned left to right and scanning resumes after each replaced
/// occurrence. Returns `Ok(true)` if at least one occurrence was replaced and `Ok(false)` if
/// `old` does not occur, which is not an error.
///
/// # Errors
/// Fails with [`check_replacement`]'s errors, in which case `buffer` is left untouched.
///
/// # Examples
///
/// ```rust
/// use pepatch::patch::replace_all;
///
/// let mut data = b"\\ntkrnlmp.exe\0".to_vec();
/// assert!(replace_all(&mut data, b"ntkrnlmp.exe", b"ntoskrnl.exe")?);
/// assert_eq!(&data, b"\\ntoskrnl.exe\0");
///
/// assert!(!replace_all(&mut data, b"ntkrnlmp.exe", b"ntoskrnl.exe")?);
/// assert!(replace_all(&mut data, b"ntoskrnl", b"ntoskrnl.exe").is_err());
/// # Ok::<(), pepatch::Error>(())
/// ```
pub fn replace_all(buffer: &mut [u8], old: &[u8], new: &[u8]) -> Result<bool> {
    check_replacement(old, new)?;

    let mut changed = false;
    let mut position = 0;
    while let Some(found) = find(buffer, old, position) {
        buffer[found..found + new.len()].copy_from_slice(new);
        position = found + old.len();
        changed = true;
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn find_positions() {
        let data = b"abcabcab";
        assert_eq!(find(data, b"abc", 0), Some(0));
        assert_eq!(find(data, b"abc", 1), Some(3));
        assert_eq!(find(data, b"abc", 4), None);
        assert_eq!(find(data, b"cab", 0), Some(2));
        assert_eq!(find(data, b"", 0), None);
        assert_eq!(find(data, b"abc", 100), None);
    }

    #[test]
    fn match_at_final_position() {
        let mut data = b"xxxxntkrnlmp.exe".to_vec();
        assert!(replace_all(&mut data, b"ntkrnlmp.exe", b"ntoskrnl.exe").unwrap());
        assert_eq!(&data, b"xxxxntoskrnl.exe");

        let mut whole = b"ntkrnlmp.exe".to_vec();
        assert!(replace_all(&mut whole, b"ntkrnlmp.exe", b"ntoskrnl.exe").unwrap());
        assert_eq!(&whole, b"ntoskrnl.exe");
    }

    #[test]
    fn replaces_every_occurrence() {
        let mut data = b"hal.dll\0hal.dll\0kdcom.dll\0hal.dll".to_vec();
        assert!(replace_all(&mut data, b"hal.dll", b"HAL.DLL").unwrap());
        assert_eq!(&data, b"HAL.DLL\0HAL.DLL\0kdcom.dll\0HAL.DLL");
    }

    #[test]
    fn occurrences_do_not_overlap() {
        let mut data = b"aaaaa".to_vec();
        assert!(replace_all(&mut data, b"aa", b"bb").unwrap());
        assert_eq!(&data, b"bbbba");
    }

    #[test]
    fn replacement_is_not_rescanned() {
        let mut data = b"abab".to_vec();
        assert!(replace_all(&mut data, b"ab", b"ba").unwrap());
        assert_eq!(&data, b"baba");
    }

    #[test]
    fn no_match_is_not_an_error() {
        let mut data = b"nothing here".to_vec();
        let original = data.clone();
        assert!(!replace_all(&mut data, b"usbstor", b"usbstox").unwrap());
        assert_eq!(data, original);

        let mut short = b"ab".to_vec();
        assert!(!replace_all(&mut short, b"abc", b"xyz").unwrap());
    }

    #[test]
    fn length_mismatch_leaves_buffer_untouched() {
        let mut data = b"ntkrnlmp.exe ntkrnlmp.exe".to_vec();
        let original = data.clone();

        match replace_all(&mut data, b"ntkrnlmp.exe", b"ntoskrnl.ex") {
            Err(Error::Precondition(PreconditionError::LengthMismatch { old, new })) => {
                assert_eq!(old, 12);
                assert_eq!(new, 11);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(data, original);
    }

    #[test]
    fn empty_pattern() {
        let mut data = b"abc".to_vec();
        assert!(matches!(
            replace_all(&mut data, b"", b""),
            Err(Error::Precondition(PreconditionError::EmptyPattern))
        ));
    }

    #[test]
    fn replace_then_replace_back() {
        let original: Vec<u8> = b"..sfc_os.dll..sfc.dll..sfc_os.dll..".to_vec();
        let mut data = original.clone();

        assert!(replace_all(&mut data, b"sfc_os", b"sfc_xx").unwrap());
        assert_ne!(data, original);
        assert!(replace_all(&mut data, b"sfc_xx", b"sfc_os").unwrap());
        assert_eq!(data, original);
    }
}
