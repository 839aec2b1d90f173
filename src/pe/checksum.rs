//! The PE image checksum.
//!
//! This is the algorithm of `CheckSumMappedFile`: a one's-complement style sum of all
//! little-endian 32-bit words folded down to 16 bits, plus the file length. The word holding
//! the checksum itself is excluded, so the result does not depend on the stale value stored
//! in the header. Setup and the kernel loader compare it against the header field of boot
//! drivers, which is why every patched image is re-checksummed.
//!
//! # Examples
//!
//! ```rust
//! use pepatch::pe::checksum;
//!
//! let mut data = vec![0u8; 256];
//! data[0] = 0x4D;
//! data[1] = 0x5A;
//!
//! let value = checksum::compute(&data, 0x58);
//! data[0x58..0x5C].copy_from_slice(&value.to_le_bytes());
//! assert!(checksum::verify(&data, 0x58));
//! ```

/// Compute the checksum of `data`, skipping the 32-bit word that contains `checksum_offset`.
///
/// A length that is not a multiple of four is summed as if zero-padded; the length added
/// at the end is always the unpadded one.
#[must_use]
pub fn compute(data: &[u8], checksum_offset: usize) -> u32 {
    let skipped_word = checksum_offset / 4;
    let mut sum: u64 = 0;

    let chunks = data.chunks(4);
    for (index, chunk) in chunks.enumerate() {
        if index == skipped_word {
            continue;
        }

        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);

        sum = (sum & 0xFFFF_FFFF) + u64::from(u32::from_le_bytes(word)) + (sum >> 32);
        if sum > 1 << 32 {
            sum = (sum & 0xFFFF_FFFF) + (sum >> 32);
        }
    }

    sum = (sum & 0xFFFF) + (sum >> 16);
    sum += sum >> 16;
    sum &= 0xFFFF;

    // Lengths beyond 4 GiB wrap, as the 32-bit header field does.
    (sum as u32).wrapping_add(data.len() as u32)
}

/// Returns `true` if the value stored at `checksum_offset` matches [`compute`].
///
/// Data too short to contain the field never verifies.
#[must_use]
pub fn verify(data: &[u8], checksum_offset: usize) -> bool {
    stored(data, checksum_offset).is_some_and(|value| value == compute(data, checksum_offset))
}

pub(crate) fn stored(data: &[u8], checksum_offset: usize) -> Option<u32> {
    let field = data.get(checksum_offset..checksum_offset.checked_add(4)?)?;
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(field);
    Some(u32::from_le_bytes(bytes))
}
