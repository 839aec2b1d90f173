//! Low-level byte order and safe reading/writing utilities for PE parsing.
//!
//! Every multi-byte field in the PE/COFF format is little-endian. This module provides the
//! bounds-checked primitives that all header codecs are built on:
//!
//! - [`crate::file::io::read_le`] / [`crate::file::io::read_le_at`] - read a value, optionally
//!   advancing an offset
//! - [`crate::file::io::write_le`] / [`crate::file::io::write_le_at`] - overwrite a value in an
//!   existing buffer, optionally advancing an offset
//! - [`crate::file::io::push_le`] - append a value to a growing output buffer
//!
//! All reading and in-place writing functions return [`crate::Result<T>`] and fail with
//! [`crate::RangeError::OutOfBounds`] if there are insufficient bytes in the buffer, so a
//! truncated or hostile input can never cause a panic or an out-of-bounds access.
//!
//! # Examples
//!
//! ```rust
//! use pepatch::file::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 0x5A4D_u16)?;
//! write_le_at(&mut data, &mut offset, 0x80_u32)?;
//!
//! offset = 0;
//! assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 0x5A4D);
//! assert_eq!(read_le_at::<u32>(&data, &mut offset)?, 0x80);
//! # Ok::<(), pepatch::Error>(())
//! ```

use crate::Result;

/// Trait for implementing type-specific safe binary data reading and writing operations.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait PeIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
}

// Implement PeIO support for u64
impl PeIO for u64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u64::to_le_bytes(self)
    }
}

// Implement PeIO support for u32
impl PeIO for u32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u32::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u32::to_le_bytes(self)
    }
}

// Implement PeIO support for u16
impl PeIO for u16 {
    type Bytes = [u8; 2];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u16::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u16::to_le_bytes(self)
    }
}

// Implement PeIO support for u8
impl PeIO for u8 {
    type Bytes = [u8; 1];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u8::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u8::to_le_bytes(self)
    }
}

/// Safely reads a value of type `T` in little-endian byte order from the start of a buffer.
///
/// # Errors
///
/// Returns [`crate::RangeError::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: PeIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (will be advanced after reading)
///
/// # Errors
///
/// Returns [`crate::RangeError::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: PeIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Safely writes a value of type `T` in little-endian byte order at the start of a buffer.
///
/// # Errors
///
/// Returns [`crate::RangeError::OutOfBounds`] if the buffer is too small.
pub fn write_le<T: PeIO>(data: &mut [u8], value: T) -> Result<()> {
    let mut offset = 0_usize;
    write_le_at(data, &mut offset, value)
}

/// Safely writes a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes written. Nothing is written if the value
/// does not fit.
///
/// # Errors
///
/// Returns [`crate::RangeError::OutOfBounds`] if the buffer is too small.
pub fn write_le_at<T: PeIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let bytes = value.to_le_bytes();
    data[*offset..end].copy_from_slice(bytes.as_ref());
    *offset = end;

    Ok(())
}

/// Appends a value of type `T` in little-endian byte order to a growing buffer.
pub fn push_le<T: PeIO>(out: &mut Vec<u8>, value: T) {
    out.extend_from_slice(value.to_le_bytes().as_ref());
}
