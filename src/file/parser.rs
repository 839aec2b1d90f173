//! Low-level byte stream parser for PE header decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based binary data
//! parser used by every header codec in [`crate::pe`]. It offers bounds-checked access to
//! binary data so that truncated or corrupted images surface as
//! [`crate::RangeError::OutOfBounds`] instead of panics.
//!
//! # Key Components
//!
//! - [`crate::file::parser::Parser::seek`] / [`crate::file::parser::Parser::advance_by`] - navigation
//! - [`crate::file::parser::Parser::read_le`] - little-endian primitive reads
//! - [`crate::file::parser::Parser::read_bytes`] - borrow a raw byte range
//! - [`crate::file::parser::Parser::read_string_ascii`] - null-terminated ASCII strings
//!
//! # Examples
//!
//! ```rust
//! use pepatch::Parser;
//!
//! let data = [0x4D, 0x5A, 0x90, 0x00, 0x03, 0x00];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_le::<u16>()?, 0x5A4D);
//! parser.seek(4)?;
//! assert_eq!(parser.read_le::<u16>()?, 3);
//! assert!(!parser.has_more_data());
//! # Ok::<(), pepatch::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, PeIO},
    Result,
};

/// A generic binary data parser for reading PE structures.
///
/// `Parser` maintains an internal position cursor and provides bounds checking
/// to prevent buffer overruns when reading malformed or truncated data.
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Returns the number of bytes between the cursor and the end of the data.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Move the current position to the specified index.
    ///
    /// Seeking to exactly the end of the data is allowed, it leaves nothing to read.
    ///
    /// # Arguments
    /// * `pos` - The position to move the cursor to
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Arguments
    /// * `step` - Amount of bytes to advance
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if advancing by step would exceed the data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Read a type `T` from the current position in little-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if reading would exceed the data length.
    pub fn read_le<T: PeIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Borrow the next `len` bytes and advance the position past them.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }

    /// Read a fixed-size byte array and advance the position past it.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    /// Read a null-terminated ASCII string.
    ///
    /// Reading stops at the first zero byte, which is consumed but not returned. A string
    /// running up to the end of the data without a terminator is accepted as-is. Bytes
    /// outside of 7-bit ASCII are replaced with U+FFFD.
    ///
    /// # Errors
    /// Returns [`crate::RangeError::OutOfBounds`] if the cursor is already at the end of the data.
    pub fn read_string_ascii(&mut self) -> Result<String> {
        if !self.has_more_data() {
            return Err(out_of_bounds_error!());
        }

        let start = self.position;
        let end = self.data[start..]
            .iter()
            .position(|&byte| byte == 0)
            .map_or(self.data.len(), |len| start + len);

        let string_data = &self.data[start..end];
        self.position = if end < self.data.len() { end + 1 } else { end };

        Ok(string_data
            .iter()
            .map(|&byte| {
                if byte.is_ascii() {
                    char::from(byte)
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })
            .collect())
    }
}
