//! Executables preceded by an opaque loader.
//!
//! `setupldr.bin` and `ntldr` on XP and Server 2003 media are a real-mode loader followed by
//! a regular PE image. The loader verifies the checksum of the embedded image before it runs
//! it, so a patch has to go through the PE model and be re-checksummed, while the loader
//! bytes in front of it are carried over unchanged.

use crate::{pe::dos::DOS_SIGNATURE, patch::bytes::find, PeImage, Result};

/// A PE image located after a prefix of arbitrary bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    prefix: Vec<u8>,
    image: PeImage,
}

impl EmbeddedImage {
    /// Split `data` at the first `MZ` signature and parse the image that starts there.
    ///
    /// # Errors
    /// - [`crate::FormatError::Malformed`] if `data` contains no `MZ` signature
    /// - the errors of [`crate::PeImage::parse`] for the embedded image
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use pepatch::patch::EmbeddedImage;
    ///
    /// let data = std::fs::read("setupldr.bin")?;
    /// let mut loader = EmbeddedImage::parse(&data)?;
    /// loader
    ///     .image_mut()
    ///     .replace_in_section(0, b"ntkrnlmp.exe", b"ntoskrnl.exe")?;
    /// std::fs::write("setupldr.bin", loader.serialize()?)?;
    /// # Ok::<(), pepatch::Error>(())
    /// ```
    pub fn parse(data: &[u8]) -> Result<Self> {
        let Some(offset) = find(data, &DOS_SIGNATURE.to_le_bytes(), 0) else {
            return Err(malformed_error!(
                "No MZ signature in {} bytes of input",
                data.len()
            ));
        };

        Ok(EmbeddedImage {
            prefix: data[..offset].to_vec(),
            image: PeImage::parse(&data[offset..])?,
        })
    }

    /// The bytes in front of the embedded image.
    #[must_use]
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// The embedded image.
    #[must_use]
    pub fn image(&self) -> &PeImage {
        &self.image
    }

    /// The embedded image, for patching.
    pub fn image_mut(&mut self) -> &mut PeImage {
        &mut self.image
    }

    /// The prefix followed by the serialized, re-checksummed image.
    ///
    /// # Errors
    /// Returns the errors of [`crate::PeImage::serialize`].
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let image = self.image.serialize()?;
        let mut out = Vec::with_capacity(self.prefix.len() + image.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(&image);
        Ok(out)
    }
}
