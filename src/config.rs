//! Options that encoder and decoder have to agree on.

use crate::{escape::EscapeCodec, Error, Result};

/// Parameters of an encode or decode call that aren't part of the entropy models.
///
/// A decode call must use the same options as the encode call that produced the
/// compressed data.
///
/// # Example
///
/// ```
/// use indexed_ans::CodingOptions;
///
/// let options = CodingOptions::default().with_overflow_width(8).with_patch_size((2, 2));
/// assert!(options.validate().is_ok());
/// assert!(CodingOptions::default().with_patch_size((0, 4)).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodingOptions {
    /// Number of bits per digit of an escape payload, in `1..=16`.
    pub overflow_width: u32,

    /// Height and width of the tiles into which the vectorized orchestrator splits a
    /// single-lane tensor.
    pub patch_size: (usize, usize),
}

impl CodingOptions {
    pub const DEFAULT_OVERFLOW_WIDTH: u32 = 4;
    pub const DEFAULT_PATCH_SIZE: (usize, usize) = (4, 4);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overflow_width(mut self, overflow_width: u32) -> Self {
        self.overflow_width = overflow_width;
        self
    }

    pub fn with_patch_size(mut self, patch_size: (usize, usize)) -> Self {
        self.patch_size = patch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.overflow_width == 0 || self.overflow_width > EscapeCodec::MAX_WIDTH {
            return Err(Error::InvalidOverflowWidth(self.overflow_width));
        }
        if self.patch_size.0 == 0 || self.patch_size.1 == 0 {
            return Err(Error::InvalidPatchSize(self.patch_size));
        }
        Ok(())
    }

    pub(crate) fn escape_codec(&self) -> Result<EscapeCodec> {
        EscapeCodec::new(self.overflow_width)
    }
}

impl Default for CodingOptions {
    fn default() -> Self {
        Self {
            overflow_width: Self::DEFAULT_OVERFLOW_WIDTH,
            patch_size: Self::DEFAULT_PATCH_SIZE,
        }
    }
}
