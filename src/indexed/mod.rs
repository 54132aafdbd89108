//! Encoding and decoding of whole tensors with indexed CDF tables
//!
//! Both orchestrators take a tensor of `i32` symbols, a parallel tensor of row indices
//! into a [`CdfTable`](crate::CdfTable), and [`CodingOptions`](crate::CodingOptions).
//! They return the compressed words together with the [`CodingShape`] that the matching
//! decode call needs.
//!
//! - [`scalar`] codes one symbol at a time on a single rANS register.
//! - [`vectorized`] codes one lane (one entry of the leading axis) at a time on a
//!   register per lane element, decomposing single-image tensors into patches first.
//!
//! The two orchestrators produce different compressed data for the same input, and
//! data produced by one can only be decoded by the other's counterpart.
//!
//! Symbols whose shifted value falls outside of their row's modeled range are clamped
//! to the row's escape bin and recovered through an escape payload (see
//! [`crate::escape`]), so any `i32` tensor round-trips as long as every symbol that it
//! maps to a bin has a nonzero probability.
//!
//! Decoding needs the exact table that was used for encoding. Every table is validated
//! when it's constructed, and decoders reject compressed data that runs out early or
//! has words left over at the end. Beyond that, nothing in the compressed data
//! identifies the table: decoding with a different valid table may fail with
//! [`Error::CorruptedData`], but it may just as well return different symbols.

pub mod scalar;
pub mod vectorized;

use ndarray::ArrayViewD;
use smallvec::SmallVec;

use crate::{Error, Result};

/// The shape that a decode call must be told about, as returned by the encode call.
///
/// For [`scalar`] coding, this is the shape of the symbol tensor. For [`vectorized`]
/// coding, it's the shape of a single lane.
pub type CodingShape = SmallVec<[usize; 4]>;

/// The output of an encode call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Encoded {
    pub compressed: Vec<u32>,
    pub coding_shape: CodingShape,
}

impl Encoded {
    /// Returns the compressed data as little endian bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        crate::stream::words_to_bytes(&self.compressed)
    }
}

fn check_same_shape(symbols: &ArrayViewD<'_, i32>, indices: &ArrayViewD<'_, i32>) -> Result<()> {
    if symbols.shape() != indices.shape() {
        return Err(Error::ShapeMismatch {
            expected: symbols.shape().to_vec(),
            actual: indices.shape().to_vec(),
        });
    }
    Ok(())
}

fn to_symbol(position: usize, shifted: i64, offset: i32) -> Result<i32> {
    let value = shifted.saturating_add(offset.into());
    i32::try_from(value).map_err(|_| {
        tracing::debug!(position, value, "decoded symbol out of range");
        Error::SymbolOverflow(value)
    })
}
