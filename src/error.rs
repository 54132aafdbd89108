//! Error types for indexed entropy coding.

use thiserror::Error;

/// Error variants for encoding and decoding.
///
/// Every error is fatal for the call that returned it: a failed encode or decode call
/// produces no usable output, and a message that was being modified when the error
/// occurred must be discarded.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// Precision outside of the range that fits into a CDF table entry.
    #[error("invalid precision {bits}: must be in 1..={max}")]
    InvalidPrecision { bits: u32, max: u32 },

    /// Precision that the coder's word and state types cannot represent.
    #[error(
        "precision {bits} is not supported by a coder with {word_bits}-bit words and \
         {state_bits}-bit state"
    )]
    UnsupportedPrecision {
        bits: u32,
        word_bits: usize,
        state_bits: usize,
    },

    /// Tried to push an empty or out-of-range frequency interval.
    #[error("invalid interval [{start}, {start} + {freq}) for a total mass of 2^{precision}")]
    InvalidInterval { start: u64, freq: u64, precision: u32 },

    /// The CDF table violates one of its structural invariants.
    #[error("invalid CDF table: {0}")]
    InvalidCdf(String),

    /// An entry of the index tensor does not refer to a row of the CDF table.
    #[error("invalid index {index} for symbol {position}: table has {rows} rows")]
    IndexOutOfRange {
        position: usize,
        index: i64,
        rows: usize,
    },

    /// A row's declared length leaves no room for at least the escape bin.
    #[error("invalid max value {max_value} for symbol {position} (table width {width})")]
    InvalidMaxValue {
        position: usize,
        max_value: i64,
        width: usize,
    },

    /// A shifted value is not a valid bin of its row after clamping.
    #[error("invalid shifted value {value} for symbol {position} with cdf length {length}")]
    InvalidShiftedValue {
        position: usize,
        value: i64,
        length: usize,
    },

    /// Decoding resolved a cumulative frequency to a symbol whose interval doesn't contain
    /// it. The decoder's model disagrees with the encoder's (or the lookup is broken).
    #[error(
        "decoded cumulative frequency {cum_freq} lies outside of the interval \
         [{start}, {start} + {freq}) of the resolved symbol"
    )]
    InconsistentModel { cum_freq: u64, start: u64, freq: u64 },

    /// A tensor or coding shape doesn't match the shape it has to agree with.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A single-lane tensor can't be split into the configured patches.
    #[error("cannot split a tensor of shape {shape:?} into {patch_size:?} patches")]
    PatchMismatch {
        shape: Vec<usize>,
        patch_size: (usize, usize),
    },

    /// Overflow width outside of `1..=16`.
    #[error("invalid overflow width {0}: must be in 1..=16")]
    InvalidOverflowWidth(u32),

    /// Patch size with a zero side length.
    #[error("invalid patch size {0:?}")]
    InvalidPatchSize((usize, usize)),

    /// The compressed data can't have been produced by the matching encoder.
    #[error("corrupted compressed data: {0}")]
    CorruptedData(&'static str),

    /// A decoded escape payload describes a value that doesn't fit into an `i32`.
    #[error("decoded value {0} doesn't fit into a 32-bit symbol")]
    SymbolOverflow(i64),
}

/// A specialized Result type for indexed entropy coding.
pub type Result<T> = core::result::Result<T, Error>;
