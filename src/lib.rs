//! Indexed Entropy Coding of Integer Tensors
//!
//! The `indexed-ans` crate losslessly packs tensors of integer symbols into a compact
//! stream of compressed words and back. Each symbol is coded with its own entropy model,
//! which is selected from a table of cumulative distribution functions ("CDFs") by a
//! parallel tensor of row indices. This is the setup used by learned image compression
//! methods, where a neural network predicts, for every quantized latent value, which of a
//! finite set of tabulated distributions best describes it.
//!
//! # Overview
//!
//! The crate is organized in layers, leaves first:
//!
//! - [`stream::stack`]: a range Asymmetric Numeral Systems (rANS) coder with a single
//!   register. It operates as a stack, i.e., symbols are decoded in reverse order of
//!   encoding.
//! - [`stream::lanes`]: the vectorized sibling of the above, with one register per element
//!   of a "coding shape" and a shared stack of compressed words.
//! - [`stream::codec`]: a generic symbol codec that combines an [`IntervalLookup`] and a
//!   [`SymbolLookup`] strategy and verifies on every decoded symbol that both agree.
//! - [`cdf`]: validated CDF tables and the row accessors that implement the lookups.
//! - [`escape`]: a small fixed-alphabet codec for values outside a row's modeled range.
//! - [`indexed`]: the orchestrators that encode and decode whole tensors, either one
//!   symbol at a time ([`indexed::scalar`]) or one lane at a time
//!   ([`indexed::vectorized`]).
//! - [`patch`]: decomposition of single-image tensors into tiles so that the vectorized
//!   orchestrator has enough lanes to work with.
//!
//! # Example
//!
//! ```
//! use indexed_ans::{indexed::scalar, CdfTable, CodingOptions, Precision};
//! use ndarray::{array, ArrayD, IxDyn};
//!
//! // Two rows with a total mass of `2^8` each. Each row's last bin is the escape bin.
//! let cdf = array![[0u32, 64, 192, 224, 256], [0, 128, 256, 0, 0]];
//! let table = CdfTable::new(cdf, array![5u32, 3], array![-2i32, 0], Precision::new(8)?)?;
//!
//! let symbols = ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![-1, 0, 1, 100])?;
//! let indices = ArrayD::from_shape_vec(IxDyn(&[1, 4]), vec![0, 1, 0, 1])?;
//! let options = CodingOptions::default();
//!
//! let encoded = scalar::encode(symbols.view(), indices.view(), &table, &options)?;
//! let decoded = scalar::decode(
//!     &encoded.compressed,
//!     indices.view(),
//!     &table,
//!     &encoded.coding_shape,
//!     &options,
//! )?;
//! assert_eq!(decoded, symbols);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(rust_2018_idioms, missing_debug_implementations)]

#[cfg(feature = "pybindings")]
mod pybindings;

pub mod cdf;
pub mod config;
pub mod error;
pub mod escape;
pub mod indexed;
pub mod patch;
pub mod stream;

use core::fmt::{Binary, Debug, Display, LowerHex, UpperHex};

use num_traits::{AsPrimitive, PrimInt, Unsigned, WrappingAdd, WrappingSub};

pub use cdf::{CdfRow, CdfTable, LaneCdf};
pub use config::CodingOptions;
pub use error::{Error, Result};
pub use indexed::{CodingShape, Encoded};
pub use stream::codec::{IntervalLookup, SymbolCodec, SymbolLookup};

/// A trait for bit strings of fixed (and usually small) length.
///
/// Used for the compressed words and the internal register of the coders in [`stream`].
/// This trait is implemented on all primitive unsigned integer types. There is usually no
/// reason to implement it on custom types since the coders assume that `BitArray`s can be
/// represented and manipulated efficiently in hardware.
pub trait BitArray:
    PrimInt
    + Unsigned
    + WrappingAdd
    + WrappingSub
    + Debug
    + Display
    + LowerHex
    + UpperHex
    + Binary
    + Default
    + AsPrimitive<u64>
    + 'static
{
    /// The (fixed) length of the `BitArray` in bits.
    const BITS: usize = 8 * core::mem::size_of::<Self>();
}

impl BitArray for u8 {}
impl BitArray for u16 {}
impl BitArray for u32 {}
impl BitArray for u64 {}
impl BitArray for usize {}

/// Reassembles a state from words ordered from most to least significant.
///
/// Reads at most as many words as fit into a `State`. Inverse of
/// [`state_to_words_padded`].
pub(crate) fn words_to_state<Word, State, I>(words: I) -> State
where
    I: IntoIterator<Item = Word>,
    Word: BitArray + Into<State>,
    State: BitArray,
{
    let max_count = (State::BITS + Word::BITS - 1) / Word::BITS;
    words
        .into_iter()
        .take(max_count)
        .fold(State::zero(), |state, word| (state << Word::BITS) | word.into())
}

/// Splits `state` into words from most to least significant, leaving out leading zero
/// words. A zero state yields no words at all.
pub(crate) fn state_to_words<Word, State>(
    state: State,
) -> impl Iterator<Item = Word> + ExactSizeIterator + DoubleEndedIterator
where
    Word: BitArray,
    State: BitArray + AsPrimitive<Word>,
{
    let significant_bits = State::BITS - state.leading_zeros() as usize;
    (0..significant_bits)
        .step_by(Word::BITS)
        .rev()
        .map(move |shift| (state >> shift).as_())
}

/// Like [`state_to_words`] but always yields `State::BITS / Word::BITS` words.
pub(crate) fn state_to_words_padded<Word, State>(
    state: State,
) -> impl Iterator<Item = Word> + ExactSizeIterator + DoubleEndedIterator
where
    Word: BitArray,
    State: BitArray + AsPrimitive<Word>,
{
    debug_assert_eq!(State::BITS % Word::BITS, 0);
    (0..State::BITS)
        .step_by(Word::BITS)
        .rev()
        .map(move |shift| (state >> shift).as_())
}

/// Fixed-point precision of an entropy model, i.e., the base-2 logarithm of its total
/// probability mass.
///
/// A CDF with precision `p` has cumulative frequencies in `0..=2^p`. Valid precisions are
/// `1..=Precision::MAX_BITS`, which guarantees that the total mass `2^p` fits into the
/// `u32` entries of a [`CdfTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Precision(u32);

impl Precision {
    /// Largest supported precision.
    pub const MAX_BITS: u32 = 31;

    /// Precisions at or above this value may lose representable accuracy in the coders.
    pub const ACCURACY_RISK_BITS: u32 = 24;

    pub fn new(bits: u32) -> Result<Self> {
        if bits == 0 || bits > Self::MAX_BITS {
            return Err(Error::InvalidPrecision {
                bits,
                max: Self::MAX_BITS,
            });
        }
        Ok(Self(bits))
    }

    #[inline(always)]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// The total probability mass `2^bits`.
    #[inline(always)]
    pub fn total_mass(self) -> u32 {
        1 << self.0
    }

    /// Returns `true` if the total mass reaches `2^ACCURACY_RISK_BITS`.
    ///
    /// Components that accept a model with such a precision emit a `tracing` warning but
    /// still carry on.
    pub fn risks_accuracy(self) -> bool {
        self.0 >= Self::ACCURACY_RISK_BITS
    }
}

impl Display for Precision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} bits", self.0)
    }
}
