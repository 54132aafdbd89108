//! Near-optimal compression on a stack ("last in first out")
//!
//! This module provides the [`AnsCoder`], an entropy coder with a single register that
//! operates as a *stack* data structure. It implements the range variant of the Asymmetric
//! Numeral Systems (rANS) compression algorithm \[1] with runtime precision, so that the
//! same coder can be used with tables of different total mass.
//!
//! # References
//!
//! \[1] Duda, Jarek, et al. "The use of asymmetric numeral systems as an accurate
//! replacement for Huffman coding." 2015 Picture Coding Symposium (PCS). IEEE, 2015.

use core::{fmt::Debug, marker::PhantomData};

use num_traits::AsPrimitive;

use super::{Interval, Message};
use crate::{state_to_words, BitArray, Error, Precision, Result};

/// Entropy coder for both encoding and decoding on a stack.
///
/// You'll usually want to use this type through the type alias [`DefaultAnsCoder`].
///
/// The `AnsCoder` operates as a stack: pushing symbols grows the compressed data and
/// popping symbols shrinks it again, returning symbols in reverse order. Decoding with an
/// `AnsCoder` *consumes* the compressed data for the decoded symbols.
///
/// # Example
///
/// ```
/// use indexed_ans::{
///     stream::{stack::DefaultAnsCoder, Interval, Message},
///     Precision,
/// };
///
/// let precision = Precision::new(4)?;
/// let mut ans = DefaultAnsCoder::new();
/// ans.push(&Interval::new(3, 2), precision)?;
/// ans.push(&Interval::new(7, 9), precision)?;
///
/// let compressed = ans.into_compressed();
/// let mut ans = DefaultAnsCoder::from_compressed(compressed)?;
///
/// // Pop in reverse order. The pending pop tells us where in the CDF the message
/// // currently points; we resolve it to an interval and finish the pop.
/// let pending = ans.pop(precision)?;
/// assert!((7..16).contains(pending.cum_freq()));
/// pending.finish(&Interval::new(7, 9))?;
///
/// let pending = ans.pop(precision)?;
/// assert!((3..5).contains(pending.cum_freq()));
/// pending.finish(&Interval::new(3, 2))?;
/// assert!(ans.is_empty());
/// # Ok::<(), indexed_ans::Error>(())
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    bulk: Vec<Word>,

    /// Invariant: `state >= State::one() << (State::BITS - Word::BITS)` unless
    /// `bulk.is_empty()`.
    state: State,

    /// We keep track of the `Word` type so that we can statically enforce the invariant
    /// `Word: Into<State>`.
    phantom: PhantomData<Word>,
}

/// Type alias for an [`AnsCoder`] with sane parameters for typical use cases.
pub type DefaultAnsCoder = AnsCoder<u32, u64>;

impl<Word, State> Debug for AnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.iter_compressed()).finish()
    }
}

impl<Word, State> Default for AnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    fn default() -> Self {
        Self {
            bulk: Vec::new(),
            state: State::zero(),
            phantom: PhantomData,
        }
    }
}

impl<Word, State> AnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    /// Creates an empty ANS entropy coder.
    ///
    /// This is the starting point of every encode pass.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an ANS stack from compressed data previously obtained from
    /// [`into_compressed`](Self::into_compressed).
    ///
    /// Returns an error if `compressed` is not empty and its last entry is zero, since an
    /// `AnsCoder` never produces data with a trailing zero word.
    pub fn from_compressed(mut compressed: Vec<Word>) -> Result<Self> {
        let state = match compressed.pop() {
            None => State::zero(),
            Some(first_word) if first_word == Word::zero() => {
                return Err(Error::CorruptedData(
                    "compressed data must not end in a zero word",
                ))
            }
            Some(first_word) => {
                let mut state: State = first_word.into();
                while state < lower_bound::<Word, State>() {
                    match compressed.pop() {
                        Some(word) => state = state << Word::BITS | word.into(),
                        None => break,
                    }
                }
                state
            }
        };

        Ok(Self {
            bulk: compressed,
            state,
            phantom: PhantomData,
        })
    }

    /// Consumes the ANS coder and returns the compressed data.
    ///
    /// The returned data can be used to recreate an ANS coder with the same state
    /// (e.g., for decoding) by passing it to [`from_compressed`](Self::from_compressed).
    pub fn into_compressed(mut self) -> Vec<Word> {
        self.bulk
            .extend(state_to_words::<Word, _>(self.state).rev());
        self.bulk
    }

    /// Iterates over the compressed data currently on the stack without consuming it.
    pub fn iter_compressed(&self) -> impl Iterator<Item = Word> + '_ {
        let state_iter = state_to_words::<Word, _>(self.state).rev();
        self.bulk.iter().cloned().chain(state_iter)
    }

    /// Check if no data for decoding is left.
    pub fn is_empty(&self) -> bool {
        // We don't need to check if `bulk` is empty because we keep up the invariant that
        // `state >= State::one() << (State::BITS - Word::BITS))` when `bulk` is not empty.
        self.state == State::zero()
    }

    /// Returns the number of compressed words on the stack.
    ///
    /// This includes a constant overhead of between one and two words unless the
    /// stack is completely empty.
    pub fn num_words(&self) -> usize {
        self.bulk.len() + state_to_words::<Word, _>(self.state).len()
    }

    pub fn num_bits(&self) -> usize {
        Word::BITS * self.num_words()
    }

    #[inline(always)]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline(always)]
    pub fn bulk(&self) -> &[Word] {
        &self.bulk
    }

    /// Discards all compressed data and resets the coder to the same state as
    /// [`AnsCoder::new`].
    pub fn clear(&mut self) {
        self.bulk.clear();
        self.state = State::zero();
    }
}

impl<Word, State> Message for AnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    type Word = Word;
    type Interval = Interval<Word>;
    type CumFreq = Word;

    #[inline]
    fn push(&mut self, interval: &Interval<Word>, precision: Precision) -> Result<()> {
        push_onto(&mut self.state, &mut self.bulk, *interval, precision)
    }

    #[inline]
    fn peek(&self, precision: Precision) -> Result<Word> {
        peek_at::<Word, State>(self.state, precision)
    }

    #[inline(always)]
    fn verify(interval: &Interval<Word>, cum_freq: &Word) -> Result<()> {
        interval.verify_contains(*cum_freq)
    }

    #[inline]
    fn complete_pop(
        &mut self,
        cum_freq: &Word,
        interval: &Interval<Word>,
        precision: Precision,
    ) -> Result<()> {
        self.state = unfold(self.state, *cum_freq, *interval, precision);
        if self.state < lower_bound::<Word, State>() {
            // Invariant on `self.state` is violated. Restore it by refilling with a
            // compressed word from `self.bulk` if available.
            if let Some(word) = self.bulk.pop() {
                self.state = (self.state << Word::BITS) | word.into();
            }
        }
        Ok(())
    }
}

/// The smallest register value that a nonempty stack may hold.
#[inline(always)]
pub(crate) fn lower_bound<Word: BitArray, State: BitArray>() -> State {
    State::one() << (State::BITS - Word::BITS)
}

pub(crate) fn check_precision<Word: BitArray, State: BitArray>(
    precision: Precision,
) -> Result<()> {
    let bits = precision.bits() as usize;
    if bits > Word::BITS || State::BITS < Word::BITS + bits {
        return Err(Error::UnsupportedPrecision {
            bits: precision.bits(),
            word_bits: Word::BITS,
            state_bits: State::BITS,
        });
    }
    Ok(())
}

/// Folds `interval` into `state`, first moving one word to `bulk` if `state` would
/// otherwise overflow.
#[inline]
pub(crate) fn push_onto<Word, State>(
    state: &mut State,
    bulk: &mut Vec<Word>,
    interval: Interval<Word>,
    precision: Precision,
) -> Result<()>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    check_precision::<Word, State>(precision)?;
    interval.validate(precision)?;

    let bits = precision.bits() as usize;
    let freq: State = interval.freq.into();
    if (*state >> (State::BITS - bits)) >= freq {
        bulk.push(state.as_());
        *state = *state >> Word::BITS;
        // At this point, the invariant on `state` is temporarily violated, but it will be
        // restored below.
    }

    let prefix = *state / freq;
    let remainder = *state % freq;
    *state = prefix << bits | (remainder + interval.start.into());
    Ok(())
}

#[inline]
pub(crate) fn peek_at<Word, State>(state: State, precision: Precision) -> Result<Word>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    check_precision::<Word, State>(precision)?;
    let mask = (State::one() << precision.bits() as usize) - State::one();
    Ok((state & mask).as_())
}

/// Inverse of the arithmetic in [`push_onto`], without the refill.
///
/// `interval` must contain `cum_freq` and `precision` must have passed
/// [`check_precision`].
#[inline(always)]
pub(crate) fn unfold<Word, State>(
    state: State,
    cum_freq: Word,
    interval: Interval<Word>,
    precision: Precision,
) -> State
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    let remainder: State = (cum_freq - interval.start).into();
    (state >> precision.bits() as usize) * interval.freq.into() + remainder
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand_xoshiro::{
        rand_core::{RngCore, SeedableRng},
        Xoshiro256StarStar,
    };

    /// A fixed CDF over 5 symbols with a total mass of `2^precision`.
    fn make_cdf(precision: Precision) -> Vec<u32> {
        let total = precision.total_mass();
        vec![0, total / 8, total / 2, total / 2 + 1, total - total / 16, total]
    }

    fn interval_of(cdf: &[u32], symbol: usize) -> Interval<u32> {
        Interval::new(cdf[symbol], cdf[symbol + 1] - cdf[symbol])
    }

    fn symbol_of(cdf: &[u32], cum_freq: u32) -> usize {
        cdf.partition_point(|&x| x <= cum_freq) - 1
    }

    #[test]
    fn compress_none() {
        let coder1 = DefaultAnsCoder::new();
        assert!(coder1.is_empty());
        let compressed = coder1.into_compressed();
        assert!(compressed.is_empty());

        let coder2 = DefaultAnsCoder::from_compressed(compressed).unwrap();
        assert!(coder2.is_empty());
    }

    #[test]
    fn compress_one() {
        generic_compress_few(&[3], Some(1))
    }

    #[test]
    fn compress_two() {
        generic_compress_few(&[2, 4], Some(1))
    }

    #[test]
    fn compress_twenty() {
        generic_compress_few(&[0, 1, 2, 3, 4, 4, 3, 2, 1, 0, 1, 1, 4, 4, 0, 0, 2, 3, 3, 1], None)
    }

    fn generic_compress_few(symbols: &[usize], expected_size: Option<usize>) {
        let precision = Precision::new(12).unwrap();
        let cdf = make_cdf(precision);

        // We don't reuse the same encoder for decoding because we want to test
        // if exporting and re-importing of compressed data works.
        let mut encoder = DefaultAnsCoder::new();
        for &symbol in symbols.iter().rev() {
            encoder.push(&interval_of(&cdf, symbol), precision).unwrap();
        }
        let compressed = encoder.into_compressed();
        if let Some(expected_size) = expected_size {
            assert_eq!(compressed.len(), expected_size);
        }

        let mut decoder = DefaultAnsCoder::from_compressed(compressed).unwrap();
        for &symbol in symbols {
            let pending = decoder.pop(precision).unwrap();
            let decoded = symbol_of(&cdf, *pending.cum_freq());
            pending.finish(&interval_of(&cdf, decoded)).unwrap();
            assert_eq!(decoded, symbol);
        }
        assert!(decoder.is_empty());
    }

    #[test]
    fn compress_many_u32_u64_31() {
        generic_compress_many::<u32, u64>(31);
    }

    #[test]
    fn compress_many_u32_u64_24() {
        generic_compress_many::<u32, u64>(24);
    }

    #[test]
    fn compress_many_u32_u64_16() {
        generic_compress_many::<u32, u64>(16);
    }

    #[test]
    fn compress_many_u32_u64_4() {
        generic_compress_many::<u32, u64>(4);
    }

    #[test]
    fn compress_many_u16_u32_12() {
        generic_compress_many::<u16, u32>(12);
    }

    #[test]
    fn compress_many_u16_u64_15() {
        generic_compress_many::<u16, u64>(15);
    }

    #[test]
    fn compress_many_u8_u16_7() {
        generic_compress_many::<u8, u16>(7);
    }

    fn generic_compress_many<Word, State>(bits: u32)
    where
        Word: BitArray + Into<State>,
        State: BitArray + AsPrimitive<Word>,
        u32: AsPrimitive<Word>,
        Word: AsPrimitive<u32>,
    {
        const AMT: usize = 1000;

        let precision = Precision::new(bits).unwrap();
        let cdf = make_cdf(precision);
        let to_word = |interval: Interval<u32>| -> Interval<Word> {
            Interval::new(interval.start.as_(), interval.freq.as_())
        };

        let mut rng = Xoshiro256StarStar::seed_from_u64(
            (Word::BITS as u64).rotate_left(32) ^ (State::BITS as u64).rotate_left(16) ^ bits as u64,
        );
        let symbols = (0..AMT)
            .map(|_| symbol_of(&cdf, rng.next_u32() % precision.total_mass()))
            .collect::<Vec<_>>();

        let mut ans = AnsCoder::<Word, State>::new();
        for &symbol in symbols.iter().rev() {
            ans.push(&to_word(interval_of(&cdf, symbol)), precision)
                .unwrap();
        }

        // Test if import/export of compressed data works.
        let compressed = ans.into_compressed();
        let mut ans = AnsCoder::<Word, State>::from_compressed(compressed).unwrap();

        let reconstructed = (0..AMT)
            .map(|_| {
                let pending = ans.pop(precision).unwrap();
                let symbol = symbol_of(&cdf, pending.cum_freq().as_());
                pending.finish(&to_word(interval_of(&cdf, symbol))).unwrap();
                symbol
            })
            .collect::<Vec<_>>();

        assert!(ans.is_empty());
        assert_eq!(symbols, reconstructed);
    }

    #[test]
    fn rejects_invalid_push() {
        let precision = Precision::new(8).unwrap();
        let mut ans = DefaultAnsCoder::new();
        assert!(matches!(
            ans.push(&Interval::new(0, 0), precision),
            Err(Error::InvalidInterval { .. })
        ));
        assert!(ans.push(&Interval::new(200, 57), precision).is_err());

        let too_precise = Precision::new(9).unwrap();
        let mut small = AnsCoder::<u8, u16>::new();
        assert!(matches!(
            small.push(&Interval::new(0, 1), too_precise),
            Err(Error::UnsupportedPrecision { bits: 9, .. })
        ));
    }

    #[test]
    fn finish_rejects_foreign_interval() {
        let precision = Precision::new(8).unwrap();
        let mut ans = DefaultAnsCoder::new();
        ans.push(&Interval::new(100, 50), precision).unwrap();
        let compressed = ans.clone().into_compressed();

        let pending = ans.pop(precision).unwrap();
        assert!((100..150).contains(pending.cum_freq()));
        assert!(matches!(
            pending.finish(&Interval::new(0, 100)),
            Err(Error::InconsistentModel { .. })
        ));
        // The failed pop left the message untouched.
        assert_eq!(ans.into_compressed(), compressed);
    }

    #[test]
    fn rejects_trailing_zero_word() {
        assert!(DefaultAnsCoder::from_compressed(vec![7, 0]).is_err());
    }

    #[test]
    fn iter_compressed_matches_into_compressed() {
        let precision = Precision::new(10).unwrap();
        let mut ans = DefaultAnsCoder::new();
        for start in 0..100u32 {
            ans.push(&Interval::new(start * 3, 3), precision).unwrap();
        }
        let collected = ans.iter_compressed().collect::<Vec<_>>();
        assert_eq!(collected.len(), ans.num_words());
        assert_eq!(ans.num_bits(), 32 * collected.len());
        assert_eq!(collected, ans.into_compressed());
    }
}
