//! Vectorized stack coding with one register per lane element
//!
//! A [`LaneAnsCoder`] keeps one rANS register ("head") for every element of a fixed
//! *coding shape* and a single stack of compressed words that all heads share. A vector
//! push folds one interval into every head at once, and a vector pop peeks and completes
//! one cumulative frequency per head. This lets the vectorized orchestrator in
//! [`crate::indexed::vectorized`] code a whole lane of symbols with a single call.
//!
//! Renormalization is deterministic: a vector push emits words in element order, and a
//! vector pop refills words in reverse element order, so that the shared stack stays
//! consistent.
//!
//! Individual heads can be borrowed as a scalar [`Message`] via [`LaneAnsCoder::head`],
//! which is how per-element escape payloads are coded.

use core::{fmt::Debug, marker::PhantomData};

use num_traits::AsPrimitive;
use smallvec::SmallVec;

use super::{
    stack::{check_precision, lower_bound, peek_at, push_onto, unfold},
    Interval, Message,
};
use crate::{state_to_words_padded, words_to_state, BitArray, Error, Precision, Result};

/// Entropy coder with one register per element of a coding shape.
///
/// You'll usually want to use this type through the type alias [`DefaultLaneAnsCoder`].
///
/// # Example
///
/// ```
/// use indexed_ans::{
///     stream::{lanes::DefaultLaneAnsCoder, Interval, Message},
///     Precision,
/// };
///
/// let precision = Precision::new(8)?;
/// let intervals = vec![Interval::new(0, 16), Interval::new(16, 200), Interval::new(216, 40)];
///
/// let mut coder = DefaultLaneAnsCoder::new(&[3]);
/// coder.push(&intervals, precision)?;
/// let compressed = coder.into_compressed();
///
/// let mut coder = DefaultLaneAnsCoder::from_compressed(compressed, &[3])?;
/// let pending = coder.pop(precision)?;
/// for (cum_freq, interval) in pending.cum_freq().iter().zip(&intervals) {
///     assert!(interval.verify_contains(*cum_freq).is_ok());
/// }
/// pending.finish(&intervals)?;
/// assert!(coder.bulk().is_empty());
/// # Ok::<(), indexed_ans::Error>(())
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LaneAnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    bulk: Vec<Word>,

    /// Invariant: every head is `>= State::one() << (State::BITS - Word::BITS)` between
    /// any two calls.
    heads: Vec<State>,

    shape: SmallVec<[usize; 4]>,

    phantom: PhantomData<Word>,
}

pub type DefaultLaneAnsCoder = LaneAnsCoder<u32, u64>;

impl<Word, State> Debug for LaneAnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LaneAnsCoder")
            .field("shape", &self.shape)
            .field("heads", &self.heads)
            .field("bulk_len", &self.bulk.len())
            .finish()
    }
}

impl<Word, State> LaneAnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    /// Number of words that [`into_compressed`](Self::into_compressed) appends per head.
    const WORDS_PER_HEAD: usize = State::BITS / Word::BITS;

    /// Creates an empty coder for the given coding shape.
    ///
    /// All heads start at the lower renormalization bound.
    pub fn new(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            bulk: Vec::new(),
            heads: vec![lower_bound::<Word, State>(); len],
            shape: shape.into(),
            phantom: PhantomData,
        }
    }

    /// Recreates a coder from data previously obtained from
    /// [`into_compressed`](Self::into_compressed) on a coder with the same `shape`.
    pub fn from_compressed(mut compressed: Vec<Word>, shape: &[usize]) -> Result<Self> {
        let len: usize = shape.iter().product();
        let head_words = len * Self::WORDS_PER_HEAD;
        if compressed.len() < head_words {
            return Err(Error::CorruptedData(
                "compressed data is too short for the coding shape",
            ));
        }

        let heads = compressed
            .split_off(compressed.len() - head_words)
            .chunks_exact(Self::WORDS_PER_HEAD)
            .map(|chunks| words_to_state::<Word, State, _>(chunks.iter().copied()))
            .collect::<Vec<_>>();
        if heads.iter().any(|&head| head < lower_bound::<Word, State>()) {
            return Err(Error::CorruptedData(
                "register below the renormalization bound",
            ));
        }

        Ok(Self {
            bulk: compressed,
            heads,
            shape: shape.into(),
            phantom: PhantomData,
        })
    }

    /// Consumes the coder and returns the compressed data: the shared stack followed by
    /// every head, each as a fixed number of words.
    pub fn into_compressed(mut self) -> Vec<Word> {
        self.bulk.reserve(self.heads.len() * Self::WORDS_PER_HEAD);
        for &head in &self.heads {
            self.bulk.extend(state_to_words_padded::<Word, State>(head));
        }
        self.bulk
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of heads, i.e., the product of the coding shape.
    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn heads(&self) -> &[State] {
        &self.heads
    }

    pub fn bulk(&self) -> &[Word] {
        &self.bulk
    }

    /// Returns `true` if the shared stack is empty and every head is back at its initial
    /// value, i.e., if everything that was pushed has been popped again.
    pub fn is_drained(&self) -> bool {
        self.bulk.is_empty()
            && self
                .heads
                .iter()
                .all(|&head| head == lower_bound::<Word, State>())
    }

    pub fn num_words(&self) -> usize {
        self.bulk.len() + self.heads.len() * Self::WORDS_PER_HEAD
    }

    /// Borrows the head at flat position `index` together with the shared stack as a
    /// scalar message.
    ///
    /// Returns `None` if `index` is out of bounds.
    pub fn head(&mut self, index: usize) -> Option<HeadMut<'_, Word, State>> {
        let state = self.heads.get_mut(index)?;
        Some(HeadMut {
            state,
            bulk: &mut self.bulk,
        })
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len != self.heads.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![self.heads.len()],
                actual: vec![len],
            });
        }
        Ok(())
    }
}

impl<Word, State> Message for LaneAnsCoder<Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    type Word = Word;
    type Interval = Vec<Interval<Word>>;
    type CumFreq = Vec<Word>;

    fn push(&mut self, intervals: &Vec<Interval<Word>>, precision: Precision) -> Result<()> {
        self.check_len(intervals.len())?;
        check_precision::<Word, State>(precision)?;
        for interval in intervals {
            interval.validate(precision)?;
        }

        for (head, interval) in self.heads.iter_mut().zip(intervals) {
            push_onto(head, &mut self.bulk, *interval, precision)?;
        }
        Ok(())
    }

    fn peek(&self, precision: Precision) -> Result<Vec<Word>> {
        self.heads
            .iter()
            .map(|&head| peek_at::<Word, State>(head, precision))
            .collect()
    }

    fn verify(intervals: &Vec<Interval<Word>>, cum_freqs: &Vec<Word>) -> Result<()> {
        if intervals.len() != cum_freqs.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![cum_freqs.len()],
                actual: vec![intervals.len()],
            });
        }
        intervals
            .iter()
            .zip(cum_freqs)
            .try_for_each(|(interval, &cum_freq)| interval.verify_contains(cum_freq))
    }

    fn complete_pop(
        &mut self,
        cum_freqs: &Vec<Word>,
        intervals: &Vec<Interval<Word>>,
        precision: Precision,
    ) -> Result<()> {
        self.check_len(intervals.len())?;
        self.check_len(cum_freqs.len())?;

        // Refill in reverse order of emission.
        for ((head, &cum_freq), &interval) in self
            .heads
            .iter_mut()
            .zip(cum_freqs)
            .zip(intervals)
            .rev()
        {
            *head = unfold(*head, cum_freq, interval, precision);
            refill(head, &mut self.bulk)?;
        }
        Ok(())
    }
}

/// A single head of a [`LaneAnsCoder`], borrowed together with the shared stack.
///
/// Pushes and pops on a `HeadMut` interleave with vector pushes and pops on the parent
/// coder in the usual stack order.
#[derive(Debug)]
pub struct HeadMut<'a, Word, State> {
    state: &'a mut State,
    bulk: &'a mut Vec<Word>,
}

impl<'a, Word, State> Message for HeadMut<'a, Word, State>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    type Word = Word;
    type Interval = Interval<Word>;
    type CumFreq = Word;

    #[inline]
    fn push(&mut self, interval: &Interval<Word>, precision: Precision) -> Result<()> {
        push_onto(self.state, self.bulk, *interval, precision)
    }

    #[inline]
    fn peek(&self, precision: Precision) -> Result<Word> {
        peek_at::<Word, State>(*self.state, precision)
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
        *self.state = unfold(*self.state, *cum_freq, *interval, precision);
        refill(self.state, self.bulk)
    }
}

/// Restores the invariant on `head` after a pop.
///
/// Unlike a scalar [`AnsCoder`](super::stack::AnsCoder), a head never runs dry
/// legitimately, so an empty stack at this point means the data is corrupted.
#[inline]
fn refill<Word, State>(head: &mut State, bulk: &mut Vec<Word>) -> Result<()>
where
    Word: BitArray + Into<State>,
    State: BitArray + AsPrimitive<Word>,
{
    if *head < lower_bound::<Word, State>() {
        let word = bulk.pop().ok_or(Error::CorruptedData(
            "ran out of compressed words while refilling a register",
        ))?;
        *head = (*head << Word::BITS) | word.into();
    }
    Ok(())
}
