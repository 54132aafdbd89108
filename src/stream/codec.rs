//! Symbol codecs built from pluggable lookup strategies
//!
//! A [`SymbolCodec`] turns symbols into intervals (for pushing) and cumulative
//! frequencies back into symbols (for popping). It is generic over how these lookups are
//! done, which is described by the traits [`IntervalLookup`] and [`SymbolLookup`], and
//! over the kind of [`Message`] that it operates on. This keeps the codec decoupled from
//! the representation of the entropy model: the same codec type works for a single row
//! of a [`CdfTable`](crate::CdfTable) on a scalar coder and for a whole lane of rows on a
//! [`LaneAnsCoder`](super::lanes::LaneAnsCoder).
//!
//! On every pop, the codec re-derives the interval of the symbol that `symbol_of`
//! returned and verifies that it contains the peeked cumulative frequency. A failed
//! check means that the two lookups disagree with each other, and the pop fails with
//! [`Error::InconsistentModel`](crate::Error::InconsistentModel).
//!
//! The check cannot tell whether a model is the one the data was encoded with. Popping
//! with a different but internally consistent model passes it and yields different
//! symbols.

use super::Message;
use crate::{Precision, Result};

/// Maps a symbol to the interval it occupies.
pub trait IntervalLookup {
    type Symbol;
    type Interval;

    fn interval_of(&self, symbol: &Self::Symbol) -> Result<Self::Interval>;
}

/// Maps a cumulative frequency to the symbol whose interval contains it.
pub trait SymbolLookup {
    type Symbol;
    type CumFreq;

    fn symbol_of(&self, cum_freq: &Self::CumFreq) -> Result<Self::Symbol>;
}

impl<T: IntervalLookup + ?Sized> IntervalLookup for &T {
    type Symbol = T::Symbol;
    type Interval = T::Interval;

    #[inline(always)]
    fn interval_of(&self, symbol: &Self::Symbol) -> Result<Self::Interval> {
        (*self).interval_of(symbol)
    }
}

impl<T: SymbolLookup + ?Sized> SymbolLookup for &T {
    type Symbol = T::Symbol;
    type CumFreq = T::CumFreq;

    #[inline(always)]
    fn symbol_of(&self, cum_freq: &Self::CumFreq) -> Result<Self::Symbol> {
        (*self).symbol_of(cum_freq)
    }
}

/// A codec for symbols of type `I::Symbol` with a fixed precision.
///
/// # Example
///
/// ```
/// use indexed_ans::{
///     stream::{stack::DefaultAnsCoder, Interval},
///     IntervalLookup, Precision, Result, SymbolCodec, SymbolLookup,
/// };
///
/// /// Three equally likely symbols `'a'`, `'b'`, `'c'`, with a total mass of `2^8`.
/// struct Abc;
///
/// impl IntervalLookup for Abc {
///     type Symbol = char;
///     type Interval = Interval<u32>;
///
///     fn interval_of(&self, symbol: &char) -> Result<Interval<u32>> {
///         let index = *symbol as u32 - 'a' as u32;
///         Ok(Interval::new(index * 85, if index == 2 { 86 } else { 85 }))
///     }
/// }
///
/// impl SymbolLookup for Abc {
///     type Symbol = char;
///     type CumFreq = u32;
///
///     fn symbol_of(&self, cum_freq: &u32) -> Result<char> {
///         Ok(['a', 'b', 'c'][(*cum_freq / 85).min(2) as usize])
///     }
/// }
///
/// let codec = SymbolCodec::new(Abc, Abc, Precision::new(8)?);
/// let mut ans = DefaultAnsCoder::new();
/// for symbol in "cab".chars().rev() {
///     codec.push(&mut ans, &symbol)?;
/// }
///
/// let decoded = (0..3).map(|_| codec.pop(&mut ans)).collect::<Result<String>>()?;
/// assert_eq!(decoded, "cab");
/// # Ok::<(), indexed_ans::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SymbolCodec<I, S> {
    interval_lookup: I,
    symbol_lookup: S,
    precision: Precision,
}

impl<I, S> SymbolCodec<I, S>
where
    I: IntervalLookup,
    S: SymbolLookup<Symbol = I::Symbol>,
{
    pub fn new(interval_lookup: I, symbol_lookup: S, precision: Precision) -> Self {
        Self {
            interval_lookup,
            symbol_lookup,
            precision,
        }
    }

    #[inline(always)]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Looks up the interval of `symbol` and pushes it onto `message`.
    #[inline]
    pub fn push<M>(&self, message: &mut M, symbol: &I::Symbol) -> Result<()>
    where
        M: Message<Interval = I::Interval>,
    {
        let interval = self.interval_lookup.interval_of(symbol)?;
        message.push(&interval, self.precision)
    }

    /// Pops a symbol from `message` and checks that both lookups agree on it.
    #[inline]
    pub fn pop<M>(&self, message: &mut M) -> Result<I::Symbol>
    where
        M: Message<Interval = I::Interval, CumFreq = S::CumFreq>,
    {
        let pending = message.pop(self.precision)?;
        let symbol = self.symbol_lookup.symbol_of(pending.cum_freq())?;
        let interval = self.interval_lookup.interval_of(&symbol)?;
        pending.finish(&interval)?;
        Ok(symbol)
    }
}
