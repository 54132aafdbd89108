//! Stream coding on a stack ("last in first out")
//!
//! This module provides the coder state ("message") that all higher layers thread through
//! their push and pop calls:
//!
//! - [`stack::AnsCoder`] keeps a single rANS register and a stack of compressed words;
//! - [`lanes::LaneAnsCoder`] keeps one register per element of a coding shape and a
//!   single stack of compressed words shared by all registers.
//!
//! Both implement the [`Message`] trait, which is what the generic [`SymbolCodec`] in
//! the [`codec`] submodule is written against.
//!
//! # Push and Pop
//!
//! Pushing (encoding) folds a half-open interval `[start, start + freq)` of cumulative
//! frequencies, out of a total mass of `2^precision`, into the coder's register. Popping
//! (decoding) happens in two phases because the caller has to look up which symbol the
//! register currently points to before the pop can be completed:
//!
//! 1. [`Message::pop`] returns a [`PendingPop`] that exposes the peeked
//!    [`cum_freq`](PendingPop::cum_freq) without modifying the message;
//! 2. [`PendingPop::finish`] takes the interval of the resolved symbol, verifies that it
//!    contains `cum_freq`, and completes the pop.
//!
//! The `PendingPop` holds a mutable borrow of the message, so no other push or pop can
//! sneak in between the two phases.
//!
//! Since the coders are stacks, symbols have to be pushed in reverse order of how they
//! will be popped. Interleaving pushes and pops that belong to different logical symbols
//! corrupts the stream in a way that can't be detected.
//!
//! [`SymbolCodec`]: codec::SymbolCodec

pub mod codec;
pub mod lanes;
pub mod stack;

use core::fmt::Debug;

use crate::{BitArray, Error, Precision, Result};

/// A half-open interval `[start, start + freq)` of cumulative frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval<Word> {
    pub start: Word,
    pub freq: Word,
}

impl<Word: BitArray> Interval<Word> {
    #[inline(always)]
    pub fn new(start: Word, freq: Word) -> Self {
        Self { start, freq }
    }

    /// Checks that `cum_freq` lies within the interval.
    #[inline]
    pub fn verify_contains(&self, cum_freq: Word) -> Result<()> {
        if self.start <= cum_freq && cum_freq - self.start < self.freq {
            Ok(())
        } else {
            Err(Error::InconsistentModel {
                cum_freq: cum_freq.as_(),
                start: self.start.as_(),
                freq: self.freq.as_(),
            })
        }
    }

    /// Checks that the interval is nonempty and fits into a total mass of
    /// `2^precision`.
    pub(crate) fn validate(&self, precision: Precision) -> Result<()> {
        let start: u64 = self.start.as_();
        let freq: u64 = self.freq.as_();
        let fits = start
            .checked_add(freq)
            .map_or(false, |end| end <= 1u64 << precision.bits());
        if freq == 0 || !fits {
            return Err(Error::InvalidInterval {
                start,
                freq,
                precision: precision.bits(),
            });
        }
        Ok(())
    }
}

/// A live coder state that supports push and (two-phase) pop operations.
///
/// Implemented by [`stack::AnsCoder`], by [`lanes::LaneAnsCoder`], and by
/// [`lanes::HeadMut`], which exposes a single register of a `LaneAnsCoder` as a scalar
/// message.
pub trait Message {
    /// The smallest unit of compressed data.
    type Word: BitArray;

    /// What a single push consumes and a pop completes with.
    type Interval: Debug;

    /// What the first phase of a pop peeks at.
    type CumFreq: Debug;

    /// Folds `interval` into the message.
    fn push(&mut self, interval: &Self::Interval, precision: Precision) -> Result<()>;

    /// Returns the cumulative frequency (or frequencies) that the message currently
    /// points to, without modifying the message.
    fn peek(&self, precision: Precision) -> Result<Self::CumFreq>;

    /// Checks that `interval` contains `cum_freq`.
    fn verify(interval: &Self::Interval, cum_freq: &Self::CumFreq) -> Result<()>;

    /// Completes a pop that was started by [`peek`](Self::peek).
    ///
    /// Callers must have verified `interval` against `cum_freq` first; use
    /// [`pop`](Self::pop) instead, which enforces this.
    fn complete_pop(
        &mut self,
        cum_freq: &Self::CumFreq,
        interval: &Self::Interval,
        precision: Precision,
    ) -> Result<()>;

    /// Starts a two-phase pop.
    fn pop(&mut self, precision: Precision) -> Result<PendingPop<'_, Self>>
    where
        Self: Sized,
    {
        let cum_freq = self.peek(precision)?;
        Ok(PendingPop {
            message: self,
            cum_freq,
            precision,
        })
    }
}

/// The intermediate result of a pop whose symbol hasn't been resolved yet.
///
/// See [module level documentation](self).
#[derive(Debug)]
#[must_use = "a pending pop leaves the message unchanged unless it is finished"]
pub struct PendingPop<'a, M: Message> {
    message: &'a mut M,
    cum_freq: M::CumFreq,
    precision: Precision,
}

impl<'a, M: Message> PendingPop<'a, M> {
    /// The peeked cumulative frequency (or frequencies), in `[0, 2^precision)`.
    #[inline(always)]
    pub fn cum_freq(&self) -> &M::CumFreq {
        &self.cum_freq
    }

    #[inline(always)]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Completes the pop with the interval of the symbol that `cum_freq` resolved to.
    ///
    /// Returns [`Error::InconsistentModel`] if `interval` doesn't contain `cum_freq`.
    pub fn finish(self, interval: &M::Interval) -> Result<()> {
        M::verify(interval, &self.cum_freq)?;
        self.message
            .complete_pop(&self.cum_freq, interval, self.precision)
    }
}

/// Serializes compressed words in little endian byte order.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Inverse of [`words_to_bytes`].
pub fn bytes_to_words(bytes: &[u8]) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::CorruptedData(
            "byte length is not a multiple of the word size",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_round_trip() {
        let words = vec![0x0123_4567u32, 0x89ab_cdef, 0, 1];
        let bytes = words_to_bytes(&words);
        assert_eq!(&bytes[..4], &[0x67, 0x45, 0x23, 0x01]);
        assert_eq!(bytes_to_words(&bytes).unwrap(), words);
        assert!(bytes_to_words(&bytes[..5]).is_err());
    }

    #[test]
    fn interval_checks() {
        let precision = Precision::new(8).unwrap();
        let interval = Interval::new(10u32, 5);
        assert!(interval.validate(precision).is_ok());
        assert!(interval.verify_contains(10).is_ok());
        assert!(interval.verify_contains(14).is_ok());
        assert!(matches!(
            interval.verify_contains(15),
            Err(Error::InconsistentModel { cum_freq: 15, .. })
        ));
        assert!(interval.verify_contains(9).is_err());

        assert!(Interval::new(250u32, 6).validate(precision).is_ok());
        assert!(Interval::new(250u32, 7).validate(precision).is_err());
        assert!(Interval::new(3u32, 0).validate(precision).is_err());
    }
}
