//! Escape coding for values outside of a row's modeled range
//!
//! Every CDF row models the shifted values `0..max_value`, and reserves its last bin
//! (`max_value`) as the *escape bin*. A shifted value `v` outside of `0..max_value` is
//! clamped to the escape bin, and the information lost by clamping is coded separately as
//! a non-negative *overflow* integer:
//!
//! - `overflow = -2v - 1` if `v < 0` (odd overflows), and
//! - `overflow = 2(v - max_value)` if `v >= max_value` (even overflows).
//!
//! The overflow is written with a small uniform alphabet of `2^width` digits as an
//! *escape payload*. In decode order, the payload consists of the digit count `k`, written
//! as a run of maximal digits `2^width - 1` followed by the remainder, and then the `k`
//! digits of the overflow, least significant first. Since the coders are stacks, the
//! payload is pushed in reverse.

use smallvec::SmallVec;

use crate::{
    stream::{codec::SymbolCodec, Interval, Message},
    Error, IntervalLookup, Precision, Result, SymbolLookup,
};

/// Digits of an escape payload, in decode order.
pub type Payload = SmallVec<[u32; 16]>;

/// Splits a shifted value into the bin that gets coded with the row's model and, if that
/// bin is the escape bin, the overflow.
///
/// Note that `shifted == max_value` also maps to the escape bin (with overflow zero).
#[inline]
pub fn clamp(shifted: i64, max_value: usize) -> (usize, Option<u64>) {
    let max = max_value as i64;
    if shifted < 0 {
        (max_value, Some((-2 * shifted - 1) as u64))
    } else if shifted >= max {
        (max_value, Some(2 * (shifted - max) as u64))
    } else {
        (shifted as usize, None)
    }
}

/// Inverse of [`clamp`] for values that ended up in the escape bin.
#[inline]
pub fn unclamp(overflow: u64, max_value: usize) -> i64 {
    let magnitude = (overflow >> 1) as i64;
    if overflow & 1 == 1 {
        -magnitude - 1
    } else {
        magnitude.saturating_add(max_value as i64)
    }
}

/// The uniform distribution over the digits `0..2^width` at precision `width`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformDigits {
    width: u32,
}

impl IntervalLookup for UniformDigits {
    type Symbol = u32;
    type Interval = Interval<u32>;

    #[inline]
    fn interval_of(&self, &digit: &u32) -> Result<Interval<u32>> {
        if digit >> self.width != 0 {
            return Err(Error::CorruptedData("escape digit out of range"));
        }
        Ok(Interval::new(digit, 1))
    }
}

impl SymbolLookup for UniformDigits {
    type Symbol = u32;
    type CumFreq = u32;

    #[inline(always)]
    fn symbol_of(&self, &cum_freq: &u32) -> Result<u32> {
        Ok(cum_freq)
    }
}

/// Codes escape payloads on any scalar message with 32-bit words.
#[derive(Debug, Clone, Copy)]
pub struct EscapeCodec {
    codec: SymbolCodec<UniformDigits, UniformDigits>,
    width: u32,
}

impl EscapeCodec {
    pub const MAX_WIDTH: u32 = 16;

    /// Creates a codec for digits with `width` bits, `width` in `1..=16`.
    pub fn new(width: u32) -> Result<Self> {
        if width == 0 || width > Self::MAX_WIDTH {
            return Err(Error::InvalidOverflowWidth(width));
        }
        let digits = UniformDigits { width };
        Ok(Self {
            codec: SymbolCodec::new(digits, digits, Precision::new(width)?),
            width,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline(always)]
    fn max_digit(&self) -> u32 {
        (1 << self.width) - 1
    }

    /// Largest digit count that can describe an overflow that fits into a `u64`.
    #[inline(always)]
    fn max_digit_count(&self) -> usize {
        ((u64::BITS + self.width - 1) / self.width) as usize
    }

    /// Returns the escape payload for `overflow`, in decode order.
    pub fn payload(&self, overflow: u64) -> Payload {
        let mask = u64::from(self.max_digit());
        let count = (u64::BITS - overflow.leading_zeros() + self.width - 1) / self.width;

        let mut payload = Payload::new();
        let mut remaining = count;
        while remaining >= self.max_digit() {
            payload.push(self.max_digit());
            remaining -= self.max_digit();
        }
        payload.push(remaining);
        payload.extend((0..count).map(|j| ((overflow >> (j * self.width)) & mask) as u32));
        payload
    }

    /// Pushes the escape payload for `overflow` so that [`pop`](Self::pop) recovers it.
    pub fn push<M>(&self, message: &mut M, overflow: u64) -> Result<()>
    where
        M: Message<Interval = Interval<u32>>,
    {
        for digit in self.payload(overflow).iter().rev() {
            self.codec.push(message, digit)?;
        }
        Ok(())
    }

    /// Pops an escape payload and returns the overflow it describes.
    pub fn pop<M>(&self, message: &mut M) -> Result<u64>
    where
        M: Message<Interval = Interval<u32>, CumFreq = u32>,
    {
        let mut count = 0usize;
        loop {
            let digit = self.codec.pop(message)?;
            count += digit as usize;
            if count > self.max_digit_count() {
                return Err(Error::CorruptedData("escape payload is too long"));
            }
            if digit != self.max_digit() {
                break;
            }
        }

        let mut overflow = 0u128;
        for j in 0..count {
            let digit = self.codec.pop(message)?;
            overflow |= u128::from(digit) << (j as u32 * self.width);
        }
        u64::try_from(overflow).map_err(|_| Error::CorruptedData("escape overflow exceeds 64 bits"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::stack::DefaultAnsCoder;

    #[test]
    fn clamps_at_both_boundaries() {
        assert_eq!(clamp(-1, 10), (10, Some(1)));
        assert_eq!(clamp(0, 10), (0, None));
        assert_eq!(clamp(9, 10), (9, None));
        assert_eq!(clamp(10, 10), (10, Some(0)));
        assert_eq!(clamp(11, 10), (10, Some(2)));
        assert_eq!(clamp(-5, 0), (0, Some(9)));

        for shifted in [-1, 10, 11, -1000, 1 << 33, -(1 << 33)] {
            let (bin, overflow) = clamp(shifted, 10);
            assert_eq!(bin, 10);
            assert_eq!(unclamp(overflow.unwrap(), 10), shifted);
        }
    }

    #[test]
    fn payload_layout() {
        let codec = EscapeCodec::new(4).unwrap();
        assert_eq!(codec.payload(0).as_slice(), &[0]);
        assert_eq!(codec.payload(1).as_slice(), &[1, 1]);
        assert_eq!(codec.payload(0x1f).as_slice(), &[2, 0xf, 0x1]);

        // 64 bits need 16 digits, which takes a run of one maximal digit plus 1.
        let payload = codec.payload(u64::MAX);
        assert_eq!(&payload[..2], &[15, 1]);
        assert_eq!(payload.len(), 18);
        assert!(payload[2..].iter().all(|&digit| digit == 15));

        let narrow = EscapeCodec::new(1).unwrap();
        assert_eq!(narrow.payload(0b110).as_slice(), &[1, 1, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn rejects_invalid_width() {
        assert!(matches!(
            EscapeCodec::new(0),
            Err(Error::InvalidOverflowWidth(0))
        ));
        assert!(EscapeCodec::new(17).is_err());
        assert!(EscapeCodec::new(16).is_ok());
    }

    #[test]
    fn round_trip() {
        let overflows = [0u64, 1, 2, 14, 15, 16, 255, 256, 1 << 20, u32::MAX as u64, u64::MAX];
        for width in [1, 2, 3, 4, 7, 16] {
            let codec = EscapeCodec::new(width).unwrap();
            let mut ans = DefaultAnsCoder::new();
            for &overflow in overflows.iter().rev() {
                codec.push(&mut ans, overflow).unwrap();
            }

            let mut ans = DefaultAnsCoder::from_compressed(ans.into_compressed()).unwrap();
            for &overflow in &overflows {
                assert_eq!(codec.pop(&mut ans).unwrap(), overflow);
            }
            assert!(ans.is_empty());
        }
    }
}
