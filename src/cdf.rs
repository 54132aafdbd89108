//! Tables of cumulative distribution functions and lookups into their rows
//!
//! A [`CdfTable`] holds a fixed set of quantized entropy models, one per row. Every
//! symbol of a tensor is coded with the row that the parallel index tensor selects for
//! it. The lookups that the [`SymbolCodec`](crate::SymbolCodec) needs are implemented
//! by [`CdfRow`] for a single symbol and by [`LaneCdf`] for a whole lane of symbols,
//! each element of which may use a row with a different length.
//!
//! # Row Layout
//!
//! A row with length `n` has the entries `cdf[0] = 0 <= cdf[1] <= ... <= cdf[n - 1] =
//! 2^precision`. It describes `n - 1` bins, where bin `i` occupies the interval
//! `[cdf[i], cdf[i + 1])`. The first `n - 2` bins model the shifted values `0..n - 2`
//! and the last bin (`max_value = n - 2`) is the escape bin (see [`crate::escape`]).
//! Entries of a row beyond its length are ignored.

use ndarray::{Array1, Array2};

use crate::{
    stream::Interval, Error, IntervalLookup, Precision, Result, SymbolLookup,
};

/// A validated table of CDF rows with per-row lengths and offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdfTable {
    /// Row-major, `rows * width` entries.
    entries: Vec<u32>,
    width: usize,
    lengths: Vec<usize>,
    offsets: Vec<i32>,
    precision: Precision,
}

impl CdfTable {
    /// Validates the table and takes ownership of it.
    ///
    /// Returns an error if `lengths` or `offsets` doesn't have one entry per row of
    /// `cdf`, or if any row violates `1 < length <= width`, `row[0] == 0`,
    /// `row[length - 1] == 2^precision`, or monotonicity within its first `length`
    /// entries.
    ///
    /// Emits a `tracing` warning (but succeeds) if the precision is high enough to risk
    /// accuracy loss in the coders, see [`Precision::risks_accuracy`].
    pub fn new(
        cdf: Array2<u32>,
        lengths: Array1<u32>,
        offsets: Array1<i32>,
        precision: Precision,
    ) -> Result<Self> {
        let (rows, width) = cdf.dim();
        if lengths.len() != rows || offsets.len() != rows {
            return Err(Error::ShapeMismatch {
                expected: vec![rows, rows],
                actual: vec![lengths.len(), offsets.len()],
            });
        }

        let total = precision.total_mass();
        let lengths = lengths.iter().map(|&l| l as usize).collect::<Vec<_>>();
        for ((index, row), &length) in cdf.outer_iter().enumerate().zip(&lengths) {
            if length < 2 || length > width {
                return Err(Error::InvalidCdf(format!(
                    "row {index} has length {length}, expected 2..={width}"
                )));
            }
            let row = row.slice(ndarray::s![..length]);
            if row[0] != 0 || row[length - 1] != total {
                return Err(Error::InvalidCdf(format!(
                    "row {index} must start at 0 and end at {total}, got {} and {}",
                    row[0],
                    row[length - 1]
                )));
            }
            if row.windows(2).into_iter().any(|pair| pair[0] > pair[1]) {
                return Err(Error::InvalidCdf(format!("row {index} is not monotonic")));
            }
        }

        if precision.risks_accuracy() {
            tracing::warn!(
                precision = precision.bits(),
                threshold = Precision::ACCURACY_RISK_BITS,
                "CDF precision is at or above the accuracy threshold; \
                 coding may lose representable accuracy"
            );
        }

        Ok(Self {
            entries: cdf.iter().copied().collect(),
            width,
            lengths,
            offsets: offsets.to_vec(),
            precision,
        })
    }

    pub fn rows(&self) -> usize {
        self.lengths.len()
    }

    /// Number of columns of the table, i.e., the largest possible row length.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    /// Selects the row that codes the symbol at flat `position`.
    ///
    /// The position is only used for error reporting.
    pub fn row(&self, position: usize, index: i32) -> Result<CdfRow<'_>> {
        let row = usize::try_from(index)
            .ok()
            .filter(|&row| row < self.rows())
            .ok_or(Error::IndexOutOfRange {
                position,
                index: index.into(),
                rows: self.rows(),
            })?;

        let length = self.lengths[row];
        if length < 2 || length > self.width {
            return Err(Error::InvalidMaxValue {
                position,
                max_value: length as i64 - 2,
                width: self.width,
            });
        }

        let start = row * self.width;
        Ok(CdfRow {
            cdf: &self.entries[start..start + length],
            offset: self.offsets[row],
            position,
            precision: self.precision,
        })
    }

    /// Selects one row per element of a lane whose first element sits at flat
    /// position `first_position`.
    pub fn lane<'a>(
        &'a self,
        first_position: usize,
        indices: impl IntoIterator<Item = i32>,
    ) -> Result<LaneCdf<'a>> {
        let rows = indices
            .into_iter()
            .enumerate()
            .map(|(i, index)| self.row(first_position + i, index))
            .collect::<Result<Vec<_>>>()?;
        Ok(LaneCdf { rows })
    }
}

/// A single row of a [`CdfTable`], restricted to its first `length` entries.
///
/// Symbols of this lookup are bin indices in `0..length - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdfRow<'a> {
    cdf: &'a [u32],
    offset: i32,
    position: usize,
    precision: Precision,
}

impl<'a> CdfRow<'a> {
    /// Index of the escape bin, i.e., `length - 2`.
    #[inline(always)]
    pub fn max_value(&self) -> usize {
        self.cdf.len() - 2
    }

    #[inline(always)]
    pub fn length(&self) -> usize {
        self.cdf.len()
    }

    #[inline(always)]
    pub fn offset(&self) -> i32 {
        self.offset
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline(always)]
    pub fn entries(&self) -> &'a [u32] {
        self.cdf
    }
}

impl IntervalLookup for CdfRow<'_> {
    type Symbol = usize;
    type Interval = Interval<u32>;

    fn interval_of(&self, &bin: &usize) -> Result<Interval<u32>> {
        if bin + 1 >= self.cdf.len() {
            return Err(Error::InvalidShiftedValue {
                position: self.position,
                value: bin as i64,
                length: self.cdf.len(),
            });
        }
        let start = self.cdf[bin];
        let interval = Interval::new(start, self.cdf[bin + 1] - start);
        interval.validate(self.precision)?;
        Ok(interval)
    }
}

impl SymbolLookup for CdfRow<'_> {
    type Symbol = usize;
    type CumFreq = u32;

    fn symbol_of(&self, &cum_freq: &u32) -> Result<usize> {
        // Search for the rightmost entry that is `<= cum_freq`. The last entry is the
        // total mass, which is always larger than a valid `cum_freq`, so we exclude it.
        let monotonic_part = &self.cdf[..self.cdf.len() - 1];
        let next_bin = monotonic_part.partition_point(|&x| x <= cum_freq);
        // `next_bin > 0` because `cdf[0] == 0`.
        Ok(next_bin.saturating_sub(1))
    }
}

/// One [`CdfRow`] per element of a lane.
///
/// Rows may have different lengths; every lookup is restricted to its own row's
/// entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneCdf<'a> {
    rows: Vec<CdfRow<'a>>,
}

impl<'a> LaneCdf<'a> {
    pub fn rows(&self) -> &[CdfRow<'a>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntervalLookup for LaneCdf<'_> {
    type Symbol = Vec<usize>;
    type Interval = Vec<Interval<u32>>;

    fn interval_of(&self, bins: &Vec<usize>) -> Result<Vec<Interval<u32>>> {
        check_lane_len(self.rows.len(), bins.len())?;
        self.rows
            .iter()
            .zip(bins)
            .map(|(row, bin)| row.interval_of(bin))
            .collect()
    }
}

impl SymbolLookup for LaneCdf<'_> {
    type Symbol = Vec<usize>;
    type CumFreq = Vec<u32>;

    fn symbol_of(&self, cum_freqs: &Vec<u32>) -> Result<Vec<usize>> {
        check_lane_len(self.rows.len(), cum_freqs.len())?;
        self.rows
            .iter()
            .zip(cum_freqs)
            .map(|(row, cum_freq)| row.symbol_of(cum_freq))
            .collect()
    }
}

fn check_lane_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch {
            expected: vec![expected],
            actual: vec![actual],
        });
    }
    Ok(())
}
