//! Lane by lane coding with one register per lane element.
//!
//! The leading axis of the symbol tensor enumerates lanes. A tensor with a single lane
//! must have shape `(1, C, H, W)` and is split into patches of
//! [`CodingOptions::patch_size`] first, see [`crate::patch`]. Every lane is then coded
//! with a single vector push on a [`LaneAnsCoder`](crate::stream::lanes::LaneAnsCoder)
//! whose coding shape is the lane shape.
//!
//! Escape payloads of a lane are coded on the registers of the escaped elements, below
//! the lane's vector of bins. On decode, a lane's bins are popped first and its escape
//! payloads are popped afterwards in element order.

use ndarray::{ArrayD, ArrayViewD, Axis, Ix4};

use super::{check_same_shape, to_symbol, CodingShape, Encoded};
use crate::{
    escape,
    patch::{self, UnfoldedShape},
    stream::lanes::{DefaultLaneAnsCoder, HeadMut},
    CdfTable, CodingOptions, Error, Result, SymbolCodec,
};

/// Encodes `symbols` lane by lane, coding each one with the row of `table` that the entry
/// of `indices` at the same position selects.
///
/// Returns the compressed data together with the lane shape, which has to be passed to
/// [`decode`].
pub fn encode(
    symbols: ArrayViewD<'_, i32>,
    indices: ArrayViewD<'_, i32>,
    table: &CdfTable,
    options: &CodingOptions,
) -> Result<Encoded> {
    options.validate()?;
    check_same_shape(&symbols, &indices)?;
    let escape_codec = options.escape_codec()?;

    let (symbols, _) = into_lanes(symbols, options)?;
    let (indices, _) = into_lanes(indices, options)?;
    let coding_shape = CodingShape::from_slice(&symbols.shape()[1..]);
    let lane_len = coding_shape.iter().product::<usize>();
    let num_lanes = symbols.len_of(Axis(0));

    let mut coder = DefaultLaneAnsCoder::new(&coding_shape);
    let mut num_escapes = 0usize;

    for lane in (0..num_lanes).rev() {
        let lane_symbols = symbols.index_axis(Axis(0), lane);
        let lane_cdf = table.lane(
            lane * lane_len,
            indices.index_axis(Axis(0), lane).iter().copied(),
        )?;

        let (bins, overflows): (Vec<_>, Vec<_>) = lane_symbols
            .iter()
            .zip(lane_cdf.rows())
            .map(|(&symbol, row)| {
                let shifted = i64::from(symbol) - i64::from(row.offset());
                escape::clamp(shifted, row.max_value())
            })
            .unzip();

        for (element, overflow) in overflows.into_iter().enumerate().rev() {
            if let Some(overflow) = overflow {
                escape_codec.push(&mut head(&mut coder, element)?, overflow)?;
                num_escapes += 1;
            }
        }
        SymbolCodec::new(&lane_cdf, &lane_cdf, table.precision()).push(&mut coder, &bins)?;
    }

    let compressed = coder.into_compressed();
    tracing::debug!(
        lanes = num_lanes,
        ?coding_shape,
        escapes = num_escapes,
        words = compressed.len(),
        "encoded tensor lane by lane"
    );
    Ok(Encoded {
        compressed,
        coding_shape,
    })
}

/// Decodes data produced by [`encode`] with the same `indices`, `table`, and `options`.
///
/// `coding_shape` is the lane shape returned by [`encode`]. It must agree with the lanes
/// that `indices` splits into. As with [`scalar::decode`](super::scalar::decode), a
/// mismatching `table` is not reliably detected.
pub fn decode(
    compressed: &[u32],
    indices: ArrayViewD<'_, i32>,
    table: &CdfTable,
    coding_shape: &[usize],
    options: &CodingOptions,
) -> Result<ArrayD<i32>> {
    options.validate()?;
    let escape_codec = options.escape_codec()?;

    let (indices, unfolded) = into_lanes(indices, options)?;
    if &indices.shape()[1..] != coding_shape {
        return Err(Error::ShapeMismatch {
            expected: coding_shape.to_vec(),
            actual: indices.shape()[1..].to_vec(),
        });
    }
    let lane_len = coding_shape.iter().product::<usize>();
    let num_lanes = indices.len_of(Axis(0));

    let mut coder = DefaultLaneAnsCoder::from_compressed(compressed.to_vec(), coding_shape)?;
    let mut symbols = Vec::with_capacity(indices.len());

    for lane in 0..num_lanes {
        let lane_cdf = table.lane(
            lane * lane_len,
            indices.index_axis(Axis(0), lane).iter().copied(),
        )?;
        let bins = SymbolCodec::new(&lane_cdf, &lane_cdf, table.precision()).pop(&mut coder)?;

        for (element, (bin, row)) in bins.into_iter().zip(lane_cdf.rows()).enumerate() {
            let shifted = if bin == row.max_value() {
                let overflow = escape_codec.pop(&mut head(&mut coder, element)?)?;
                escape::unclamp(overflow, row.max_value())
            } else {
                bin as i64
            };
            symbols.push(to_symbol(row.position(), shifted, row.offset())?);
        }
    }

    if !coder.is_drained() {
        return Err(Error::CorruptedData(
            "compressed data left over after decoding all lanes",
        ));
    }

    let lanes = ArrayD::from_shape_vec(indices.raw_dim(), symbols).map_err(|_| {
        Error::ShapeMismatch {
            expected: indices.shape().to_vec(),
            actual: vec![num_lanes * lane_len],
        }
    })?;
    from_lanes(lanes, unfolded)
}

/// Returns `x` with lanes along its leading axis, decomposing it into patches if it
/// has only a single lane.
fn into_lanes(
    x: ArrayViewD<'_, i32>,
    options: &CodingOptions,
) -> Result<(ArrayD<i32>, Option<UnfoldedShape>)> {
    if x.ndim() == 0 {
        return Err(Error::ShapeMismatch {
            expected: vec![1],
            actual: Vec::new(),
        });
    }
    if x.len_of(Axis(0)) != 1 {
        return Ok((x.to_owned(), None));
    }

    let shape = x.shape().to_vec();
    let x = x
        .into_dimensionality::<Ix4>()
        .map_err(|_| Error::PatchMismatch {
            shape,
            patch_size: options.patch_size,
        })?;
    let (lanes, unfolded) = patch::decompose(x, options.patch_size)?;
    Ok((lanes.into_dyn(), Some(unfolded)))
}

fn from_lanes(lanes: ArrayD<i32>, unfolded: Option<UnfoldedShape>) -> Result<ArrayD<i32>> {
    let Some(unfolded) = unfolded else {
        return Ok(lanes);
    };
    let shape = lanes.shape().to_vec();
    let lanes = lanes
        .into_dimensionality::<Ix4>()
        .map_err(|_| Error::ShapeMismatch {
            expected: unfolded.lane_shape().to_vec(),
            actual: shape,
        })?;
    Ok(patch::reconstitute(lanes.view(), &unfolded)?.into_dyn())
}

fn head(coder: &mut DefaultLaneAnsCoder, element: usize) -> Result<HeadMut<'_, u32, u64>> {
    let len = coder.len();
    coder.head(element).ok_or(Error::ShapeMismatch {
        expected: vec![len],
        actual: vec![element + 1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{Array, Array4, IxDyn};

    use crate::Precision;

    fn two_row_table() -> CdfTable {
        CdfTable::new(
            ndarray::array![[0, 10, 100, 200, 256], [0, 128, 256, 0, 0]],
            ndarray::array![5, 3],
            ndarray::array![-1, 0],
            Precision::new(8).unwrap(),
        )
        .unwrap()
    }

    fn round_trip(symbols: &ArrayD<i32>, indices: &ArrayD<i32>, options: &CodingOptions) {
        let table = two_row_table();
        let encoded = encode(symbols.view(), indices.view(), &table, options).unwrap();
        let decoded = decode(
            &encoded.compressed,
            indices.view(),
            &table,
            &encoded.coding_shape,
            options,
        )
        .unwrap();
        assert_eq!(&decoded, symbols);
    }

    #[test]
    fn batched_lanes() {
        let symbols = Array::from_shape_fn((3, 2, 5), |(b, c, w)| (b + c + w) as i32 - 2).into_dyn();
        let indices = Array::from_shape_fn((3, 2, 5), |(_, c, w)| ((c + w) % 2) as i32).into_dyn();
        let options = CodingOptions::default();

        let encoded = encode(symbols.view(), indices.view(), &two_row_table(), &options).unwrap();
        assert_eq!(encoded.coding_shape.as_slice(), &[2, 5]);
        round_trip(&symbols, &indices, &options);
    }

    #[test]
    fn single_lane_is_patched() {
        let symbols = Array4::from_shape_fn((1, 2, 8, 4), |(_, c, h, w)| {
            (c * 7 + h * 3 + w) as i32 % 5 - 1
        })
        .into_dyn();
        let indices = ArrayD::<i32>::zeros(IxDyn(&[1, 2, 8, 4]));
        let options = CodingOptions::default();

        let encoded = encode(symbols.view(), indices.view(), &two_row_table(), &options).unwrap();
        assert_eq!(encoded.coding_shape.as_slice(), &[2, 4, 4]);
        round_trip(&symbols, &indices, &options);
        round_trip(&symbols, &indices, &options.with_patch_size((2, 1)));
    }

    #[test]
    fn single_lane_must_be_divisible() {
        let symbols = ArrayD::<i32>::zeros(IxDyn(&[1, 2, 6, 4]));
        assert!(matches!(
            encode(symbols.view(), symbols.view(), &two_row_table(), &CodingOptions::default()),
            Err(Error::PatchMismatch { .. })
        ));

        let flat = ArrayD::<i32>::zeros(IxDyn(&[1, 16]));
        assert!(matches!(
            encode(flat.view(), flat.view(), &two_row_table(), &CodingOptions::default()),
            Err(Error::PatchMismatch { .. })
        ));
    }

    #[test]
    fn escapes_in_every_element() {
        let symbols = ndarray::array![
            [i32::MIN, -3, 40, i32::MAX],
            [-2, 5, 1_000_000, -1_000_000]
        ]
        .into_dyn();
        let indices = ndarray::array![[0, 1, 0, 1], [1, 0, 1, 0]].into_dyn();
        for overflow_width in [1, 3, 4, 16] {
            round_trip(
                &symbols,
                &indices,
                &CodingOptions::default().with_overflow_width(overflow_width),
            );
        }
    }

    #[test]
    fn rejects_wrong_coding_shape() {
        let table = two_row_table();
        let symbols = ArrayD::<i32>::zeros(IxDyn(&[2, 3]));
        let options = CodingOptions::default();
        let encoded = encode(symbols.view(), symbols.view(), &table, &options).unwrap();
        assert!(matches!(
            decode(&encoded.compressed, symbols.view(), &table, &[4], &options),
            Err(Error::ShapeMismatch { .. })
        ));
    }
}
