//! Symbol by symbol coding on a single register.

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use super::{check_same_shape, to_symbol, Encoded};
use crate::{
    escape,
    stream::stack::DefaultAnsCoder,
    CdfTable, CodingOptions, Error, Result, SymbolCodec,
};

/// Encodes `symbols`, coding each one with the row of `table` that the entry of
/// `indices` at the same position selects.
///
/// Symbols are pushed in reverse (row-major) order so that [`decode`] can recover them
/// in forward order.
pub fn encode(
    symbols: ArrayViewD<'_, i32>,
    indices: ArrayViewD<'_, i32>,
    table: &CdfTable,
    options: &CodingOptions,
) -> Result<Encoded> {
    options.validate()?;
    check_same_shape(&symbols, &indices)?;
    let escape_codec = options.escape_codec()?;

    let pairs = symbols.iter().zip(indices.iter()).collect::<Vec<_>>();
    let mut ans = DefaultAnsCoder::new();
    let mut num_escapes = 0usize;

    for (position, (&symbol, &index)) in pairs.into_iter().enumerate().rev() {
        let row = table.row(position, index)?;
        let shifted = i64::from(symbol) - i64::from(row.offset());
        let (bin, overflow) = escape::clamp(shifted, row.max_value());

        // The payload goes underneath the bin so that it's popped after the bin.
        if let Some(overflow) = overflow {
            escape_codec.push(&mut ans, overflow)?;
            num_escapes += 1;
        }
        SymbolCodec::new(row, row, table.precision()).push(&mut ans, &bin)?;
    }

    let compressed = ans.into_compressed();
    tracing::debug!(
        symbols = symbols.len(),
        escapes = num_escapes,
        words = compressed.len(),
        "encoded tensor symbol by symbol"
    );
    Ok(Encoded {
        compressed,
        coding_shape: symbols.shape().into(),
    })
}

/// Decodes data produced by [`encode`] with the same `indices`, `table`, and `options`.
///
/// `coding_shape` is the one returned by [`encode`] and must agree with the shape of
/// `indices`. A `table` other than the one used for encoding is not reliably detected,
/// see the [module level documentation](super).
pub fn decode(
    compressed: &[u32],
    indices: ArrayViewD<'_, i32>,
    table: &CdfTable,
    coding_shape: &[usize],
    options: &CodingOptions,
) -> Result<ArrayD<i32>> {
    options.validate()?;
    if indices.shape() != coding_shape {
        return Err(Error::ShapeMismatch {
            expected: coding_shape.to_vec(),
            actual: indices.shape().to_vec(),
        });
    }
    let escape_codec = options.escape_codec()?;

    let mut ans = DefaultAnsCoder::from_compressed(compressed.to_vec())?;
    let symbols = indices
        .iter()
        .enumerate()
        .map(|(position, &index)| {
            let row = table.row(position, index)?;
            let bin = SymbolCodec::new(row, row, table.precision()).pop(&mut ans)?;
            let shifted = if bin == row.max_value() {
                escape::unclamp(escape_codec.pop(&mut ans)?, row.max_value())
            } else {
                bin as i64
            };
            to_symbol(position, shifted, row.offset())
        })
        .collect::<Result<Vec<_>>>()?;

    if !ans.is_empty() {
        return Err(Error::CorruptedData(
            "compressed data left over after decoding all symbols",
        ));
    }

    ArrayD::from_shape_vec(IxDyn(coding_shape), symbols).map_err(|_| Error::ShapeMismatch {
        expected: coding_shape.to_vec(),
        actual: indices.shape().to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use ndarray::{array, Array1};

    use crate::Precision;

    /// A single uniform row with three bins (the last one being the escape bin) and
    /// offset 4, so the symbols 4 and 5 are modeled directly.
    fn uniform_row() -> CdfTable {
        CdfTable::new(
            array![[0, 85, 170, 256]],
            array![4],
            array![4],
            Precision::new(8).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn order_is_preserved() {
        let table = uniform_row();
        let symbols = array![5, 2, 9].into_dyn();
        let indices = Array1::<i32>::zeros(3).into_dyn();
        let options = CodingOptions::default();

        let encoded = encode(symbols.view(), indices.view(), &table, &options).unwrap();
        assert_eq!(encoded.coding_shape.as_slice(), &[3]);

        let decoded = decode(
            &encoded.compressed,
            indices.view(),
            &table,
            &encoded.coding_shape,
            &options,
        )
        .unwrap();
        assert_eq!(decoded, symbols);
    }

    #[test]
    fn rejects_mismatched_shapes() {
        let table = uniform_row();
        let options = CodingOptions::default();
        let symbols = array![[4, 5]].into_dyn();

        assert!(matches!(
            encode(symbols.view(), array![0, 0].into_dyn().view(), &table, &options),
            Err(Error::ShapeMismatch { .. })
        ));

        let indices = array![[0, 0]].into_dyn();
        let encoded = encode(symbols.view(), indices.view(), &table, &options).unwrap();
        assert!(matches!(
            decode(&encoded.compressed, indices.view(), &table, &[2, 1], &options),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn rejects_invalid_indices() {
        let table = uniform_row();
        let options = CodingOptions::default();
        let result = encode(
            array![4, 4, 4].into_dyn().view(),
            array![0, 1, 0].into_dyn().view(),
            &table,
            &options,
        );
        assert!(matches!(
            result,
            Err(Error::IndexOutOfRange { position: 1, index: 1, rows: 1 })
        ));
    }

    #[test]
    fn escapes_recover_distant_values() {
        let table = uniform_row();
        let symbols = array![i32::MIN, -1, 3, 4, 5, 6, 7, i32::MAX].into_dyn();
        let indices = Array1::<i32>::zeros(8).into_dyn();

        for overflow_width in [1, 4, 16] {
            let options = CodingOptions::default().with_overflow_width(overflow_width);
            let encoded = encode(symbols.view(), indices.view(), &table, &options).unwrap();
            let decoded = decode(
                &encoded.compressed,
                indices.view(),
                &table,
                &encoded.coding_shape,
                &options,
            )
            .unwrap();
            assert_eq!(decoded, symbols);
        }
    }

    #[test]
    fn empty_tensor() {
        let table = uniform_row();
        let options = CodingOptions::default();
        let symbols = ArrayD::<i32>::zeros(IxDyn(&[2, 0]));
        let encoded = encode(symbols.view(), symbols.view(), &table, &options).unwrap();
        assert!(encoded.compressed.is_empty());
        assert_eq!(encoded.coding_shape.as_slice(), &[2, 0]);

        let decoded = decode(&[], symbols.view(), &table, &[2, 0], &options).unwrap();
        assert_eq!(decoded, symbols);
    }
}
