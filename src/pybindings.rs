//! Python bindings for the indexed entropy coders
//!
//! This module is only compiled if the feature `pybindings` is turned on, which is
//! turned off by default.
//!
//! # Compiling the Python Extension Module
//!
//! Build an optimized library *with the `pybindings` feature flag*:
//!
//! ```bash
//! cargo build --release --features pybindings
//! ```
//!
//! and make `target/release/libindexed_ans.so` importable as `indexed_ans.so`.
//!
//! # Example
//!
//! ```python
//! import indexed_ans
//! import numpy as np
//!
//! cdf = np.array([[0, 85, 170, 256]], dtype=np.uint32)
//! cdf_length = np.array([4], dtype=np.uint32)
//! cdf_offset = np.array([4], dtype=np.int32)
//! symbols = np.array([[5, 2, 9]], dtype=np.int32)
//! indices = np.zeros_like(symbols)
//!
//! compressed, coding_shape = indexed_ans.ans_index_encoder(
//!     symbols, indices, cdf, cdf_length, cdf_offset, 8)
//! decoded = indexed_ans.ans_index_decoder(
//!     compressed, indices, cdf, cdf_length, cdf_offset, 8, coding_shape)
//! assert (decoded == symbols).all()
//! ```

use numpy::{
    IntoPyArray, PyArray1, PyArrayDyn, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArrayDyn,
};
use pyo3::prelude::*;

use crate::{indexed, CdfTable, CodingOptions, Error, Precision};

/// ## Indexed Entropy Coding of Integer Tensors
///
/// Encoders return a tuple `(compressed, coding_shape)`, where `compressed` is a
/// one-dimensional numpy array with dtype `uint32`. Pass both to the matching decoder
/// together with the same indices, tables, and options.
#[pymodule]
fn indexed_ans(_py: Python<'_>, module: &PyModule) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(ans_index_encoder, module)?)?;
    module.add_function(wrap_pyfunction!(ans_index_decoder, module)?)?;
    module.add_function(wrap_pyfunction!(vec_ans_index_encoder, module)?)?;
    module.add_function(wrap_pyfunction!(vec_ans_index_decoder, module)?)?;
    Ok(())
}

impl From<Error> for PyErr {
    fn from(err: Error) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}

fn make_table(
    cdf: PyReadonlyArray2<'_, u32>,
    cdf_length: PyReadonlyArray1<'_, u32>,
    cdf_offset: PyReadonlyArray1<'_, i32>,
    precision: u32,
) -> PyResult<CdfTable> {
    Ok(CdfTable::new(
        cdf.as_array().to_owned(),
        cdf_length.as_array().to_owned(),
        cdf_offset.as_array().to_owned(),
        Precision::new(precision)?,
    )?)
}

fn make_options(overflow_width: u32, patch_size: (usize, usize)) -> CodingOptions {
    CodingOptions::default()
        .with_overflow_width(overflow_width)
        .with_patch_size(patch_size)
}

/// Encodes `symbols` one at a time, using the CDF row `indices[i]` for `symbols[i]`.
#[pyfunction]
#[pyo3(signature = (
    symbols, indices, cdf, cdf_length, cdf_offset, precision,
    overflow_width = CodingOptions::DEFAULT_OVERFLOW_WIDTH
))]
#[allow(clippy::too_many_arguments)]
fn ans_index_encoder<'p>(
    py: Python<'p>,
    symbols: PyReadonlyArrayDyn<'_, i32>,
    indices: PyReadonlyArrayDyn<'_, i32>,
    cdf: PyReadonlyArray2<'_, u32>,
    cdf_length: PyReadonlyArray1<'_, u32>,
    cdf_offset: PyReadonlyArray1<'_, i32>,
    precision: u32,
    overflow_width: u32,
) -> PyResult<(&'p PyArray1<u32>, Vec<usize>)> {
    let table = make_table(cdf, cdf_length, cdf_offset, precision)?;
    let options = make_options(overflow_width, CodingOptions::DEFAULT_PATCH_SIZE);
    let encoded = indexed::scalar::encode(symbols.as_array(), indices.as_array(), &table, &options)?;
    Ok((
        encoded.compressed.into_pyarray(py),
        encoded.coding_shape.to_vec(),
    ))
}

/// Decodes data produced by `ans_index_encoder`.
#[pyfunction]
#[pyo3(signature = (
    compressed, indices, cdf, cdf_length, cdf_offset, precision, coding_shape,
    overflow_width = CodingOptions::DEFAULT_OVERFLOW_WIDTH
))]
#[allow(clippy::too_many_arguments)]
fn ans_index_decoder<'p>(
    py: Python<'p>,
    compressed: PyReadonlyArray1<'_, u32>,
    indices: PyReadonlyArrayDyn<'_, i32>,
    cdf: PyReadonlyArray2<'_, u32>,
    cdf_length: PyReadonlyArray1<'_, u32>,
    cdf_offset: PyReadonlyArray1<'_, i32>,
    precision: u32,
    coding_shape: Vec<usize>,
    overflow_width: u32,
) -> PyResult<&'p PyArrayDyn<i32>> {
    let table = make_table(cdf, cdf_length, cdf_offset, precision)?;
    let options = make_options(overflow_width, CodingOptions::DEFAULT_PATCH_SIZE);
    let decoded = indexed::scalar::decode(
        &compressed.to_vec()?,
        indices.as_array(),
        &table,
        &coding_shape,
        &options,
    )?;
    Ok(decoded.into_pyarray(py))
}

/// Encodes `symbols` one lane (entry of the leading axis) at a time.
///
/// A tensor with a single lane must have shape `(1, C, H, W)`; it gets split into
/// patches of size `patch_size` first.
#[pyfunction]
#[pyo3(signature = (
    symbols, indices, cdf, cdf_length, cdf_offset, precision,
    overflow_width = CodingOptions::DEFAULT_OVERFLOW_WIDTH,
    patch_size = CodingOptions::DEFAULT_PATCH_SIZE
))]
#[allow(clippy::too_many_arguments)]
fn vec_ans_index_encoder<'p>(
    py: Python<'p>,
    symbols: PyReadonlyArrayDyn<'_, i32>,
    indices: PyReadonlyArrayDyn<'_, i32>,
    cdf: PyReadonlyArray2<'_, u32>,
    cdf_length: PyReadonlyArray1<'_, u32>,
    cdf_offset: PyReadonlyArray1<'_, i32>,
    precision: u32,
    overflow_width: u32,
    patch_size: (usize, usize),
) -> PyResult<(&'p PyArray1<u32>, Vec<usize>)> {
    let table = make_table(cdf, cdf_length, cdf_offset, precision)?;
    let options = make_options(overflow_width, patch_size);
    let encoded =
        indexed::vectorized::encode(symbols.as_array(), indices.as_array(), &table, &options)?;
    Ok((
        encoded.compressed.into_pyarray(py),
        encoded.coding_shape.to_vec(),
    ))
}

/// Decodes data produced by `vec_ans_index_encoder`.
#[pyfunction]
#[pyo3(signature = (
    compressed, indices, cdf, cdf_length, cdf_offset, precision, coding_shape,
    overflow_width = CodingOptions::DEFAULT_OVERFLOW_WIDTH,
    patch_size = CodingOptions::DEFAULT_PATCH_SIZE
))]
#[allow(clippy::too_many_arguments)]
fn vec_ans_index_decoder<'p>(
    py: Python<'p>,
    compressed: PyReadonlyArray1<'_, u32>,
    indices: PyReadonlyArrayDyn<'_, i32>,
    cdf: PyReadonlyArray2<'_, u32>,
    cdf_length: PyReadonlyArray1<'_, u32>,
    cdf_offset: PyReadonlyArray1<'_, i32>,
    precision: u32,
    coding_shape: Vec<usize>,
    overflow_width: u32,
    patch_size: (usize, usize),
) -> PyResult<&'p PyArrayDyn<i32>> {
    let table = make_table(cdf, cdf_length, cdf_offset, precision)?;
    let options = make_options(overflow_width, patch_size);
    let decoded = indexed::vectorized::decode(
        &compressed.to_vec()?,
        indices.as_array(),
        &table,
        &coding_shape,
        &options,
    )?;
    Ok(decoded.into_pyarray(py))
}
