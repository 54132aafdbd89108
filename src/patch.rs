//! Decomposition of single-image tensors into tiles
//!
//! The vectorized orchestrator codes one lane per entry of the tensor's leading axis. A
//! tensor of shape `(1, C, H, W)` has only a single lane, so it is first split into
//! non-overlapping spatial tiles of size `(ph, pw)`. Every tile, with all of its
//! channels, becomes a lane of shape `(C, ph, pw)`. Tiles are ordered row-major over the
//! tile grid.

use ndarray::{Array4, ArrayView4, Axis};

use crate::{Error, Result};

/// What [`reconstitute`] needs to know to undo a [`decompose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnfoldedShape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub patch_size: (usize, usize),
}

impl UnfoldedShape {
    /// Number of tiles along the height and the width.
    pub fn grid(&self) -> (usize, usize) {
        (
            self.height / self.patch_size.0,
            self.width / self.patch_size.1,
        )
    }

    pub fn num_lanes(&self) -> usize {
        let (rows, cols) = self.grid();
        rows * cols
    }

    pub fn lane_shape(&self) -> [usize; 3] {
        [self.channels, self.patch_size.0, self.patch_size.1]
    }

    pub fn original_shape(&self) -> [usize; 4] {
        [1, self.channels, self.height, self.width]
    }
}

/// Splits `x` of shape `(1, C, H, W)` into lanes of shape `(C, ph, pw)`.
///
/// Returns the lanes, stacked along the leading axis, and the metadata needed to
/// reassemble them.
pub fn decompose<A: Clone>(
    x: ArrayView4<'_, A>,
    patch_size: (usize, usize),
) -> Result<(Array4<A>, UnfoldedShape)> {
    let (batch, channels, height, width) = x.dim();
    let (ph, pw) = patch_size;
    let mismatch = || Error::PatchMismatch {
        shape: x.shape().to_vec(),
        patch_size,
    };
    if batch != 1 || ph == 0 || pw == 0 || height % ph != 0 || width % pw != 0 {
        return Err(mismatch());
    }

    let unfolded = UnfoldedShape {
        channels,
        height,
        width,
        patch_size,
    };
    let (rows, cols) = unfolded.grid();

    let lanes = x
        .index_axis(Axis(0), 0)
        .as_standard_layout()
        .into_owned()
        .into_shape((channels, rows, ph, cols, pw))
        .map_err(|_| mismatch())?
        .permuted_axes([1, 3, 0, 2, 4])
        .as_standard_layout()
        .into_owned()
        .into_shape((rows * cols, channels, ph, pw))
        .map_err(|_| mismatch())?;

    tracing::trace!(
        shape = ?x.shape(),
        ?patch_size,
        lanes = rows * cols,
        "decomposed tensor into patches"
    );
    Ok((lanes, unfolded))
}

/// Reassembles lanes produced by [`decompose`] into a tensor of shape `(1, C, H, W)`.
pub fn reconstitute<A: Clone>(
    lanes: ArrayView4<'_, A>,
    unfolded: &UnfoldedShape,
) -> Result<Array4<A>> {
    let (rows, cols) = unfolded.grid();
    let (ph, pw) = unfolded.patch_size;
    let expected = [rows * cols, unfolded.channels, ph, pw];
    let mismatch = || Error::ShapeMismatch {
        expected: expected.to_vec(),
        actual: lanes.shape().to_vec(),
    };
    if lanes.shape() != expected {
        return Err(mismatch());
    }

    let reassembled = lanes
        .as_standard_layout()
        .into_owned()
        .into_shape((rows, cols, unfolded.channels, ph, pw))
        .map_err(|_| mismatch())?
        .permuted_axes([2, 0, 3, 1, 4])
        .as_standard_layout()
        .into_owned()
        .into_shape((1, unfolded.channels, unfolded.height, unfolded.width))
        .map_err(|_| mismatch())?;

    tracing::trace!(lanes = rows * cols, "reassembled patches");
    Ok(reassembled)
}
