//! Nearest-neighbor shape reconciliation.
//!
//! Whenever two volumes must line up voxel for voxel, callers pass the one
//! that may move through [`reconcile`]. Nearest-neighbor sampling keeps
//! masks binary.

use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::nifti::NiftiImage;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use std::borrow::Cow;

/// A grid that can be resampled onto another shape.
pub trait Resample: Clone {
    /// Current grid shape.
    fn grid_shape(&self) -> &[usize];

    /// Nearest-neighbor copy on `shape`.
    fn resampled(&self, shape: &[usize]) -> Result<Self>;
}

impl Resample for NiftiImage {
    fn grid_shape(&self) -> &[usize] {
        self.shape()
    }

    fn resampled(&self, shape: &[usize]) -> Result<Self> {
        self.derive(resample_nearest(self.data(), shape)?)
    }
}

impl Resample for Mask {
    fn grid_shape(&self) -> &[usize] {
        self.shape()
    }

    fn resampled(&self, shape: &[usize]) -> Result<Self> {
        self.with_data(resample_nearest(self.data(), shape)?)
    }
}

/// Return `target` unchanged when it already has `reference` shape,
/// otherwise a nearest-neighbor copy on that shape. `name` identifies the
/// resampled file in the warning.
pub fn reconcile<'a, V: Resample>(
    reference: &[usize],
    target: &'a V,
    name: &str,
) -> Result<Cow<'a, V>> {
    if target.grid_shape() == reference {
        return Ok(Cow::Borrowed(target));
    }
    log::warn!(
        "resampling {} from {:?} to {:?} (nearest neighbor)",
        name,
        target.grid_shape(),
        reference
    );
    target.resampled(reference).map(Cow::Owned)
}

/// Nearest-neighbor resample of `data` onto `shape` by voxel-centre scaling.
///
/// Output voxel `o` on an axis of source length `n` and target length `m`
/// samples source voxel `floor((o + 0.5) * n / m)`.
pub fn resample_nearest<T: Clone>(data: &ArrayD<T>, shape: &[usize]) -> Result<ArrayD<T>> {
    if data.ndim() != shape.len() {
        return Err(Error::ShapeMismatch(format!(
            "cannot resample a rank-{} volume {:?} onto rank-{} shape {:?}",
            data.ndim(),
            data.shape(),
            shape.len(),
            shape
        )));
    }
    if shape.contains(&0) || data.is_empty() {
        return Err(Error::InvalidDimensions(format!(
            "cannot resample {:?} onto {:?}",
            data.shape(),
            shape
        )));
    }

    let maps: Vec<Vec<usize>> = data
        .shape()
        .iter()
        .zip(shape)
        .map(|(&n, &m)| (0..m).map(|o| ((2 * o + 1) * n) / (2 * m)).collect())
        .collect();

    let mut src = vec![0usize; shape.len()];
    Ok(ArrayD::from_shape_fn(IxDyn(shape).f(), |idx| {
        for (axis, s) in src.iter_mut().enumerate() {
            *s = maps[axis][idx[axis]];
        }
        data[src.as_slice()].clone()
    }))
}
