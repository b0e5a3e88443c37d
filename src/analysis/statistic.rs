//! NaN-aware masked statistics.

use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::nifti::NiftiImage;
use ndarray::Zip;

/// Mean of `image` over the voxels inside `mask`, ignoring NaN voxels.
///
/// Shapes must already agree ([`Error::DimensionMismatch`] otherwise). An
/// empty or all-NaN selection yields NaN rather than an error.
pub fn masked_mean(image: &NiftiImage, mask: &Mask) -> Result<f64> {
    if image.shape() != mask.shape() {
        return Err(Error::DimensionMismatch {
            image: image.shape().to_vec(),
            mask: mask.shape().to_vec(),
        });
    }

    let (sum, count) = Zip::from(image.data()).and(mask.data()).fold(
        (0.0f64, 0usize),
        |(sum, count), &value, &inside| {
            if inside && !value.is_nan() {
                (sum + value, count + 1)
            } else {
                (sum, count)
            }
        },
    );

    if count == 0 {
        log::debug!("mask selects no finite voxels; mean is NaN");
        return Ok(f64::NAN);
    }
    Ok(sum / count as f64)
}
