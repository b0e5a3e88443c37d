//! Binary region masks.

use crate::error::Result;
use crate::nifti::{NiftiHeader, NiftiImage};
use ndarray::ArrayD;

/// A volume binarized by positivity (`value > 0`; NaN is outside).
///
/// The only constructors binarize, so a `Mask` is never thresholded twice.
/// Masks are shared read-only between pairs; operations that apply a mask
/// write into the other operand.
#[derive(Debug, Clone)]
pub struct Mask {
    header: NiftiHeader,
    data: ArrayD<bool>,
}

impl Mask {
    /// Threshold an image at zero.
    pub fn binarize(image: &NiftiImage) -> Self {
        Self {
            header: image.header().clone(),
            data: image.data().mapv(|v| v > 0.0),
        }
    }

    /// Build a mask from boolean voxels with a default header.
    pub fn from_array(data: ArrayD<bool>) -> Result<Self> {
        let mut header = NiftiHeader::default();
        header.set_shape(data.shape())?;
        Ok(Self { header, data })
    }

    /// Same header geometry, new voxels (used by resampling).
    pub(crate) fn with_data(&self, data: ArrayD<bool>) -> Result<Self> {
        let mut header = self.header.clone();
        header.set_shape(data.shape())?;
        Ok(Self { header, data })
    }

    /// Header of the file the mask was read from.
    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    /// Shape of the mask grid.
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Voxel membership.
    pub fn data(&self) -> &ArrayD<bool> {
        &self.data
    }

    /// Number of voxels inside the mask.
    pub fn active_voxels(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }
}
