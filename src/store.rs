//! Where volumes come from and go to.
//!
//! The batch runners only talk to a [`VolumeStore`], so the per-pair logic
//! stays independent of the file codec.

use crate::error::Result;
use crate::mask::Mask;
use crate::nifti::{self, NiftiImage};
use std::path::Path;

/// Loads and saves volumes by path.
pub trait VolumeStore: Sync {
    /// Load a volume.
    fn load(&self, path: &Path) -> Result<NiftiImage>;

    /// Persist a volume.
    fn save(&self, image: &NiftiImage, path: &Path) -> Result<()>;

    /// Load a volume and binarize it.
    fn load_mask(&self, path: &Path) -> Result<Mask> {
        self.load(path).map(|image| Mask::binarize(&image))
    }
}

/// [`VolumeStore`] backed by `.nii` / `.nii.gz` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NiftiStore;

impl VolumeStore for NiftiStore {
    fn load(&self, path: &Path) -> Result<NiftiImage> {
        nifti::load(path)
    }

    fn save(&self, image: &NiftiImage, path: &Path) -> Result<()> {
        nifti::save(image, path)
    }
}
