//! `NIfTI` file format support.
//!
//! `NIfTI` (Neuroimaging Informatics Technology Initiative) is the standard
//! container for the volumes this crate analyses. This module reads and
//! writes `.nii` and `.nii.gz` files into [`NiftiImage`] values.

pub(crate) mod header;
pub(crate) mod image;
pub mod io;

pub use header::{DataType, NiftiHeader, NiftiVersion};
pub use image::NiftiImage;
pub use io::{is_nifti_path, load, load_header, nifti_stem, save};
