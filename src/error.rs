//! Error types for volpair.

use std::path::Path;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the codec, the pairing stage and the per-pair analyses.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header does not carry a recognised NIfTI magic string.
    #[error("invalid NIfTI magic bytes {0:?}")]
    InvalidMagic([u8; 4]),

    /// The header names a datatype code this crate cannot decode.
    #[error("unsupported data type code {0}")]
    UnsupportedDataType(i16),

    /// Header dimensions or offsets are inconsistent.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Gzip stream could not be decoded.
    #[error("decompression failed: {0}")]
    Decompression(String),

    /// File is not a readable NIfTI volume.
    #[error("invalid file format: {0}")]
    InvalidFileFormat(String),

    /// No images, masks or input folder were provided.
    #[error("nothing selected: {0}")]
    NoSelection(String),

    /// Stem matching produced an empty fixed/subtract mapping.
    #[error("no fixed/subtract pairs found for stems '{fixed_stem}' -> '{subtract_stem}'")]
    NoPairsFound {
        /// Stem identifying fixed files.
        fixed_stem: String,
        /// Stem identifying subtract files.
        subtract_stem: String,
    },

    /// Cross-product expansion was declined.
    #[error("cross-product expansion of {images} images x {masks} masks was not confirmed")]
    CountMismatchCancelled {
        /// Number of images.
        images: usize,
        /// Number of masks.
        masks: usize,
    },

    /// Image and mask shapes differ.
    #[error("image shape {image:?} does not match mask shape {mask:?}")]
    DimensionMismatch {
        /// Shape of the image.
        image: Vec<usize>,
        /// Shape of the mask.
        mask: Vec<usize>,
    },

    /// Elementwise operation on two volumes of different shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// No output destination was provided.
    #[error("save cancelled: {0}")]
    SaveCancelled(String),

    /// Result table could not be written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A single pair failed; carries the pair label.
    #[error("{label}: {cause}")]
    Pair {
        /// Human-readable pair label.
        label: String,
        /// The underlying failure.
        cause: Box<Error>,
    },

    /// Invalid run configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Wrap an error with the label of the pair that produced it.
    pub fn for_pair(label: impl Into<String>, source: Error) -> Self {
        Self::Pair {
            label: label.into(),
            cause: Box::new(source),
        }
    }

    /// Build a `NoSelection` error naming what was missing.
    pub fn no_selection(what: impl Into<String>) -> Self {
        Self::NoSelection(what.into())
    }

    /// Build an error for a path that is not a NIfTI file.
    pub fn not_nifti(path: &Path) -> Self {
        Self::InvalidFileFormat(format!("{} is not a .nii or .nii.gz file", path.display()))
    }

    /// True for deliberate aborts that should exit cleanly.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::NoSelection(_) | Self::CountMismatchCancelled { .. } | Self::SaveCancelled(_) => {
                true
            }
            Self::Pair { cause, .. } => cause.is_cancellation(),
            _ => false,
        }
    }

    /// The innermost error, unwrapping any pair labels.
    pub fn root(&self) -> &Error {
        match self {
            Self::Pair { cause, .. } => cause.root(),
            other => other,
        }
    }
}
