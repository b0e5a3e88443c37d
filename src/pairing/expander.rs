//! Image/mask alignment for the masked-mean workflow.

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// One unit of statistic work.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pairing {
    /// Intensity image.
    pub image: PathBuf,
    /// Region mask.
    pub mask: PathBuf,
}

impl Pairing {
    /// Build a pairing.
    pub fn new(image: impl Into<PathBuf>, mask: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            mask: mask.into(),
        }
    }

    /// Short label used in logs and failure reports.
    pub fn label(&self) -> String {
        format!("{} / {}", display_name(&self.image), display_name(&self.mask))
    }
}

/// How an images collection and a masks collection are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionPlan {
    /// Equal counts: pair i is `(image_i, mask_i)`.
    Positional,
    /// One mask for several images.
    Broadcast,
    /// Every image with every mask; needs confirmation first.
    CrossProduct(CountMismatch),
}

impl ExpansionPlan {
    /// Choose the plan for `images` images and `masks` masks.
    pub fn for_counts(images: usize, masks: usize) -> Result<Self> {
        if images == 0 {
            return Err(Error::no_selection("no images selected"));
        }
        if masks == 0 {
            return Err(Error::no_selection("no masks selected"));
        }
        Ok(if masks == images {
            Self::Positional
        } else if masks == 1 {
            Self::Broadcast
        } else {
            Self::CrossProduct(CountMismatch { images, masks })
        })
    }

    /// The count payload for the confirmation prompt, if one is needed.
    pub fn confirmation(self) -> Option<CountMismatch> {
        match self {
            Self::CrossProduct(mismatch) => Some(mismatch),
            Self::Positional | Self::Broadcast => None,
        }
    }
}

/// Counts shown when asking whether to expand into the full cross product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountMismatch {
    /// Number of images (M).
    pub images: usize,
    /// Number of masks (N).
    pub masks: usize,
}

impl CountMismatch {
    /// Number of pairings the cross product produces (M x N).
    pub fn expanded_len(self) -> usize {
        self.images * self.masks
    }
}

impl fmt::Display for CountMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images and {} masks do not match; pair every image with every mask ({} pairs)?",
            self.images,
            self.masks,
            self.expanded_len()
        )
    }
}

/// Combine images and masks into pairings.
///
/// Equal counts pair by position, a single mask is broadcast, and any other
/// combination becomes the cross product (images outer, masks inner) when
/// `cross_product_confirmed` is set, or [`Error::CountMismatchCancelled`]
/// otherwise. Empty inputs are [`Error::NoSelection`].
pub fn expand(
    images: &[PathBuf],
    masks: &[PathBuf],
    cross_product_confirmed: bool,
) -> Result<Vec<Pairing>> {
    let plan = ExpansionPlan::for_counts(images.len(), masks.len())?;
    log::debug!("expansion plan for {} images, {} masks: {:?}", images.len(), masks.len(), plan);

    let pairings = match plan {
        ExpansionPlan::Positional => images
            .iter()
            .zip(masks)
            .map(|(image, mask)| Pairing::new(image, mask))
            .collect(),
        ExpansionPlan::Broadcast => images
            .iter()
            .map(|image| Pairing::new(image, &masks[0]))
            .collect(),
        ExpansionPlan::CrossProduct(mismatch) => {
            if !cross_product_confirmed {
                return Err(Error::CountMismatchCancelled {
                    images: mismatch.images,
                    masks: mismatch.masks,
                });
            }
            images
                .iter()
                .flat_map(|image| masks.iter().map(move |mask| Pairing::new(image, mask)))
                .collect()
        }
    };
    Ok(pairings)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
