//! Difference volumes with optional centering and output masking.
//!
//! The optional steps form an ordered list of [`Stage`]s resolved once per
//! run. Every stage reconciles its mask to the difference grid first, then
//! transforms the difference voxels; masks are only ever read.

use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::nifti::{nifti_stem, NiftiImage};
use crate::transforms::reconcile;
use ndarray::{ArrayD, Zip};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One optional post-subtraction step, with the file its mask came from.
#[derive(Debug, Clone)]
pub enum Stage {
    /// Subtract the mean of the difference inside the mask from every voxel.
    Center { mask: Arc<Mask>, source: PathBuf },
    /// Zero every voxel outside the mask.
    MaskOutside { mask: Arc<Mask>, source: PathBuf },
}

impl Stage {
    /// File the stage's mask was loaded from.
    pub fn source(&self) -> &Path {
        match self {
            Self::Center { source, .. } | Self::MaskOutside { source, .. } => source,
        }
    }

    fn mask(&self) -> &Mask {
        match self {
            Self::Center { mask, .. } | Self::MaskOutside { mask, .. } => mask,
        }
    }

    /// Name logged when the mask has to be resampled.
    fn describe(&self) -> String {
        let role = match self {
            Self::Center { .. } => "centering mask",
            Self::MaskOutside { .. } => "output mask",
        };
        format!("{role} {}", self.source().display())
    }

    /// Apply the stage in place, returning the centering mean if any.
    fn apply(&self, data: &mut ArrayD<f64>) -> Result<Option<f64>> {
        let mask = reconcile(data.shape(), self.mask(), &self.describe())?;
        match self {
            Self::Center { .. } => {
                let mean = plain_masked_mean(data, &mask);
                if mean.is_nan() {
                    log::warn!("centering mean is NaN; difference will be all NaN");
                }
                data.mapv_inplace(|v| v - mean);
                Ok(Some(mean))
            }
            Self::MaskOutside { .. } => {
                Zip::from(data).and(mask.data()).for_each(|v, &inside| {
                    if !inside {
                        *v = 0.0;
                    }
                });
                Ok(None)
            }
        }
    }
}

/// Mean over the mask without NaN handling; an empty mask gives NaN.
fn plain_masked_mean(data: &ArrayD<f64>, mask: &Mask) -> f64 {
    let (sum, count) = Zip::from(data)
        .and(mask.data())
        .fold((0.0f64, 0usize), |(sum, count), &v, &inside| {
            if inside {
                (sum + v, count + 1)
            } else {
                (sum, count)
            }
        });
    if count == 0 {
        log::warn!("centering mask selects no voxels");
        return f64::NAN;
    }
    sum / count as f64
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct DifferenceResult {
    /// Difference volume carrying the fixed image's geometry.
    pub image: NiftiImage,
    /// Mean removed by the centering stage, when it ran.
    pub center_mean: Option<f64>,
}

/// Ordered optional stages shared by every pair of a run.
#[derive(Debug, Clone, Default)]
pub struct DifferencePipeline {
    stages: Vec<Stage>,
}

impl DifferencePipeline {
    /// Pipeline with no optional stages (plain subtraction).
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline from `(source, mask)` pairs; centering runs before output
    /// masking.
    pub fn from_masks(
        center: Option<(PathBuf, Arc<Mask>)>,
        output: Option<(PathBuf, Arc<Mask>)>,
    ) -> Self {
        let stages = center
            .map(|(source, mask)| Stage::Center { mask, source })
            .into_iter()
            .chain(output.map(|(source, mask)| Stage::MaskOutside { mask, source }))
            .collect();
        Self { stages }
    }

    /// Append a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Stages in the order they run.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// `fixed - subtract`, then every stage in order.
    ///
    /// Fails with [`Error::ShapeMismatch`] before touching any voxel when
    /// the two inputs differ in shape.
    pub fn run(&self, fixed: &NiftiImage, subtract: &NiftiImage) -> Result<DifferenceResult> {
        if fixed.shape() != subtract.shape() {
            return Err(Error::ShapeMismatch(format!(
                "fixed volume {:?} vs subtract volume {:?}",
                fixed.shape(),
                subtract.shape()
            )));
        }

        let mut data = fixed.data() - subtract.data();
        let mut center_mean = None;
        for stage in &self.stages {
            if let Some(mean) = stage.apply(&mut data)? {
                log::info!("centering mean: {mean}");
                center_mean = Some(mean);
            }
        }

        Ok(DifferenceResult {
            image: fixed.derive(data)?,
            center_mean,
        })
    }
}

/// `<fixed>_minus_<subtract>_difference`, without extension.
pub fn output_name(fixed: &Path, subtract: &Path) -> String {
    format!(
        "{}_minus_{}_difference",
        nifti_stem(fixed),
        nifti_stem(subtract)
    )
}
