//! Run-level configuration, resolved once before any pair is processed.
//!
//! Interactive decisions (confirming a cross product, enabling centering or
//! masking) end up as plain fields here; the core never prompts.

use std::path::{Path, PathBuf};

/// What a per-pair failure does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop at the first failing pair.
    #[default]
    Halt,
    /// Log the failure, record it in the report and move on.
    SkipAndContinue,
}

/// Configuration for masked-mean runs.
#[derive(Debug, Clone)]
pub struct MeanConfig {
    /// Whether cross-product expansion of mismatched counts was approved.
    pub cross_product_confirmed: bool,
    /// Resample masks onto each image's grid instead of failing on shape.
    pub reslice_masks: bool,
    /// Per-pair failure handling.
    pub failure_policy: FailurePolicy,
    /// Worker threads (1 = sequential, 0 = one per core).
    pub threads: usize,
}

impl Default for MeanConfig {
    fn default() -> Self {
        Self {
            cross_product_confirmed: false,
            reslice_masks: false,
            failure_policy: FailurePolicy::Halt,
            threads: 1,
        }
    }
}

impl MeanConfig {
    /// Approve (or refuse) cross-product expansion.
    pub fn confirm_cross_product(mut self, confirmed: bool) -> Self {
        self.cross_product_confirmed = confirmed;
        self
    }

    /// Enable mask reslicing.
    pub fn reslice_masks(mut self, enabled: bool) -> Self {
        self.reslice_masks = enabled;
        self
    }

    /// Set the failure policy.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the worker thread count.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

/// Configuration for difference runs.
#[derive(Debug, Clone)]
pub struct DifferenceConfig {
    /// Mask whose mean is removed from each difference (centering).
    pub center_mask: Option<PathBuf>,
    /// Mask outside which each difference is zeroed.
    pub output_mask: Option<PathBuf>,
    /// Directory receiving the difference volumes.
    pub output_dir: PathBuf,
    /// Write `.nii.gz` (true) or `.nii` (false).
    pub compress: bool,
    /// Per-pair failure handling.
    pub failure_policy: FailurePolicy,
    /// Worker threads (1 = sequential, 0 = one per core).
    pub threads: usize,
}

impl Default for DifferenceConfig {
    fn default() -> Self {
        Self {
            center_mask: None,
            output_mask: None,
            output_dir: PathBuf::from("."),
            compress: true,
            failure_policy: FailurePolicy::Halt,
            threads: 1,
        }
    }
}

impl DifferenceConfig {
    /// Create config writing into `output_dir`.
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Enable centering with the given mask.
    pub fn center_with<P: AsRef<Path>>(mut self, mask: P) -> Self {
        self.center_mask = Some(mask.as_ref().to_path_buf());
        self
    }

    /// Enable output masking with the given mask.
    pub fn mask_with<P: AsRef<Path>>(mut self, mask: P) -> Self {
        self.output_mask = Some(mask.as_ref().to_path_buf());
        self
    }

    /// Choose compressed or plain output.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the failure policy.
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the worker thread count.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn center_enabled(&self) -> bool {
        self.center_mask.is_some()
    }

    pub fn mask_enabled(&self) -> bool {
        self.output_mask.is_some()
    }

    /// File extension for outputs, including the leading dot.
    pub fn output_extension(&self) -> &'static str {
        if self.compress {
            ".nii.gz"
        } else {
            ".nii"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_halt_and_run_sequentially() {
        let mean = MeanConfig::default();
        assert_eq!(mean.failure_policy, FailurePolicy::Halt);
        assert_eq!(mean.threads, 1);
        assert!(!mean.cross_product_confirmed);

        let diff = DifferenceConfig::new("out");
        assert!(!diff.center_enabled());
        assert!(!diff.mask_enabled());
        assert_eq!(diff.output_extension(), ".nii.gz");
    }

    #[test]
    fn test_builders() {
        let diff = DifferenceConfig::new("out")
            .center_with("wm.nii")
            .mask_with("brain.nii.gz")
            .compress(false)
            .failure_policy(FailurePolicy::SkipAndContinue)
            .threads(4);
        assert!(diff.center_enabled() && diff.mask_enabled());
        assert_eq!(diff.output_extension(), ".nii");
        assert_eq!(diff.threads, 4);
    }
}
