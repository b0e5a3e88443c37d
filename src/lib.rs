//! # volpair
//!
//! Batch analysis of NIfTI volumes against binary region masks.
//!
//! Two workflows share one codec and one set of building blocks:
//!
//! - **Masked means**: images and masks are aligned by position, a single
//!   mask is broadcast, or (after confirmation) the full cross product is
//!   taken; each pairing yields the NaN-omitting mean of the image inside
//!   the mask.
//! - **Difference volumes**: fixed and subtract files are matched by stem
//!   substitution in their names; each pair yields `fixed - subtract`,
//!   optionally centered on a mask mean and zeroed outside another mask.
//!
//! ## Quick start
//!
//! ```ignore
//! use volpair::batch::run_mean_batch;
//! use volpair::config::MeanConfig;
//! use volpair::pairing::expand;
//! use volpair::store::NiftiStore;
//!
//! let pairings = expand(&images, &masks, false)?;
//! let report = run_mean_batch(&NiftiStore, &pairings, &MeanConfig::default())?;
//! report.results.write_csv_path("means.csv")?;
//! ```

#![warn(missing_debug_implementations)]

pub mod analysis;
pub mod batch;
pub mod config;
pub mod error;
pub mod mask;
pub mod nifti;
pub mod pairing;
pub mod selection;
pub mod store;
pub mod transforms;

pub use error::{Error, Result};
pub use mask::Mask;
pub use nifti::NiftiImage;
