//! Spatial transforms applied between paired volumes.

pub mod resample;

pub use resample::{reconcile, resample_nearest, Resample};
