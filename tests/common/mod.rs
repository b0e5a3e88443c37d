//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};
use volpair::nifti::{self, NiftiImage};

pub const IDENTITY: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Write a Float32 volume with values given in C order.
pub fn write_volume(dir: &Path, name: &str, shape: &[usize], values: Vec<f64>) -> PathBuf {
    let data = ArrayD::from_shape_vec(IxDyn(shape), values).unwrap();
    let image = NiftiImage::from_array(data, IDENTITY).unwrap();
    let path = dir.join(name);
    nifti::save(&image, &path).unwrap();
    path
}

/// Values of a volume on disk in C order.
pub fn read_values(path: &Path) -> Vec<f64> {
    nifti::load(path).unwrap().data().iter().copied().collect()
}
