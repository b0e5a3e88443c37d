//! Non-interactive file selection.

use crate::error::{Error, Result};
use crate::nifti::is_nifti_path;
use std::fs;
use std::path::{Path, PathBuf};

/// NIfTI files (`.nii`, `.nii.gz`) directly inside `dir`, sorted by name.
pub fn list_nifti_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(Error::no_selection(format!(
            "{} is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_nifti_path(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Paths whose file name contains `stem`, in input order.
pub fn filter_by_stem(paths: &[PathBuf], stem: &str) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(stem))
        })
        .cloned()
        .collect()
}

/// Fail with [`Error::NoSelection`] naming `what` when `paths` is empty, and
/// with [`Error::InvalidFileFormat`] when any path is not a NIfTI file.
pub fn require_nifti(paths: Vec<PathBuf>, what: &str) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return Err(Error::no_selection(format!("no {what} selected")));
    }
    if let Some(bad) = paths.iter().find(|p| !is_nifti_path(p)) {
        return Err(Error::not_nifti(bad));
    }
    Ok(paths)
}
