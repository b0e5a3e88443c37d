//! End-to-end runs of both workflows over files on disk.

mod common;

use common::{read_values, write_volume};
use std::path::PathBuf;
use tempfile::tempdir;
use volpair::batch::{run_difference_batch, run_mean_batch};
use volpair::config::{DifferenceConfig, FailurePolicy, MeanConfig};
use volpair::pairing::{expand, pair_by_stem, DifferencePair, Stems};
use volpair::selection::{filter_by_stem, list_nifti_files};
use volpair::store::NiftiStore;
use volpair::Error;

#[test]
fn test_mean_broadcast_to_csv() {
    let dir = tempdir().unwrap();
    let a = write_volume(dir.path(), "a.nii", &[2, 2, 1], vec![1.0, 2.0, 3.0, f64::NAN]);
    let b = write_volume(dir.path(), "b.nii.gz", &[2, 2, 1], vec![4.0, 4.0, 8.0, 8.0]);
    let m = write_volume(dir.path(), "roi.nii", &[2, 2, 1], vec![1.0, 0.0, 1.0, 1.0]);

    let pairings = expand(&[a.clone(), b.clone()], &[m.clone()], false).unwrap();
    let report = run_mean_batch(&NiftiStore, &pairings, &MeanConfig::default()).unwrap();

    let means: Vec<f64> = report.results.records().iter().map(|r| r.mean_value).collect();
    assert_eq!(means, vec![2.0, 20.0 / 3.0]);

    let csv_path = dir.path().join("means.csv");
    report.results.write_csv_path(&csv_path).unwrap();
    let mut reader = csv::Reader::from_path(&csv_path).unwrap();
    let headers: Vec<String> = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect();
    assert_eq!(headers, vec!["ImageFile", "MaskFile", "MeanValue"]);

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], a.display().to_string().as_str());
    assert_eq!(&rows[1][1], m.display().to_string().as_str());
    assert_eq!(rows[0][2].parse::<f64>().unwrap(), 2.0);
}

#[test]
fn test_mean_cross_product_requires_confirmation() {
    let dir = tempdir().unwrap();
    let images: Vec<PathBuf> = (0..3)
        .map(|i| {
            write_volume(
                dir.path(),
                &format!("img{i}.nii"),
                &[2, 1, 1],
                vec![f64::from(i), 1.0],
            )
        })
        .collect();
    let masks: Vec<PathBuf> = (0..2)
        .map(|i| {
            let values = if i == 0 { vec![1.0, 0.0] } else { vec![0.0, 1.0] };
            write_volume(dir.path(), &format!("mask{i}.nii"), &[2, 1, 1], values)
        })
        .collect();

    let declined = expand(&images, &masks, false).unwrap_err();
    assert!(declined.is_cancellation());

    let pairings = expand(&images, &masks, true).unwrap();
    assert_eq!(pairings.len(), 6);

    let config = MeanConfig::default().confirm_cross_product(true).threads(3);
    let report = run_mean_batch(&NiftiStore, &pairings, &config).unwrap();
    let means: Vec<f64> = report.results.records().iter().map(|r| r.mean_value).collect();
    assert_eq!(means, vec![0.0, 1.0, 1.0, 1.0, 2.0, 1.0]);
}

#[test]
fn test_mean_mask_shape_policy() {
    let dir = tempdir().unwrap();
    let image = write_volume(
        dir.path(),
        "img.nii",
        &[4, 4, 1],
        (0..16).map(f64::from).collect(),
    );
    let coarse = write_volume(dir.path(), "coarse.nii", &[2, 2, 1], vec![1.0, 0.0, 0.0, 0.0]);
    let pairings = expand(&[image], &[coarse], false).unwrap();

    let err = run_mean_batch(&NiftiStore, &pairings, &MeanConfig::default()).unwrap_err();
    assert!(matches!(err.root(), Error::DimensionMismatch { .. }));

    let skipped = run_mean_batch(
        &NiftiStore,
        &pairings,
        &MeanConfig::default().failure_policy(FailurePolicy::SkipAndContinue),
    )
    .unwrap();
    assert!(skipped.results.is_empty());
    assert_eq!(skipped.failures.len(), 1);

    let resliced = run_mean_batch(
        &NiftiStore,
        &pairings,
        &MeanConfig::default().reslice_masks(true),
    )
    .unwrap();
    // x, y < 2 in C order: 0, 1, 4, 5
    assert_eq!(resliced.results.records()[0].mean_value, 2.5);
}

#[test]
fn test_difference_from_directory() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    write_volume(input.path(), "sub1_Fixed.nii", &[2, 2, 1], vec![10.0, 12.0, 14.0, 16.0]);
    write_volume(input.path(), "sub1_Subtract.nii", &[2, 2, 1], vec![1.0; 4]);
    write_volume(input.path(), "sub2_Fixed.nii", &[2, 2, 1], vec![0.0; 4]);
    let center = write_volume(output.path(), "center.nii", &[2, 2, 1], vec![1.0, 1.0, 0.0, 0.0]);
    let brain = write_volume(output.path(), "brain.nii", &[2, 2, 1], vec![1.0, 1.0, 1.0, 0.0]);

    let stems = Stems::new("Fixed", "Subtract");
    let all = list_nifti_files(input.path()).unwrap();
    let matched = pair_by_stem(
        &filter_by_stem(&all, &stems.fixed),
        &filter_by_stem(&all, &stems.subtract),
        &stems,
    )
    .unwrap();
    assert_eq!(matched.pairs.len(), 1);
    assert_eq!(matched.unmatched.len(), 1);

    let out_dir = output.path().join("diffs");
    let config = DifferenceConfig::new(&out_dir)
        .center_with(&center)
        .mask_with(&brain);
    let pairs = matched.pairs.into_pairs();
    let report = run_difference_batch(&NiftiStore, &pairs, &config).unwrap();

    let written = &report.outputs[0];
    assert_eq!(
        written.path,
        out_dir.join("sub1_Fixed_minus_sub1_Subtract_difference.nii.gz")
    );
    assert_eq!(written.center_mean, Some(10.0));
    // [9, 11, 13, 15] - 10, then zeroed outside the brain mask
    assert_eq!(read_values(&written.path), vec![-1.0, 1.0, 3.0, 0.0]);
}

#[test]
fn test_difference_shape_mismatch_is_per_pair() {
    let dir = tempdir().unwrap();
    let pairs = vec![
        DifferencePair {
            fixed: write_volume(dir.path(), "a_Fixed.nii", &[2, 2, 1], vec![1.0; 4]),
            subtract: write_volume(dir.path(), "a_Subtract.nii", &[4, 1, 1], vec![1.0; 4]),
        },
        DifferencePair {
            fixed: write_volume(dir.path(), "b_Fixed.nii", &[2, 1, 1], vec![3.0, 4.0]),
            subtract: write_volume(dir.path(), "b_Subtract.nii", &[2, 1, 1], vec![1.0, 1.0]),
        },
    ];
    let config = DifferenceConfig::new(dir.path().join("out"))
        .compress(false)
        .failure_policy(FailurePolicy::SkipAndContinue);
    let report = run_difference_batch(&NiftiStore, &pairs, &config).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, Error::ShapeMismatch(_)));
    assert_eq!(report.outputs.len(), 1);
    assert!(report.outputs[0]
        .path
        .ends_with("b_Fixed_minus_b_Subtract_difference.nii"));
    assert_eq!(read_values(&report.outputs[0].path), vec![2.0, 3.0]);
}

#[test]
fn test_difference_halt_is_thread_independent() {
    for threads in [1, 2] {
        let dir = tempdir().unwrap();
        let pairs = vec![
            DifferencePair {
                fixed: write_volume(dir.path(), "a_Fixed.nii", &[2, 2, 1], vec![1.0; 4]),
                subtract: write_volume(dir.path(), "a_Subtract.nii", &[4, 1, 1], vec![1.0; 4]),
            },
            DifferencePair {
                fixed: write_volume(dir.path(), "b_Fixed.nii", &[2, 1, 1], vec![3.0, 4.0]),
                subtract: write_volume(dir.path(), "b_Subtract.nii", &[2, 1, 1], vec![1.0, 1.0]),
            },
        ];
        let out = dir.path().join("out");
        let config = DifferenceConfig::new(&out).compress(false).threads(threads);

        let err = run_difference_batch(&NiftiStore, &pairs, &config).unwrap_err();
        assert!(matches!(err.root(), Error::ShapeMismatch(_)));
        assert!(
            !out.join("b_Fixed_minus_b_Subtract_difference.nii").exists(),
            "threads = {threads}"
        );
    }
}
