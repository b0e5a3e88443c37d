//! Per-pair loops for both workflows.
//!
//! Each unit of work yields exactly one outcome: a success in the report or
//! a [`PairFailure`]. Under [`FailurePolicy::Halt`] the first failure ends
//! the run as [`Error::Pair`] instead.
//!
//! A unit is split into a side-effect-free compute step and a commit step
//! (saving a volume). With more than one thread the compute steps run on a
//! rayon pool and the commits follow sequentially in input order, so a
//! halted run persists exactly what the single-threaded run would have:
//! the pairs before the failing one.

use crate::analysis::{masked_mean, output_name, DifferencePipeline, ResultAccumulator, ResultRecord};
use crate::config::{DifferenceConfig, FailurePolicy, MeanConfig};
use crate::error::{Error, Result};
use crate::mask::Mask;
use crate::pairing::{DifferencePair, Pairing};
use crate::store::VolumeStore;
use crate::transforms::reconcile;
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// A unit of work that failed under [`FailurePolicy::SkipAndContinue`].
#[derive(Debug)]
pub struct PairFailure {
    /// Label of the pair.
    pub label: String,
    /// What went wrong.
    pub error: Error,
}

/// Outcome of a masked-mean run.
#[derive(Debug, Default)]
pub struct MeanReport {
    /// One record per successful pairing, in pairing order.
    pub results: ResultAccumulator,
    /// Skipped pairings, in pairing order.
    pub failures: Vec<PairFailure>,
}

/// One written difference volume.
#[derive(Debug, Clone)]
pub struct DifferenceOutput {
    /// The pair it was computed from.
    pub pair: DifferencePair,
    /// Where the volume was saved.
    pub path: PathBuf,
    /// Mean removed by centering, when enabled.
    pub center_mean: Option<f64>,
}

/// Outcome of a difference run.
#[derive(Debug, Default)]
pub struct DifferenceReport {
    /// Written volumes, in pair order.
    pub outputs: Vec<DifferenceOutput>,
    /// Skipped pairs, in pair order.
    pub failures: Vec<PairFailure>,
}

/// Binarized masks shared across pairs, loaded once per path.
///
/// Only successful loads are cached; a failing mask fails every pair that
/// references it. The map is only ever inserted into, so a lock poisoned by
/// a panicking worker still holds valid entries and is used as is.
struct MaskCache {
    entries: RwLock<HashMap<PathBuf, Arc<Mask>>>,
}

impl MaskCache {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn get<S: VolumeStore>(&self, store: &S, path: &Path) -> Result<Arc<Mask>> {
        let cached = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned();
        if let Some(mask) = cached {
            return Ok(mask);
        }
        let mask = Arc::new(store.load_mask(path)?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), Arc::clone(&mask));
        Ok(mask)
    }
}

/// Compute the masked mean of every pairing.
///
/// With `reslice_masks` each mask is first reconciled to its image's grid;
/// otherwise a shape difference fails that pair with
/// [`Error::DimensionMismatch`].
pub fn run_mean_batch<S: VolumeStore>(
    store: &S,
    pairings: &[Pairing],
    config: &MeanConfig,
) -> Result<MeanReport> {
    if pairings.is_empty() {
        return Err(Error::no_selection("no image/mask pairings"));
    }
    log::debug!(
        "mean run: {} pairings, reslice_masks={}, policy={:?}, threads={}",
        pairings.len(),
        config.reslice_masks,
        config.failure_policy,
        config.threads
    );

    let masks = MaskCache::new();
    let (records, failures) = run_units(
        pairings,
        config.failure_policy,
        config.threads,
        Pairing::label,
        |pairing| {
            let image = store.load(&pairing.image)?;
            let mask = masks.get(store, &pairing.mask)?;
            let mask = if config.reslice_masks {
                reconcile(image.shape(), mask.as_ref(), &pairing.mask.display().to_string())?
            } else {
                Cow::Borrowed(mask.as_ref())
            };
            let mean = masked_mean(&image, &mask)?;
            log::info!("{}: mean = {}", pairing.label(), mean);
            Ok(ResultRecord::new(&pairing.image, &pairing.mask, mean))
        },
        |_, record| Ok(record),
    )?;

    Ok(MeanReport {
        results: records.into_iter().collect(),
        failures,
    })
}

/// Subtract every pair and write the results into `config.output_dir`.
///
/// Centering and output masks are loaded once up front; failing to load
/// either aborts the run before any pair is processed. Volumes are saved in
/// pair order, and under [`FailurePolicy::Halt`] nothing is saved for pairs
/// after the first failure, whatever the thread count.
pub fn run_difference_batch<S: VolumeStore>(
    store: &S,
    pairs: &[DifferencePair],
    config: &DifferenceConfig,
) -> Result<DifferenceReport> {
    if pairs.is_empty() {
        return Err(Error::no_selection("no fixed/subtract pairs"));
    }

    let load = |path: &Option<PathBuf>| -> Result<Option<(PathBuf, Arc<Mask>)>> {
        path.as_ref()
            .map(|p| store.load_mask(p).map(|mask| (p.clone(), Arc::new(mask))))
            .transpose()
    };
    let pipeline = DifferencePipeline::from_masks(
        load(&config.center_mask)?,
        load(&config.output_mask)?,
    );
    log::debug!(
        "difference run: {} pairs, center={}, mask={}, output_dir={}",
        pairs.len(),
        config.center_enabled(),
        config.mask_enabled(),
        config.output_dir.display()
    );

    fs::create_dir_all(&config.output_dir)?;

    let (outputs, failures) = run_units(
        pairs,
        config.failure_policy,
        config.threads,
        DifferencePair::label,
        |pair| {
            let fixed = store.load(&pair.fixed)?;
            let subtract = store.load(&pair.subtract)?;
            pipeline.run(&fixed, &subtract)
        },
        |pair, result| {
            let file_name = format!(
                "{}{}",
                output_name(&pair.fixed, &pair.subtract),
                config.output_extension()
            );
            let path = config.output_dir.join(file_name);
            store.save(&result.image, &path)?;
            log::info!("{} -> {}", pair.label(), path.display());

            Ok(DifferenceOutput {
                pair: pair.clone(),
                path,
                center_mean: result.center_mean,
            })
        },
    )?;

    Ok(DifferenceReport { outputs, failures })
}

/// Run `work` then `commit` over `units` under `policy`.
///
/// `work` may run on a pool; `commit` always runs on the calling thread, in
/// input order, and never for a unit after a halting failure.
fn run_units<T, C, R, L, F, P>(
    units: &[T],
    policy: FailurePolicy,
    threads: usize,
    label: L,
    work: F,
    commit: P,
) -> Result<(Vec<R>, Vec<PairFailure>)>
where
    T: Sync,
    C: Send,
    L: Fn(&T) -> String,
    F: Fn(&T) -> Result<C> + Sync,
    P: FnMut(&T, C) -> Result<R>,
{
    if threads == 1 {
        return settle(units, units.iter().map(&work), policy, label, commit);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Configuration(format!("cannot start worker pool: {e}")))?;
    let computed: Vec<Result<C>> = pool.install(|| units.par_iter().map(&work).collect());
    settle(units, computed.into_iter(), policy, label, commit)
}

/// Commit computed outcomes in input order, stopping or recording failures
/// according to `policy`.
fn settle<T, C, R, L, P>(
    units: &[T],
    computed: impl Iterator<Item = Result<C>>,
    policy: FailurePolicy,
    label: L,
    mut commit: P,
) -> Result<(Vec<R>, Vec<PairFailure>)>
where
    L: Fn(&T) -> String,
    P: FnMut(&T, C) -> Result<R>,
{
    let mut done = Vec::with_capacity(units.len());
    let mut failures = Vec::new();
    for (unit, outcome) in units.iter().zip(computed) {
        match outcome.and_then(|value| commit(unit, value)) {
            Ok(value) => done.push(value),
            Err(error) if policy == FailurePolicy::Halt => {
                return Err(Error::for_pair(label(unit), error));
            }
            Err(error) => {
                let label = label(unit);
                log::warn!("skipping {label}: {error}");
                failures.push(PairFailure { label, error });
            }
        }
    }
    Ok((done, failures))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nifti::{NiftiHeader, NiftiImage};
    use ndarray::{ArrayD, IxDyn};
    use std::sync::Mutex;

    /// In-memory store counting loads per path.
    #[derive(Default)]
    struct MemoryStore {
        volumes: HashMap<PathBuf, NiftiImage>,
        loads: Mutex<HashMap<PathBuf, usize>>,
        saved: Mutex<Vec<(PathBuf, NiftiImage)>>,
    }

    impl MemoryStore {
        fn with(mut self, name: &str, shape: &[usize], values: Vec<f64>) -> Self {
            let data = ArrayD::from_shape_vec(IxDyn(shape), values).unwrap();
            let image = NiftiImage::from_parts(NiftiHeader::default(), data).unwrap();
            self.volumes.insert(PathBuf::from(name), image);
            self
        }

        fn load_count(&self, name: &str) -> usize {
            self.loads
                .lock()
                .unwrap()
                .get(Path::new(name))
                .copied()
                .unwrap_or(0)
        }
    }

    impl VolumeStore for MemoryStore {
        fn load(&self, path: &Path) -> Result<NiftiImage> {
            *self
                .loads
                .lock()
                .unwrap()
                .entry(path.to_path_buf())
                .or_default() += 1;
            self.volumes.get(path).cloned().ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    path.display().to_string(),
                ))
            })
        }

        fn save(&self, image: &NiftiImage, path: &Path) -> Result<()> {
            self.saved
                .lock()
                .unwrap()
                .push((path.to_path_buf(), image.clone()));
            Ok(())
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::default()
            .with("a.nii", &[2, 1, 1], vec![1.0, 3.0])
            .with("b.nii", &[2, 1, 1], vec![10.0, 20.0])
            .with("big.nii", &[4, 1, 1], vec![1.0, 2.0, 3.0, 4.0])
            .with("m.nii", &[2, 1, 1], vec![1.0, 1.0])
            .with("first.nii", &[2, 1, 1], vec![1.0, 0.0])
    }

    #[test]
    fn test_broadcast_mask_loaded_once() {
        let store = store();
        let pairings = vec![Pairing::new("a.nii", "m.nii"), Pairing::new("b.nii", "m.nii")];
        let report = run_mean_batch(&store, &pairings, &MeanConfig::default()).unwrap();

        let means: Vec<f64> = report.results.records().iter().map(|r| r.mean_value).collect();
        assert_eq!(means, vec![2.0, 15.0]);
        assert_eq!(store.load_count("m.nii"), 1);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_halt_reports_first_failing_pair() {
        let store = store();
        let pairings = vec![
            Pairing::new("a.nii", "m.nii"),
            Pairing::new("big.nii", "m.nii"),
            Pairing::new("b.nii", "m.nii"),
        ];
        let err = run_mean_batch(&store, &pairings, &MeanConfig::default()).unwrap_err();
        assert!(err.to_string().starts_with("big.nii / m.nii"));
        assert!(matches!(err.root(), Error::DimensionMismatch { .. }));
        assert_eq!(store.load_count("b.nii"), 0);
    }

    #[test]
    fn test_skip_and_continue_records_failures() {
        let store = store();
        let pairings = vec![
            Pairing::new("a.nii", "m.nii"),
            Pairing::new("big.nii", "m.nii"),
            Pairing::new("missing.nii", "m.nii"),
            Pairing::new("b.nii", "first.nii"),
        ];
        let config = MeanConfig::default().failure_policy(FailurePolicy::SkipAndContinue);
        let report = run_mean_batch(&store, &pairings, &config).unwrap();

        assert_eq!(report.results.len() + report.failures.len(), pairings.len());
        let labels: Vec<&str> = report.failures.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, vec!["big.nii / m.nii", "missing.nii / m.nii"]);
        assert_eq!(report.results.records()[1].mean_value, 10.0);
    }

    #[test]
    fn test_reslice_masks_resolves_shape() {
        let store = store();
        let pairings = vec![Pairing::new("big.nii", "first.nii")];
        let config = MeanConfig::default().reslice_masks(true);
        let report = run_mean_batch(&store, &pairings, &config).unwrap();
        // first.nii [1, 0] on 4 voxels -> [1, 1, 0, 0]
        assert_eq!(report.results.records()[0].mean_value, 1.5);
    }

    #[test]
    fn test_parallel_keeps_order() {
        let store = store();
        let pairings: Vec<Pairing> = (0..16)
            .map(|i| Pairing::new(if i % 2 == 0 { "a.nii" } else { "b.nii" }, "m.nii"))
            .collect();
        let config = MeanConfig::default().threads(4);
        let report = run_mean_batch(&store, &pairings, &config).unwrap();

        for (i, record) in report.results.records().iter().enumerate() {
            let expected = if i % 2 == 0 { 2.0 } else { 15.0 };
            assert_eq!(record.mean_value, expected);
        }
    }

    #[test]
    fn test_difference_batch_names_and_centers() {
        let store = store();
        let pairs = vec![DifferencePair {
            fixed: PathBuf::from("b.nii"),
            subtract: PathBuf::from("a.nii"),
        }];
        let config = DifferenceConfig::new(std::env::temp_dir()).center_with("m.nii");
        let report = run_difference_batch(&store, &pairs, &config).unwrap();

        let output = &report.outputs[0];
        assert_eq!(output.center_mean, Some(13.0));
        assert!(output
            .path
            .ends_with("b_minus_a_difference.nii.gz"));

        let saved = store.saved.lock().unwrap();
        let values: Vec<f64> = saved[0].1.data().iter().copied().collect();
        assert_eq!(values, vec![-4.0, 4.0]);
    }

    fn difference_pairs(names: &[(&str, &str)]) -> Vec<DifferencePair> {
        names
            .iter()
            .map(|(fixed, subtract)| DifferencePair {
                fixed: PathBuf::from(fixed),
                subtract: PathBuf::from(subtract),
            })
            .collect()
    }

    #[test]
    fn test_parallel_halt_saves_nothing_after_failure() {
        let store = store();
        let pairs = difference_pairs(&[("big.nii", "a.nii"), ("b.nii", "a.nii")]);
        let config = DifferenceConfig::new(std::env::temp_dir()).threads(2);

        let err = run_difference_batch(&store, &pairs, &config).unwrap_err();
        assert!(err.to_string().starts_with("big.nii - a.nii"));
        assert!(matches!(err.root(), Error::ShapeMismatch(_)));
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parallel_halt_keeps_pairs_before_failure() {
        let store = store();
        let pairs = difference_pairs(&[
            ("b.nii", "a.nii"),
            ("big.nii", "a.nii"),
            ("a.nii", "b.nii"),
        ]);
        let config = DifferenceConfig::new(std::env::temp_dir()).threads(3);

        assert!(run_difference_batch(&store, &pairs, &config).is_err());
        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].0.ends_with("b_minus_a_difference.nii.gz"));
    }

    #[test]
    fn test_parallel_skip_saves_remaining_pairs() {
        let store = store();
        let pairs = difference_pairs(&[("big.nii", "a.nii"), ("b.nii", "a.nii")]);
        let config = DifferenceConfig::new(std::env::temp_dir())
            .threads(2)
            .failure_policy(FailurePolicy::SkipAndContinue);

        let report = run_difference_batch(&store, &pairs, &config).unwrap();
        assert_eq!(report.failures[0].label, "big.nii - a.nii");
        assert_eq!(report.outputs.len(), 1);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_mask_cache_survives_poisoned_lock() {
        let store = store();
        let cache = MaskCache::new();
        cache.get(&store, Path::new("m.nii")).unwrap();

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = cache.entries.write().unwrap();
            panic!("worker panicked holding the mask cache");
        }));
        assert!(poisoned.is_err());
        assert!(cache.entries.is_poisoned());

        cache.get(&store, Path::new("m.nii")).unwrap();
        cache.get(&store, Path::new("first.nii")).unwrap();
        cache.get(&store, Path::new("first.nii")).unwrap();
        assert_eq!(store.load_count("m.nii"), 1);
        assert_eq!(store.load_count("first.nii"), 1);
    }

    #[test]
    fn test_missing_center_mask_aborts_before_pairs() {
        let store = store();
        let pairs = vec![DifferencePair {
            fixed: PathBuf::from("b.nii"),
            subtract: PathBuf::from("a.nii"),
        }];
        let config = DifferenceConfig::new(std::env::temp_dir())
            .center_with("nope.nii")
            .failure_policy(FailurePolicy::SkipAndContinue);
        assert!(run_difference_batch(&store, &pairs, &config).is_err());
        assert_eq!(store.load_count("b.nii"), 0);
    }
}
