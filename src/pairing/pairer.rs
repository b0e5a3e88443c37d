//! Fixed/subtract matching by stem substitution.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One unit of difference work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DifferencePair {
    /// Minuend volume.
    pub fixed: PathBuf,
    /// Subtrahend volume.
    pub subtract: PathBuf,
}

impl DifferencePair {
    /// Short label used in logs and failure reports.
    pub fn label(&self) -> String {
        format!("{} - {}", file_name(&self.fixed), file_name(&self.subtract))
    }
}

/// The substrings distinguishing fixed files from their subtract partners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stems {
    /// Substring present in fixed file names (e.g. `"Fixed"`).
    pub fixed: String,
    /// Replacement naming the partner (e.g. `"Subtract"`).
    pub subtract: String,
}

impl Stems {
    /// Build a stem pair.
    pub fn new(fixed: impl Into<String>, subtract: impl Into<String>) -> Self {
        Self {
            fixed: fixed.into(),
            subtract: subtract.into(),
        }
    }

    /// Expected partner name: the first occurrence of the fixed stem
    /// replaced by the subtract stem. `None` when the stem is absent.
    pub fn partner_name(&self, fixed_name: &str) -> Option<String> {
        fixed_name
            .contains(self.fixed.as_str())
            .then(|| fixed_name.replacen(self.fixed.as_str(), &self.subtract, 1))
    }
}

/// Fixed -> subtract mapping keyed by exact fixed file name, iterated in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct PairMap {
    pairs: Vec<DifferencePair>,
    by_fixed_name: HashMap<String, usize>,
}

impl PairMap {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair unless its fixed name is already mapped. Returns whether
    /// the pair was inserted.
    pub fn insert(&mut self, pair: DifferencePair) -> bool {
        let key = file_name(&pair.fixed);
        if self.by_fixed_name.contains_key(&key) {
            return false;
        }
        self.by_fixed_name.insert(key, self.pairs.len());
        self.pairs.push(pair);
        true
    }

    /// Pair for an exact fixed file name.
    pub fn get(&self, fixed_name: &str) -> Option<&DifferencePair> {
        self.by_fixed_name.get(fixed_name).map(|&i| &self.pairs[i])
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when nothing matched.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &DifferencePair> {
        self.pairs.iter()
    }

    /// Consume into the ordered pairs.
    pub fn into_pairs(self) -> Vec<DifferencePair> {
        self.pairs
    }
}

/// Result of stem matching.
#[derive(Debug, Clone)]
pub struct StemMatch {
    /// Matched pairs in fixed-file order.
    pub pairs: PairMap,
    /// Fixed files skipped for want of a partner.
    pub unmatched: Vec<PathBuf>,
}

/// Match each fixed file to the subtract file named by stem substitution.
///
/// Only exact file-name equality counts as a match. Fixed files without a
/// partner are warned about and skipped; an empty result is
/// [`Error::NoPairsFound`].
pub fn pair_by_stem(fixed: &[PathBuf], subtract: &[PathBuf], stems: &Stems) -> Result<StemMatch> {
    if stems.fixed.is_empty() {
        return Err(Error::Configuration("fixed stem must not be empty".into()));
    }

    let mut subtract_by_name: HashMap<String, &PathBuf> = HashMap::with_capacity(subtract.len());
    for path in subtract {
        subtract_by_name.entry(file_name(path)).or_insert(path);
    }

    let mut pairs = PairMap::new();
    let mut unmatched = Vec::new();
    for path in fixed {
        let name = file_name(path);
        let Some(expected) = stems.partner_name(&name) else {
            log::warn!("{name} does not contain stem '{}'; skipping", stems.fixed);
            unmatched.push(path.clone());
            continue;
        };
        match subtract_by_name.get(&expected) {
            Some(&partner) => {
                let inserted = pairs.insert(DifferencePair {
                    fixed: path.clone(),
                    subtract: partner.clone(),
                });
                if !inserted {
                    log::warn!("{name} selected more than once; keeping the first pairing");
                }
            }
            None => {
                log::warn!("no matching subtract file for {name} (expected {expected})");
                unmatched.push(path.clone());
            }
        }
    }

    if pairs.is_empty() {
        return Err(Error::NoPairsFound {
            fixed_stem: stems.fixed.clone(),
            subtract_stem: stems.subtract.clone(),
        });
    }
    log::debug!("matched {} pairs, {} unmatched", pairs.len(), unmatched.len());
    Ok(StemMatch { pairs, unmatched })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
