//! Turning selected file collections into units of work.
//!
//! - [`pairer`]: fixed/subtract matching by file-name stem substitution.
//! - [`expander`]: image/mask alignment by position, broadcast or cross product.

pub mod expander;
pub mod pairer;

pub use expander::{expand, CountMismatch, ExpansionPlan, Pairing};
pub use pairer::{pair_by_stem, DifferencePair, PairMap, StemMatch, Stems};
