//! Per-pair volumetric arithmetic.
//!
//! ```text
//!   image + mask ──► statistic::masked_mean ──► results::ResultRecord
//!
//!   fixed, subtract ──► difference::DifferencePipeline
//!                         subtract ─► [center] ─► [mask outside] ─► derived image
//! ```

pub mod difference;
pub mod results;
pub mod statistic;

pub use difference::{output_name, DifferencePipeline, DifferenceResult, Stage};
pub use results::{ResultAccumulator, ResultRecord};
pub use statistic::masked_mean;
