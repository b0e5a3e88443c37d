//! Per-pair mean records and their CSV sink.

use crate::error::Result;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const COLUMNS: [&str; 3] = ["ImageFile", "MaskFile", "MeanValue"];

/// One row of the result table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    #[serde(rename = "ImageFile")]
    pub image_path: String,
    #[serde(rename = "MaskFile")]
    pub mask_path: String,
    /// NaN when the mask selected no finite voxels.
    #[serde(rename = "MeanValue")]
    pub mean_value: f64,
}

impl ResultRecord {
    /// Record for one image/mask pairing.
    pub fn new(image: &Path, mask: &Path, mean_value: f64) -> Self {
        Self {
            image_path: image.display().to_string(),
            mask_path: mask.display().to_string(),
            mean_value,
        }
    }
}

/// Append-only, order-preserving collection of records.
#[derive(Debug, Clone, Default)]
pub struct ResultAccumulator {
    records: Vec<ResultRecord>,
}

impl ResultAccumulator {
    /// Empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record after every existing one.
    pub fn push(&mut self, record: ResultRecord) {
        self.records.push(record);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when no record has been pushed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Consume the accumulator, keeping insertion order.
    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }

    /// Write the header row and one row per record.
    ///
    /// The header is written even when there are no records.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        wtr.write_record(COLUMNS)?;
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// [`write_csv`](Self::write_csv) to a new file at `path`.
    pub fn write_csv_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        self.write_csv(file)
    }
}

impl Extend<ResultRecord> for ResultAccumulator {
    fn extend<I: IntoIterator<Item = ResultRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl FromIterator<ResultRecord> for ResultAccumulator {
    fn from_iter<I: IntoIterator<Item = ResultRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
