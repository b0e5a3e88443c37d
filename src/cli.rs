use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "volpair", version, about = "Masked means and difference volumes for NIfTI images", long_about = None)]
pub struct Cli {
    /// Log per-pair details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer yes to every confirmation (preview, cross product)
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mean image intensity inside each mask, written as CSV
    Mean(MeanArgs),
    /// Voxelwise fixed - subtract volumes matched by file-name stem
    Difference(DifferenceArgs),
}

#[derive(Args, Debug, Clone, Copy)]
pub struct RunArgs {
    /// Record failing pairs and continue instead of stopping
    #[arg(long)]
    pub keep_going: bool,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,
}

#[derive(Args, Debug)]
pub struct MeanArgs {
    /// Image files
    #[arg(long, value_name = "FILE", num_args = 1.., conflicts_with = "images_dir")]
    pub images: Vec<PathBuf>,

    /// Directory whose NIfTI files are the images
    #[arg(long, value_name = "DIR")]
    pub images_dir: Option<PathBuf>,

    /// Mask files
    #[arg(long, value_name = "FILE", num_args = 1.., conflicts_with = "masks_dir")]
    pub masks: Vec<PathBuf>,

    /// Directory whose NIfTI files are the masks
    #[arg(long, value_name = "DIR")]
    pub masks_dir: Option<PathBuf>,

    /// Result table
    #[arg(short, long, value_name = "CSV")]
    pub output: Option<PathBuf>,

    /// Resample masks onto the image grid when shapes differ
    #[arg(long)]
    pub reslice_masks: bool,

    #[command(flatten)]
    pub run: RunArgs,
}

#[derive(Args, Debug)]
pub struct DifferenceArgs {
    /// Directory holding both fixed and subtract files
    #[arg(short, long, value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Fixed files (instead of --input-dir)
    #[arg(long, value_name = "FILE", num_args = 1.., conflicts_with = "input_dir", requires = "subtract")]
    pub fixed: Vec<PathBuf>,

    /// Subtract files (instead of --input-dir)
    #[arg(long, value_name = "FILE", num_args = 1.., conflicts_with = "input_dir", requires = "fixed")]
    pub subtract: Vec<PathBuf>,

    /// Substring identifying fixed files
    #[arg(long, value_name = "STEM")]
    pub fixed_stem: Option<String>,

    /// Replacement naming the subtract partner
    #[arg(long, value_name = "STEM")]
    pub subtract_stem: Option<String>,

    /// Where difference volumes are written
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Subtract the mean inside a mask from each difference
    #[arg(long)]
    pub center: bool,

    /// Centering mask (implies --center)
    #[arg(long, value_name = "FILE")]
    pub center_mask: Option<PathBuf>,

    /// Zero each difference outside a mask
    #[arg(long)]
    pub mask: bool,

    /// Output mask (implies --mask)
    #[arg(long, value_name = "FILE")]
    pub mask_path: Option<PathBuf>,

    /// Write .nii instead of .nii.gz
    #[arg(long)]
    pub no_compress: bool,

    #[command(flatten)]
    pub run: RunArgs,
}
