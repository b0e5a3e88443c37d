use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use volpair::batch::{run_difference_batch, run_mean_batch, PairFailure};
use volpair::config::{DifferenceConfig, FailurePolicy, MeanConfig};
use volpair::pairing::{expand, pair_by_stem, ExpansionPlan, Stems};
use volpair::selection::{filter_by_stem, list_nifti_files, require_nifti};
use volpair::store::NiftiStore;
use volpair::Error;

mod cli;
mod prompt;

use cli::{Cli, Commands, DifferenceArgs, MeanArgs, RunArgs};
use prompt::Prompter;

const DEFAULT_FIXED_STEM: &str = "Fixed";
const DEFAULT_SUBTRACT_STEM: &str = "Subtract";

/// The preview was declined.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct Declined(String);

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let prompter = Prompter::new(cli.yes);
    let outcome = match cli.command {
        Commands::Mean(args) => mean(args, &prompter),
        Commands::Difference(args) => difference(args, &prompter),
    };

    match outcome {
        Ok(code) => code,
        Err(err) if is_cancellation(&err) => {
            eprintln!("cancelled: {err}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn is_cancellation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Declined>().is_some()
        || err
            .downcast_ref::<Error>()
            .is_some_and(Error::is_cancellation)
}

fn policy(run: RunArgs) -> FailurePolicy {
    if run.keep_going {
        FailurePolicy::SkipAndContinue
    } else {
        FailurePolicy::Halt
    }
}

/// Explicit files, else a directory listing, else a prompted directory.
fn select(
    files: Vec<PathBuf>,
    dir: Option<PathBuf>,
    what: &str,
    prompter: &Prompter,
) -> anyhow::Result<Vec<PathBuf>> {
    let files = if !files.is_empty() {
        files
    } else {
        let dir = match dir {
            Some(dir) => Some(dir),
            None => prompter.ask_path(&format!("Directory containing the {what}"))?,
        };
        match dir {
            Some(dir) => list_nifti_files(&dir)?,
            None => Vec::new(),
        }
    };
    Ok(require_nifti(files, what)?)
}

fn confirm_preview(prompter: &Prompter, count: usize, noun: &str) -> anyhow::Result<()> {
    if prompter.confirm(&format!("Process {count} {noun}?"))? {
        Ok(())
    } else {
        Err(Declined(format!("{count} {noun} not processed")).into())
    }
}

fn report_failures(failures: &[PairFailure]) -> ExitCode {
    if failures.is_empty() {
        return ExitCode::SUCCESS;
    }
    for failure in failures {
        eprintln!("failed: {}: {}", failure.label, failure.error);
    }
    eprintln!("{} pair(s) failed", failures.len());
    ExitCode::FAILURE
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn mean(args: MeanArgs, prompter: &Prompter) -> anyhow::Result<ExitCode> {
    let images = select(args.images, args.images_dir, "images", prompter)?;
    let masks = select(args.masks, args.masks_dir, "masks", prompter)?;

    let plan = ExpansionPlan::for_counts(images.len(), masks.len())?;
    log::debug!("expansion plan: {plan:?}");
    let cross_product_confirmed = match plan.confirmation() {
        Some(mismatch) => prompter.confirm(&mismatch.to_string())?,
        None => false,
    };
    let pairings = expand(&images, &masks, cross_product_confirmed)?;

    println!("{:>4}  {:<40}  MASK", "#", "IMAGE");
    for (i, pairing) in pairings.iter().enumerate() {
        println!(
            "{:>4}  {:<40}  {}",
            i + 1,
            file_name(&pairing.image),
            file_name(&pairing.mask)
        );
    }
    confirm_preview(prompter, pairings.len(), "pairings")?;

    let output = match args.output {
        Some(path) => path,
        None => prompter
            .ask_path("Save results to (CSV)")?
            .ok_or_else(|| Error::SaveCancelled("no result file given".into()))?,
    };

    let config = MeanConfig::default()
        .confirm_cross_product(cross_product_confirmed)
        .reslice_masks(args.reslice_masks)
        .failure_policy(policy(args.run))
        .threads(args.run.jobs);
    let report = run_mean_batch(&NiftiStore, &pairings, &config)?;

    report
        .results
        .write_csv_path(&output)
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "wrote {} result(s) to {}",
        report.results.len(),
        output.display()
    );
    Ok(report_failures(&report.failures))
}

fn difference(args: DifferenceArgs, prompter: &Prompter) -> anyhow::Result<ExitCode> {
    let stems = Stems::new(
        match args.fixed_stem {
            Some(stem) => stem,
            None => prompter.ask_text("Fixed file stem", DEFAULT_FIXED_STEM)?,
        },
        match args.subtract_stem {
            Some(stem) => stem,
            None => prompter.ask_text("Subtract file stem", DEFAULT_SUBTRACT_STEM)?,
        },
    );

    let (fixed, subtract) = if args.fixed.is_empty() {
        let all = select(Vec::new(), args.input_dir, "input files", prompter)?;
        (
            filter_by_stem(&all, &stems.fixed),
            filter_by_stem(&all, &stems.subtract),
        )
    } else {
        (args.fixed, args.subtract)
    };
    let fixed = require_nifti(fixed, "fixed files")?;
    let subtract = require_nifti(subtract, "subtract files")?;

    let matched = pair_by_stem(&fixed, &subtract, &stems)?;
    if !matched.unmatched.is_empty() {
        log::warn!("{} fixed file(s) had no partner", matched.unmatched.len());
    }
    let pairs = matched.pairs.into_pairs();

    let center_mask = optional_mask(
        args.center,
        args.center_mask,
        "Center differences on a mask mean?",
        "centering mask",
        prompter,
    )?;
    let output_mask = optional_mask(
        args.mask,
        args.mask_path,
        "Zero differences outside a mask?",
        "output mask",
        prompter,
    )?;

    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => prompter
            .ask_path("Output directory")?
            .ok_or_else(|| Error::SaveCancelled("no output directory given".into()))?,
    };

    println!("{:>4}  {:<40}  SUBTRACT", "#", "FIXED");
    for (i, pair) in pairs.iter().enumerate() {
        println!(
            "{:>4}  {:<40}  {}",
            i + 1,
            file_name(&pair.fixed),
            file_name(&pair.subtract)
        );
    }
    confirm_preview(prompter, pairs.len(), "pairs")?;

    let mut config = DifferenceConfig::new(&output_dir)
        .compress(!args.no_compress)
        .failure_policy(policy(args.run))
        .threads(args.run.jobs);
    config.center_mask = center_mask;
    config.output_mask = output_mask;

    let report = run_difference_batch(&NiftiStore, &pairs, &config)?;
    for output in &report.outputs {
        match output.center_mean {
            Some(mean) => println!("{} (centering mean {mean})", output.path.display()),
            None => println!("{}", output.path.display()),
        }
    }
    Ok(report_failures(&report.failures))
}

/// Resolve an optional mask stage from its flag, its path and the terminal.
fn optional_mask(
    enabled: bool,
    path: Option<PathBuf>,
    question: &str,
    what: &str,
    prompter: &Prompter,
) -> anyhow::Result<Option<PathBuf>> {
    if path.is_some() {
        return Ok(path);
    }
    if !enabled && !prompter.ask_yes_no(question)? {
        return Ok(None);
    }
    let path = prompter
        .ask_path(&format!("Path to the {what}"))?
        .ok_or_else(|| Error::no_selection(format!("no {what} given")))?;
    Ok(Some(path))
}
