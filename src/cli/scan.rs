//! Scan command - walk a repository and cache a result per package

use crate::cache::ResultCache;
use crate::config::ScanConfig;
use crate::extract::{prepare_workspace, RpmExtractor};
use crate::pipeline::{PackageOutcome, Pipeline};
use crate::scan::Collector;
use crate::tools::find_program;
use crate::walker::RepositoryWalker;
use anyhow::{bail, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct ScanOptions {
    pub output_dir: PathBuf,
    pub repo_dir: PathBuf,
    pub swap_path: PathBuf,
    pub config: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
    pub no_progress: bool,
}

pub fn run(opts: ScanOptions) -> Result<()> {
    let start = Instant::now();

    let mut config = ScanConfig::load(opts.config.as_deref())?;
    if let Some(jobs) = opts.jobs {
        config.jobs = jobs;
    }
    if let Some(secs) = opts.timeout {
        config.complexity_timeout_secs = secs;
    }
    config.validate()?;
    check_tools(&mut config)?;

    let cache = ResultCache::new(&opts.output_dir);
    let walker = RepositoryWalker::new(&opts.repo_dir, &cache)
        .with_context(|| format!("Cannot scan {}", opts.repo_dir.display()))?;

    std::fs::create_dir_all(&opts.output_dir)
        .with_context(|| format!("Failed to create {}", opts.output_dir.display()))?;
    let cleared = prepare_workspace(&opts.swap_path)
        .with_context(|| format!("Failed to prepare {}", opts.swap_path.display()))?;
    if cleared > 0 {
        info!("Cleared {} leftover entries from {}", cleared, opts.swap_path.display());
    }

    let extractor = RpmExtractor::new(&config.tools).with_timeout(config.tool_timeout());
    let collector = Collector::from_config(&config);
    let pipeline =
        Pipeline::new(&extractor, &collector, &cache, &opts.swap_path).with_jobs(config.jobs);

    let progress = (!opts.no_progress && console::Term::stderr().is_term()).then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(spinner_style());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Walking repository...");
        spinner
    });

    let summary = pipeline.run(&walker, |candidate, outcome| {
        if let Some(spinner) = &progress {
            spinner.inc(1);
            let status = match outcome {
                PackageOutcome::Scanned { binaries, .. } => format!("{} binaries", binaries),
                PackageOutcome::NoExecutables => "no executables".to_string(),
                PackageOutcome::Failed(_) => "failed".to_string(),
            };
            spinner.set_message(format!("{} ({})", candidate.name, status));
        }
    })?;

    if let Some(spinner) = progress {
        spinner.finish_and_clear();
    }

    println!(
        "\n{} Scan finished in {:.1}s",
        style("✓").green(),
        start.elapsed().as_secs_f64()
    );
    println!("  {} {}", style("Scanned:").bold(), summary.scanned);
    println!("  {} {}", style("No executables:").bold(), summary.no_executables);
    println!("  {} {}", style("Cached:").bold(), summary.skipped);
    println!(
        "  {} {} ({} incomplete)",
        style("Binaries:").bold(),
        summary.binaries,
        summary.degraded_binaries
    );

    if !summary.is_clean() {
        println!("  {} {}", style("Failed:").red().bold(), summary.failed);
        eprintln!(
            "{} {} packages failed; rerun to retry them",
            style("!").yellow(),
            summary.failed
        );
        std::process::exit(summary.exit_code());
    }

    Ok(())
}

/// hardening-check is required; the rest only degrade results
fn check_tools(config: &mut ScanConfig) -> Result<()> {
    match find_program(&config.tools.hardening_check) {
        Some(path) => config.tools.hardening_check = path,
        None => bail!(
            "hardening-check not found ({}). Install devscripts or set HARDSCORE_HARDENING_CHECK",
            config.tools.hardening_check.display()
        ),
    }

    for (name, program) in config.tools.all() {
        if find_program(program).is_none() {
            warn!("{} not found ({}); affected results will be incomplete", name, program.display());
        }
    }
    Ok(())
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} [{pos} packages] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
