//! CLI command definitions and handlers

mod doctor;
mod init;
mod scan;
mod score;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate the job count (1-64)
fn parse_jobs(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("jobs must be at least 1".to_string())
    } else if n > 64 {
        Err("jobs cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// Parse a timeout in seconds; 0 would fail every analysis
fn parse_timeout(s: &str) -> Result<u64, String> {
    let secs: u64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number of seconds", s))?;
    if secs == 0 {
        Err("timeout must be at least 1 second".to_string())
    } else {
        Ok(secs)
    }
}

/// hardscore - hardening assessment for packaged binaries
#[derive(Parser, Debug)]
#[command(name = "hardscore")]
#[command(
    version,
    about = "Scan the binaries shipped in a package repository for hardening and complexity, then score them",
    long_about = "hardscore unpacks every package in a repository tree, runs hardening-check \
and radare2 against each binary it ships, and caches one JSON result per package. \
Packages with a cached result are skipped, so an interrupted scan resumes where it stopped.\n\n\
Run without a subcommand to scan:\n  \
hardscore <OUTPUT_DIR> <REPO_DIR> <SWAP_PATH>",
    subcommand_negates_reqs = true,
    after_help = "\
Examples:
  hardscore out/ /srv/mirror/fedora /tmp/hardscore     Scan a mirror
  hardscore out/ /srv/mirror/fedora /tmp/hs -j 8       Scan 8 packages at a time
  hardscore score out/ --schema scoring.toml           Score cached results
  hardscore score out/ --format json -o scores.json    JSON scores for scripting
  hardscore init                                       Write example config files
  hardscore doctor                                     Check external tools"
)]
pub struct Cli {
    /// Directory for cached per-package results
    #[arg(required = true)]
    pub output_dir: Option<PathBuf>,

    /// Package repository to scan
    #[arg(required = true)]
    pub repo_dir: Option<PathBuf>,

    /// Scratch directory for extraction (cleared at startup)
    #[arg(required = true)]
    pub swap_path: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Scan settings file (default: ~/.config/hardscore/config.toml)
    #[arg(long, global = true, env = "HARDSCORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Packages scanned in parallel (1-64)
    #[arg(long, short = 'j', value_parser = parse_jobs)]
    pub jobs: Option<usize>,

    /// Seconds before a complexity analysis is abandoned
    #[arg(long, value_parser = parse_timeout)]
    pub timeout: Option<u64>,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score cached scan results
    #[command(after_help = "\
Without --schema, ./scoring.toml is used when present, otherwise the built-in
example schema (see `hardscore init`).")]
    Score {
        /// Directory of cached results written by a scan
        output_dir: PathBuf,

        /// Score schema (.toml or .json)
        #[arg(long, short = 's')]
        schema: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, short = 'f', default_value = "text", value_parser = ["text", "json"])]
        format: String,

        /// Output file path (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Write example scoring.toml and hardscore.toml files
    Init {
        /// Directory to write into
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Check that the external tools are installed
    Doctor,
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Score {
            output_dir,
            schema,
            format,
            output,
        }) => score::run(&output_dir, schema.as_deref(), &format, output.as_deref()),

        Some(Commands::Init { path }) => init::run(&path),

        Some(Commands::Doctor) => doctor::run(cli.config.as_deref()),

        None => {
            let missing = |name: &str| anyhow!("missing required argument <{}>", name);
            scan::run(scan::ScanOptions {
                output_dir: cli.output_dir.ok_or_else(|| missing("OUTPUT_DIR"))?,
                repo_dir: cli.repo_dir.ok_or_else(|| missing("REPO_DIR"))?,
                swap_path: cli.swap_path.ok_or_else(|| missing("SWAP_PATH"))?,
                config: cli.config,
                jobs: cli.jobs,
                timeout: cli.timeout,
                no_progress: cli.no_progress,
            })
        }
    }
}
