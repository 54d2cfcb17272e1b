//! Scan pipeline
//!
//! Drives the scan end to end:
//! 1. Walk the repository for packages without a cached result
//! 2. Extract each package into its own workspace
//! 3. Analyze every binary in the payload
//! 4. Write one result file per package
//!
//! Failures are isolated at the package boundary: a package that cannot be
//! extracted, described or cached is logged, counted and left without a
//! result file so the next run picks it up again.

use crate::cache::ResultCache;
use crate::error::ScanResult;
use crate::extract::{PackageExtractor, Workspace};
use crate::models::{binary_key, BinaryReport, PackageResult};
use crate::scan::BinaryAnalyzer;
use crate::walker::{PackageCandidate, RepositoryWalker};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Exit code for a run that finished but left packages unscanned
pub const PARTIAL_FAILURE_EXIT_CODE: i32 = 3;

/// What happened to one package
#[derive(Debug, Clone, PartialEq)]
pub enum PackageOutcome {
    /// Result file written with `binaries` reports, `degraded` of them partial
    Scanned { binaries: usize, degraded: usize },
    /// Result file written with the "no executables" marker
    NoExecutables,
    /// No result file written
    Failed(String),
}

pub struct Pipeline<'a> {
    extractor: &'a dyn PackageExtractor,
    analyzer: &'a dyn BinaryAnalyzer,
    cache: &'a ResultCache,
    scratch_root: PathBuf,
    jobs: usize,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        extractor: &'a dyn PackageExtractor,
        analyzer: &'a dyn BinaryAnalyzer,
        cache: &'a ResultCache,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            extractor,
            analyzer,
            cache,
            scratch_root: scratch_root.into(),
            jobs: 1,
        }
    }

    /// Number of packages scanned concurrently (at least 1)
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Scan every candidate the walker yields.
    ///
    /// `on_package` is called once per package as soon as it finishes, from
    /// whichever worker thread processed it.
    pub fn run<F>(&self, walker: &RepositoryWalker<'_>, on_package: F) -> ScanResult<RunSummary>
    where
        F: Fn(&PackageCandidate, &PackageOutcome) + Sync,
    {
        let mut summary = RunSummary::default();

        if self.jobs == 1 {
            for candidate in walker.candidates() {
                let outcome = self.scan_package(&candidate);
                on_package(&candidate, &outcome);
                summary.record(&outcome);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.jobs)
                .thread_name(|i| format!("hardscore-scan-{}", i))
                .build()?;

            let outcomes: Vec<PackageOutcome> = pool.install(|| {
                walker
                    .candidates()
                    .par_bridge()
                    .map(|candidate| {
                        let outcome = self.scan_package(&candidate);
                        on_package(&candidate, &outcome);
                        outcome
                    })
                    .collect()
            });
            for outcome in &outcomes {
                summary.record(outcome);
            }
        }

        summary.skipped = walker.skipped();
        info!("Scan finished: {}", summary.summary());
        Ok(summary)
    }

    /// Scan one package, converting any package-level error into
    /// [`PackageOutcome::Failed`]
    pub fn scan_package(&self, package: &PackageCandidate) -> PackageOutcome {
        match self.process(package) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to scan {}: {}", package.name, e);
                PackageOutcome::Failed(e.to_string())
            }
        }
    }

    fn process(&self, package: &PackageCandidate) -> ScanResult<PackageOutcome> {
        debug!("Scanning {}", package.path.display());

        // Removed when it goes out of scope, on every path
        let workspace = Workspace::create(&self.scratch_root, &package.name)?;

        let binaries = self.extractor.extract(package, &workspace)?;
        let metadata = self.extractor.metadata(package, &workspace)?;

        if binaries.is_empty() {
            self.cache
                .write(&package.name, &PackageResult::no_executables(metadata))?;
            info!("{}: no executables found", package.name);
            return Ok(PackageOutcome::NoExecutables);
        }

        let mut reports = BTreeMap::new();
        let mut degraded = 0;
        for binary in &binaries {
            let report = self.analyzer.analyze(&package.name, workspace.path(), binary);
            if is_degraded(&report) {
                degraded += 1;
            }
            let key = unique_key(&reports, binary_key(&binary.relative));
            reports.insert(key, report);
        }

        let count = reports.len();
        self.cache
            .write(&package.name, &PackageResult::with_binaries(metadata, reports))?;
        info!("{}: analyzed {} binaries", package.name, count);

        Ok(PackageOutcome::Scanned {
            binaries: count,
            degraded,
        })
    }
}

/// A report missing its hardening outcomes or complexity metrics
fn is_degraded(report: &BinaryReport) -> bool {
    report.hardening_check.is_empty() || report.complexity.is_failed()
}

/// `key`, or `key_2`, `key_3`, ... when already taken.
///
/// Distinct paths can share a key once `.` becomes `_`
/// (`lib.so` and `lib_so`); neither report may be lost.
fn unique_key<V>(taken: &BTreeMap<String, V>, key: String) -> String {
    if !taken.contains_key(&key) {
        return key;
    }
    (2..)
        .map(|n| format!("{}_{}", key, n))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or(key)
}

/// Counters for one scan run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Packages with binaries, result written
    pub scanned: usize,
    /// Packages without binaries, result written
    pub no_executables: usize,
    /// Packages without a result file
    pub failed: usize,
    /// Packages skipped because a result already existed
    pub skipped: usize,
    pub binaries: usize,
    /// Binaries whose report is incomplete
    pub degraded_binaries: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &PackageOutcome) {
        match outcome {
            PackageOutcome::Scanned { binaries, degraded } => {
                self.scanned += 1;
                self.binaries += binaries;
                self.degraded_binaries += degraded;
            }
            PackageOutcome::NoExecutables => self.no_executables += 1,
            PackageOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn processed(&self) -> usize {
        self.scanned + self.no_executables + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            0
        } else {
            PARTIAL_FAILURE_EXIT_CODE
        }
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} scanned", self.scanned),
            format!("{} without executables", self.no_executables),
            format!("{} failed", self.failed),
            format!("{} cached", self.skipped),
            format!("{} binaries", self.binaries),
        ];
        if self.degraded_binaries > 0 {
            parts.push(format!("{} incomplete", self.degraded_binaries));
        }
        parts.join(", ")
    }
}
