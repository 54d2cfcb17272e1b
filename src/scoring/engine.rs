//! Binary and package scoring
//!
//! ```text
//! score = starting_score
//!       + Σ  (value_d − mean_d) / stdev_d × stdev_coefficient_d   (present complexity values)
//!       + Σ  weight(check, outcome)    (reported outcome contains the outcome text)
//!       + addend                       (flagged or libc functions meet the blacklist)
//! ```
//!
//! Scores are derived data: they are recomputed from cached reports and the
//! schema on every run and never written back into the cache.

use crate::cache::{package_from_result_path, read_result_file, ResultCache};
use crate::config::ScoreSchema;
use crate::models::{BinaryReport, PackageResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Per-term contributions to one binary's score
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub starting_score: f64,
    pub cyclomatic_complexity: f64,
    pub cycle_cost: f64,
    pub hardening: f64,
    pub bad_functions: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.starting_score
            + self.cyclomatic_complexity
            + self.cycle_cost
            + self.hardening
            + self.bad_functions
    }
}

/// Scores for one package
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageScore {
    /// Mean of the binary scores; `None` when no binary was scorable
    pub package_score: Option<f64>,
    pub binary_scores: BTreeMap<String, f64>,
    /// Binaries excluded by the disqualification rules
    pub unscored_binaries: usize,
}

/// Scores for a whole result directory
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScoreReport {
    pub packages: BTreeMap<String, PackageScore>,
    /// Result files recording "no executables found"
    pub no_executables: usize,
    /// Packages with binaries but none scorable
    pub unscorable: usize,
    /// Result files that failed to parse, with the reason
    pub malformed: Vec<(PathBuf, String)>,
}

impl ScoreReport {
    pub fn scored(&self) -> usize {
        self.packages.len()
    }
}

/// Arithmetic mean of the present scores
pub fn score_package<I>(scores: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let (sum, count) = scores
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub struct ScoreEngine<'a> {
    schema: &'a ScoreSchema,
}

impl<'a> ScoreEngine<'a> {
    pub fn new(schema: &'a ScoreSchema) -> Self {
        Self { schema }
    }

    /// A binary is scored only if it reported hardening outcomes and none of
    /// them is a disqualifying test name
    pub fn is_scorable(&self, report: &BinaryReport) -> bool {
        !report.hardening_check.is_empty()
            && !report.hardening_check.keys().any(|key| {
                self.schema
                    .disqualifying_checks
                    .iter()
                    .any(|d| d.trim() == key.trim())
            })
    }

    pub fn score_binary(&self, report: &BinaryReport) -> Option<f64> {
        self.breakdown(report).map(|b| b.total())
    }

    pub fn breakdown(&self, report: &BinaryReport) -> Option<ScoreBreakdown> {
        if !self.is_scorable(report) {
            return None;
        }

        let mut breakdown = ScoreBreakdown {
            starting_score: self.schema.starting_score,
            ..Default::default()
        };

        // Error markers carry no metrics and contribute nothing
        if let Some(metrics) = report.complexity.metrics() {
            let stats = &self.schema.complexity;
            if let Some(cc) = metrics.cyclomatic_complexity {
                breakdown.cyclomatic_complexity =
                    stats.cyclomatic_complexity.contribution(cc as f64);
            }
            if let Some(cost) = metrics.cycle_cost {
                breakdown.cycle_cost = stats.cycle_cost.contribution(cost as f64);
            }
        }

        for (check, outcome, weight) in self.schema.hardening_weights() {
            if report
                .outcome_for(check)
                .is_some_and(|reported| reported.contains(outcome))
            {
                breakdown.hardening += weight;
            }
        }

        if self.uses_bad_functions(report) {
            breakdown.bad_functions = self.schema.bad_functions.addend;
        }

        Some(breakdown)
    }

    /// Whether flagged or libc functions overlap the blacklist
    fn uses_bad_functions(&self, report: &BinaryReport) -> bool {
        let blacklist = &self.schema.bad_functions.functions;
        let flagged = report.report_functions.iter().map(|f| f.trim());
        let libc = report
            .find_libc_functions
            .iter()
            .flatten()
            .map(|f| f.trim());
        flagged.chain(libc).any(|f| blacklist.contains(f))
    }

    /// Score one cached result; `None` for packages without executables
    pub fn score_result(&self, result: &PackageResult) -> Option<PackageScore> {
        let binaries = result.binaries()?;

        let mut binary_scores = BTreeMap::new();
        let mut unscored_binaries = 0;
        for (key, report) in binaries {
            match self.score_binary(report) {
                Some(score) => {
                    binary_scores.insert(key.clone(), score);
                }
                None => {
                    debug!("Not scoring {}: disqualified", key);
                    unscored_binaries += 1;
                }
            }
        }

        Some(PackageScore {
            package_score: score_package(binary_scores.values().copied().map(Some)),
            binary_scores,
            unscored_binaries,
        })
    }

    /// Score every result file in the cache
    pub fn score_directory(&self, cache: &ResultCache) -> ScoreReport {
        let mut report = ScoreReport::default();

        for path in cache.result_files() {
            let Some(package) = package_from_result_path(&path) else {
                continue;
            };
            debug!("Scoring {}", path.display());

            let result = match read_result_file(&path) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Skipping malformed result {}: {}", path.display(), e);
                    report.malformed.push((path, e.to_string()));
                    continue;
                }
            };

            match self.score_result(&result) {
                None => report.no_executables += 1,
                Some(score) if score.package_score.is_none() => report.unscorable += 1,
                Some(score) => {
                    report.packages.insert(package, score);
                }
            }
        }

        report
    }
}
