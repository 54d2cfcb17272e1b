//! Core data models for hardscore
//!
//! These are the on-disk shapes of the result cache: one [`PackageResult`]
//! per package, holding a [`BinaryReport`] per binary found in its payload.
//! Only the layout hardscore itself writes is read back. Result files in any
//! other shape are counted as malformed by the scorer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Value of `results` when a package ships no ELF objects
pub const NO_EXECUTABLES_MARKER: &str = "no elfs found";

/// Prefix of the complexity error marker
pub const COMPLEXITY_FAILED_PREFIX: &str = "failed: ";

/// One cached result file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageResult {
    pub metadata: PackageMetadata,
    pub results: PackageResults,
}

impl PackageResult {
    pub fn no_executables(metadata: PackageMetadata) -> Self {
        Self {
            metadata,
            results: PackageResults::NoExecutables(NO_EXECUTABLES_MARKER.to_string()),
        }
    }

    pub fn with_binaries(metadata: PackageMetadata, binaries: BTreeMap<String, BinaryReport>) -> Self {
        Self {
            metadata,
            results: PackageResults::Binaries(binaries),
        }
    }

    /// Binary reports, or `None` for a package without executables
    pub fn binaries(&self) -> Option<&BTreeMap<String, BinaryReport>> {
        match &self.results {
            PackageResults::Binaries(map) => Some(map),
            PackageResults::NoExecutables(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PackageResults {
    Binaries(BTreeMap<String, BinaryReport>),
    NoExecutables(String),
}

/// Package header fields as reported by `rpm -qip`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    #[serde(rename = "Description")]
    pub description: String,
}

impl PackageMetadata {
    pub fn unparsed() -> Self {
        Self {
            fields: BTreeMap::new(),
            description: "unable to parse package metadata".to_string(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Raw findings for a single binary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryReport {
    /// Owning package
    pub rpm: String,
    /// Path relative to the extraction root
    pub filename: String,
    /// `hardening-check` test name -> outcome
    #[serde(rename = "hardening-check")]
    pub hardening_check: BTreeMap<String, String>,
    /// Functions flagged by `hardening-check -R`
    #[serde(rename = "report-functions")]
    pub report_functions: Vec<String>,
    /// libc functions found by `hardening-check -F`
    #[serde(
        rename = "find-libc-functions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub find_libc_functions: Option<Vec<String>>,
    pub complexity: ComplexityRecord,
}

impl BinaryReport {
    /// Outcome recorded for a hardening check.
    ///
    /// Older result files kept the leading space `hardening-check` prints
    /// before each test name, so keys are also compared trimmed.
    pub fn outcome_for(&self, check: &str) -> Option<&str> {
        let check = check.trim();
        self.hardening_check
            .get(check)
            .or_else(|| {
                self.hardening_check
                    .iter()
                    .find(|(key, _)| key.trim() == check)
                    .map(|(_, outcome)| outcome)
            })
            .map(String::as_str)
    }
}

/// Complexity section, keyed by the analysis that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityRecord {
    pub r2aa: ComplexityOutcome,
}

impl ComplexityRecord {
    pub fn measured(metrics: ComplexityMetrics) -> Self {
        Self {
            r2aa: ComplexityOutcome::Measured(metrics),
        }
    }

    pub fn failed(reason: impl std::fmt::Display) -> Self {
        Self {
            r2aa: ComplexityOutcome::Failed(format!("{COMPLEXITY_FAILED_PREFIX}{reason}")),
        }
    }

    pub fn metrics(&self) -> Option<&ComplexityMetrics> {
        match &self.r2aa {
            ComplexityOutcome::Measured(m) => Some(m),
            ComplexityOutcome::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.r2aa, ComplexityOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComplexityOutcome {
    Measured(ComplexityMetrics),
    Failed(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    #[serde(rename = "afCc")]
    pub cyclomatic_complexity: Option<i64>,
    #[serde(rename = "afC")]
    pub cycle_cost: Option<i64>,
}

/// How complexity is measured for a binary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryKind {
    /// `*.so` or versioned `*.so.N`: worst function wins
    SharedLibrary,
    /// `*.a`: one aggregate value
    StaticArchive,
    /// Anything else: measured at `main`
    Executable,
}

impl BinaryKind {
    pub fn from_path(path: &Path) -> Self {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        if name.ends_with(".so") || name.contains(".so.") {
            BinaryKind::SharedLibrary
        } else if name.ends_with(".a") || name.contains(".a.") {
            BinaryKind::StaticArchive
        } else {
            BinaryKind::Executable
        }
    }
}

impl std::fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryKind::SharedLibrary => write!(f, "shared library"),
            BinaryKind::StaticArchive => write!(f, "static archive"),
            BinaryKind::Executable => write!(f, "executable"),
        }
    }
}

/// Map key for a binary: its relative path with `.` replaced by `_`
pub fn binary_key(relative: &str) -> String {
    relative.replace('.', "_")
}
