//! Per-binary analysis
//!
//! [`Collector`] assembles a [`BinaryReport`] from four tool runs:
//! 1. `hardening-check` outcomes
//! 2. `hardening-check -R` flagged functions
//! 3. `hardening-check -F` libc functions (optional)
//! 4. radare2 complexity, bounded by a timeout
//!
//! A failing step degrades only its own field. Analysis never returns an
//! error, so one bad binary cannot abort its siblings.

use crate::config::ScanConfig;
use crate::extract::Binary;
use crate::models::{BinaryReport, ComplexityRecord};
use crate::tools::{HardeningCheck, Radare2};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Produces a report for one binary
pub trait BinaryAnalyzer: Send + Sync {
    /// `workspace` is the extraction root; tool output mentioning it is noise
    fn analyze(&self, package: &str, workspace: &Path, binary: &Binary) -> BinaryReport;
}

pub struct Collector {
    hardening: HardeningCheck,
    radare2: Radare2,
    complexity_timeout: Duration,
}

impl Collector {
    pub fn new(hardening: HardeningCheck, radare2: Radare2, complexity_timeout: Duration) -> Self {
        Self {
            hardening,
            radare2,
            complexity_timeout,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            HardeningCheck::new(&config.tools.hardening_check, config.report_header_lines)
                .with_timeout(config.tool_timeout()),
            Radare2::new(&config.tools.radare2),
            config.complexity_timeout(),
        )
    }
}

impl BinaryAnalyzer for Collector {
    fn analyze(&self, package: &str, workspace: &Path, binary: &Binary) -> BinaryReport {
        debug!("Analyzing {} ({})", binary.relative, binary.kind);

        let hardening_check = self
            .hardening
            .checks(&binary.path, workspace)
            .unwrap_or_else(|e| {
                warn!("{}: hardening-check failed: {}", binary.relative, e);
                Default::default()
            });

        let report_functions = self
            .hardening
            .report_functions(&binary.path)
            .unwrap_or_else(|e| {
                warn!("{}: hardening-check -R failed: {}", binary.relative, e);
                Vec::new()
            });

        let find_libc_functions = self
            .hardening
            .libc_functions(&binary.path)
            .unwrap_or_else(|e| {
                warn!("{}: hardening-check -F failed: {}", binary.relative, e);
                None
            });

        let complexity: ComplexityRecord =
            self.radare2
                .measure(&binary.path, binary.kind, self.complexity_timeout);

        BinaryReport {
            rpm: package.to_string(),
            filename: binary.relative.clone(),
            hardening_check,
            report_functions,
            find_libc_functions,
            complexity,
        }
    }
}
