//! Score schema loading
//!
//! The schema is read once at startup from `scoring.toml` (or a `.json`
//! file with the same keys) and never mutated afterwards.
//!
//! # Format
//!
//! ```toml
//! starting_score = 50.0
//! disqualifying_checks = ["/bin/sh"]
//!
//! [complexity.cyclomatic_complexity]
//! mean = 12.0
//! stdev = 8.0
//! stdev_coefficient = 2.0
//!
//! [complexity.cycle_cost]
//! mean = 40.0
//! stdev = 25.0
//! stdev_coefficient = 1.0
//!
//! [hardening-check."Position Independent Executable"]
//! no = 10.0
//!
//! [bad_functions]
//! functions = ["strcpy", "gets"]
//! addend = 10.0
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// Annotated example written by `hardscore init`
pub const EXAMPLE_SCHEMA: &str = r#"# hardscore scoring schema
#
# Higher scores mean higher risk. Every binary starts at `starting_score`;
# complexity is z-score normalized and weighted, hardening outcomes add the
# weights below when the reported outcome contains the listed text.

starting_score = 50.0

# Binaries reporting one of these test names are not scored at all.
disqualifying_checks = ["/bin/sh"]

[complexity.cyclomatic_complexity]
mean = 12.0
stdev = 8.0
stdev_coefficient = 2.0

[complexity.cycle_cost]
mean = 40.0
stdev = 25.0
stdev_coefficient = 1.0

[hardening-check."Position Independent Executable"]
no = 10.0

[hardening-check."Stack protected"]
no = 10.0

[hardening-check."Fortify Source functions"]
no = 5.0
unknown = 2.0

[hardening-check."Read-only relocations"]
no = 5.0

[hardening-check."Immediate binding"]
no = 3.0

[bad_functions]
functions = ["gets", "strcpy", "strcat", "sprintf", "vsprintf", "system", "mktemp", "tmpnam"]
addend = 10.0
"#;

/// Normalization parameters for one complexity dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    pub mean: f64,
    pub stdev: f64,
    pub stdev_coefficient: f64,
}

impl MetricStats {
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.stdev
    }

    /// Weighted z-score added to a binary's score
    pub fn contribution(&self, value: f64) -> f64 {
        self.z_score(value) * self.stdev_coefficient
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexitySchema {
    pub cyclomatic_complexity: MetricStats,
    pub cycle_cost: MetricStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BadFunctions {
    #[serde(default)]
    pub functions: BTreeSet<String>,
    /// Flat penalty, applied once however many blacklisted functions appear
    #[serde(default)]
    pub addend: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSchema {
    pub starting_score: f64,
    pub complexity: ComplexitySchema,
    /// check name -> outcome substring -> weight
    #[serde(rename = "hardening-check", default)]
    pub hardening_check: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    pub bad_functions: BadFunctions,
    #[serde(default = "default_disqualifying_checks")]
    pub disqualifying_checks: Vec<String>,
}

fn default_disqualifying_checks() -> Vec<String> {
    vec!["/bin/sh".to_string()]
}

impl ScoreSchema {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let schema: ScoreSchema = toml::from_str(content).context("Invalid TOML score schema")?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let schema: ScoreSchema =
            serde_json::from_str(content).context("Invalid JSON score schema")?;
        schema.validate()?;
        Ok(schema)
    }

    /// Reject schemas that would make the z-score undefined
    pub fn validate(&self) -> Result<()> {
        for (name, stats) in [
            ("cyclomatic_complexity", &self.complexity.cyclomatic_complexity),
            ("cycle_cost", &self.complexity.cycle_cost),
        ] {
            if !stats.stdev.is_finite() || stats.stdev <= 0.0 {
                bail!(
                    "complexity.{}.stdev must be a positive number, got {}",
                    name,
                    stats.stdev
                );
            }
            if !stats.mean.is_finite() || !stats.stdev_coefficient.is_finite() {
                bail!("complexity.{} contains a non-finite value", name);
            }
        }
        if !self.starting_score.is_finite() {
            bail!("starting_score must be finite");
        }
        Ok(())
    }

    /// Every `(check, outcome, weight)` triple in the weight table
    pub fn hardening_weights(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.hardening_check.iter().flat_map(|(check, outcomes)| {
            outcomes
                .iter()
                .map(move |(outcome, weight)| (check.as_str(), outcome.as_str(), *weight))
        })
    }
}

/// Load a score schema, picking the format from the file extension
pub fn load_schema(path: &Path) -> Result<ScoreSchema> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read score schema {}", path.display()))?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let schema = match extension.as_str() {
        "toml" => ScoreSchema::from_toml_str(&content),
        "json" => ScoreSchema::from_json_str(&content),
        other => bail!(
            "Unsupported score schema format '{}' for {}: use a .toml or .json file",
            other,
            path.display()
        ),
    }
    .with_context(|| format!("Failed to load score schema {}", path.display()))?;

    debug!(
        "Loaded score schema from {} ({} hardening weights, {} bad functions)",
        path.display(),
        schema.hardening_weights().count(),
        schema.bad_functions.functions.len()
    );
    Ok(schema)
}
