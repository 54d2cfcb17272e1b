//! Scan settings
//!
//! Supports loading settings from, lowest priority first:
//! - built-in defaults
//! - ~/.config/hardscore/config.toml (or the file given with `--config`)
//! - environment variables
//! - CLI flags (applied by the caller)
//!
//! ```toml
//! complexity_timeout_secs = 600
//! tool_timeout_secs = 120
//! report_header_lines = 8
//! jobs = 1
//!
//! [tools]
//! hardening_check = "/usr/bin/hardening-check"
//! radare2 = "radare2"
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Hard ceiling for a single radare2 complexity analysis
pub const DEFAULT_COMPLEXITY_TIMEOUT_SECS: u64 = 600;

/// Ceiling for one `hardening-check` or `rpm -qip` invocation
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// `hardening-check -R` prints this many header lines before the function list
pub const DEFAULT_REPORT_HEADER_LINES: usize = 8;

/// Annotated example written by `hardscore init`
pub const EXAMPLE_SCAN_CONFIG: &str = r#"# hardscore scan settings

# Seconds before a radare2 complexity analysis is abandoned
complexity_timeout_secs = 600

# Seconds before a single hardening-check or rpm query is killed
tool_timeout_secs = 120

# Header lines printed by `hardening-check -R` before the function list
report_header_lines = 8

# Packages scanned in parallel (each gets a private workspace)
jobs = 1

[tools]
hardening_check = "hardening-check"
radare2 = "radare2"
rpm2cpio = "rpm2cpio"
cpio = "cpio"
rpm = "rpm"
"#;

/// External programs the scan shells out to
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolPaths {
    pub hardening_check: PathBuf,
    pub radare2: PathBuf,
    pub rpm2cpio: PathBuf,
    pub cpio: PathBuf,
    pub rpm: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            hardening_check: PathBuf::from("hardening-check"),
            radare2: PathBuf::from("radare2"),
            rpm2cpio: PathBuf::from("rpm2cpio"),
            cpio: PathBuf::from("cpio"),
            rpm: PathBuf::from("rpm"),
        }
    }
}

impl ToolPaths {
    /// (label, program) pairs, in the order the scan uses them
    pub fn all(&self) -> [(&'static str, &Path); 5] {
        [
            ("rpm2cpio", self.rpm2cpio.as_path()),
            ("cpio", self.cpio.as_path()),
            ("rpm", self.rpm.as_path()),
            ("hardening-check", self.hardening_check.as_path()),
            ("radare2", self.radare2.as_path()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    pub tools: ToolPaths,
    pub complexity_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    pub report_header_lines: usize,
    pub jobs: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            complexity_timeout_secs: DEFAULT_COMPLEXITY_TIMEOUT_SECS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            report_header_lines: DEFAULT_REPORT_HEADER_LINES,
            jobs: 1,
        }
    }
}

impl ScanConfig {
    /// Load settings from `explicit` (must exist) or the user config file
    /// (optional), then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::user_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Zero timeouts would fail every binary; zero jobs would scan nothing
    pub fn validate(&self) -> Result<()> {
        if self.complexity_timeout_secs == 0 {
            bail!("complexity_timeout_secs must be at least 1");
        }
        if self.tool_timeout_secs == 0 {
            bail!("tool_timeout_secs must be at least 1");
        }
        if self.jobs == 0 {
            bail!("jobs must be at least 1");
        }
        Ok(())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("hardscore").join("config.toml"))
    }

    /// Environment variables override the config file
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("HARDSCORE_HARDENING_CHECK") {
            self.tools.hardening_check = PathBuf::from(path);
        }
        if let Some(path) = lookup("HARDSCORE_RADARE2") {
            self.tools.radare2 = PathBuf::from(path);
        }
        if let Some(secs) = lookup("HARDSCORE_COMPLEXITY_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.complexity_timeout_secs = secs;
        }
    }

    pub fn complexity_timeout(&self) -> Duration {
        Duration::from_secs(self.complexity_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::default();
        assert_eq!(config.complexity_timeout(), Duration::from_secs(600));
        assert_eq!(config.tool_timeout(), Duration::from_secs(120));
        assert_eq!(config.report_header_lines, 8);
        assert_eq!(config.jobs, 1);
        assert_eq!(config.tools.hardening_check, PathBuf::from("hardening-check"));
    }

    #[test]
    fn test_example_config_parses() {
        let config: ScanConfig = toml::from_str(EXAMPLE_SCAN_CONFIG).expect("example config");
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "jobs = 4\n[tools]\nradare2 = \"/opt/r2/bin/r2\"\n").expect("write");

        let config = ScanConfig::from_file(&path).expect("load");
        assert_eq!(config.jobs, 4);
        assert_eq!(config.tools.radare2, PathBuf::from("/opt/r2/bin/r2"));
        assert_eq!(config.tools.cpio, PathBuf::from("cpio"));
        assert_eq!(config.complexity_timeout_secs, DEFAULT_COMPLEXITY_TIMEOUT_SECS);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HARDSCORE_HARDENING_CHECK", "/usr/local/bin/hardening-check"),
            ("HARDSCORE_COMPLEXITY_TIMEOUT", "30"),
        ]);
        let mut config = ScanConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.tools.hardening_check,
            PathBuf::from("/usr/local/bin/hardening-check")
        );
        assert_eq!(config.tools.radare2, PathBuf::from("radare2"));
        assert_eq!(config.complexity_timeout_secs, 30);
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        assert!(ScanConfig::default().validate().is_ok());

        let mut config = ScanConfig::default();
        config.complexity_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = ScanConfig::default();
        config.tool_timeout_secs = 0;
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "complexity_timeout_secs = 0\n").expect("write");
        assert!(ScanConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(ScanConfig::load(Some(Path::new("/no/such/hardscore.toml"))).is_err());
    }
}
