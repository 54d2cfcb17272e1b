//! `hardening-check` wrapper
//!
//! Three invocations per binary:
//! - default mode: one `test: outcome` line per hardening property
//! - `-R`: report the functions that triggered findings
//! - `-F`: list the libc functions the binary imports

use super::run_tool;
use crate::error::ScanResult;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const TOOL: &str = "hardening-check";

pub struct HardeningCheck {
    program: PathBuf,
    report_header_lines: usize,
    timeout: Option<Duration>,
}

impl HardeningCheck {
    pub fn new(program: impl Into<PathBuf>, report_header_lines: usize) -> Self {
        Self {
            program: program.into(),
            report_header_lines,
            timeout: None,
        }
    }

    /// Kill any single invocation that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Hardening outcomes; lines mentioning `noise_prefix` (the workspace
    /// path) are dropped
    pub fn checks(&self, binary: &Path, noise_prefix: &Path) -> ScanResult<BTreeMap<String, String>> {
        let out = run_tool(&self.program, &[binary], TOOL, self.timeout, None)?;
        Ok(parse_checks(&out.stdout, &noise_prefix.to_string_lossy()))
    }

    pub fn report_functions(&self, binary: &Path) -> ScanResult<Vec<String>> {
        let args = [Path::new("-R"), binary];
        let out = run_tool(&self.program, &args, "hardening-check -R", self.timeout, None)?;
        Ok(parse_report_functions(&out.stdout, self.report_header_lines))
    }

    /// `None` when the output names no functions at all
    pub fn libc_functions(&self, binary: &Path) -> ScanResult<Option<Vec<String>>> {
        let args = [Path::new("-F"), binary];
        let out = run_tool(&self.program, &args, "hardening-check -F", self.timeout, None)?;
        let functions = parse_libc_functions(&out.stdout);
        if functions.is_none() {
            debug!("{} had no `hardening-check -F` output", binary.display());
        }
        Ok(functions)
    }
}

/// Parse `test: outcome` lines into a map
pub fn parse_checks(output: &str, noise_prefix: &str) -> BTreeMap<String, String> {
    let mut checks = BTreeMap::new();
    for line in output.lines() {
        if line.trim().is_empty() || (!noise_prefix.is_empty() && line.contains(noise_prefix)) {
            continue;
        }
        match line.split_once(':') {
            Some((test, outcome)) => {
                checks.insert(test.trim().to_string(), outcome.trim().to_string());
            }
            None => debug!("Skipping unparseable {} line: {:?}", TOOL, line),
        }
    }
    checks
}

/// Everything after the header block, one function per line
pub fn parse_report_functions(output: &str, header_lines: usize) -> Vec<String> {
    output
        .lines()
        .skip(header_lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Pull the first single-quoted name out of each line
pub fn parse_libc_functions(output: &str) -> Option<Vec<String>> {
    let functions: Vec<String> = output
        .lines()
        .filter_map(|line| line.split('\'').nth(1))
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect();

    if functions.is_empty() {
        None
    } else {
        Some(functions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKS_OUTPUT: &str = "\
/tmp/scratch/bash-1a2b/payload/usr/bin/bash:
 Position Independent Executable: yes
 Stack protected: yes
 Fortify Source functions: yes (some protected functions found)
 Read-only relocations: yes
 Immediate binding: yes
 Stack clash protection: unknown, no -fstack-clash-protection instructions found
";

    #[test]
    fn test_parse_checks_drops_workspace_lines() {
        let checks = parse_checks(CHECKS_OUTPUT, "/tmp/scratch/bash-1a2b");
        assert_eq!(checks.len(), 6);
        assert_eq!(checks["Position Independent Executable"], "yes");
        assert_eq!(
            checks["Fortify Source functions"],
            "yes (some protected functions found)"
        );
        assert_eq!(
            checks["Stack clash protection"],
            "unknown, no -fstack-clash-protection instructions found"
        );
    }

    #[test]
    fn test_parse_checks_keeps_outcome_after_first_colon() {
        let checks = parse_checks(" Odd check: no: really\nno separator here\n", "/nowhere");
        assert_eq!(checks.len(), 1);
        assert_eq!(checks["Odd check"], "no: really");
    }

    #[test]
    fn test_parse_checks_empty_output() {
        assert!(parse_checks("", "/tmp").is_empty());
    }

    #[test]
    fn test_parse_report_functions_skips_header() {
        let mut output = String::new();
        for i in 0..8 {
            output.push_str(&format!("header line {}\n", i));
        }
        output.push_str("strcpy\n\n  sprintf  \n");

        assert_eq!(parse_report_functions(&output, 8), vec!["strcpy", "sprintf"]);
        assert!(parse_report_functions("only\nheader\n", 8).is_empty());
    }

    #[test]
    fn test_parse_libc_functions() {
        let output = "\
Found libc function 'strcpy'
Found libc function 'memcpy'
no quotes on this line
";
        assert_eq!(
            parse_libc_functions(output),
            Some(vec!["strcpy".to_string(), "memcpy".to_string()])
        );
        assert_eq!(parse_libc_functions("nothing useful\n"), None);
    }
}
