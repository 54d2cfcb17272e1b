//! Text (terminal) reporter

use crate::scoring::{PackageScore, ScoreReport};
use anyhow::Result;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const YELLOW: &str = "\x1b[33m";

/// Render packages sorted by score, highest (riskiest) first
pub fn render(report: &ScoreReport) -> Result<String> {
    let mut out = String::new();

    out.push_str(&format!("\n{BOLD}hardscore risk report{RESET}\n"));
    out.push_str(&format!("{DIM}──────────────────────────────────────{RESET}\n"));

    let mut ranked: Vec<(&String, &PackageScore, f64)> = report
        .packages
        .iter()
        .filter_map(|(name, score)| score.package_score.map(|s| (name, score, s)))
        .collect();
    ranked.sort_by(|a, b| b.2.total_cmp(&a.2).then_with(|| a.0.cmp(b.0)));

    if ranked.is_empty() {
        out.push_str("No scored packages.\n");
    } else {
        let width = ranked.iter().map(|(n, _, _)| n.len()).max().unwrap_or(0);
        for (name, score, value) in &ranked {
            out.push_str(&format!(
                "{BOLD}{:>8.2}{RESET}  {:<width$}  {DIM}{} binaries",
                value,
                name,
                score.binary_scores.len(),
                width = width
            ));
            if score.unscored_binaries > 0 {
                out.push_str(&format!(", {} unscored", score.unscored_binaries));
            }
            out.push_str(&format!("{RESET}\n"));
        }
    }

    out.push_str(&format!(
        "\n{} scored, {} without executables, {} unscorable\n",
        report.scored(),
        report.no_executables,
        report.unscorable
    ));

    if !report.malformed.is_empty() {
        out.push_str(&format!(
            "{YELLOW}{} malformed result files skipped:{RESET}\n",
            report.malformed.len()
        ));
        for (path, reason) in &report.malformed {
            out.push_str(&format!("  {} {DIM}({}){RESET}\n", path.display(), reason));
        }
    }

    Ok(out)
}
