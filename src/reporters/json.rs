//! JSON reporter - the full score report, pretty-printed

use crate::scoring::ScoreReport;
use anyhow::Result;

pub fn render(report: &ScoreReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
