//! Score command - turn cached results into risk scores

use crate::cache::ResultCache;
use crate::config::{load_schema, ScoreSchema, EXAMPLE_SCHEMA};
use crate::reporters;
use crate::scoring::ScoreEngine;
use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_SCHEMA_FILE: &str = "scoring.toml";

pub fn run(output_dir: &Path, schema: Option<&Path>, format: &str, output: Option<&Path>) -> Result<()> {
    if !output_dir.is_dir() {
        bail!("Result directory does not exist: {}", output_dir.display());
    }

    let schema = resolve_schema(schema)?;
    let cache = ResultCache::new(output_dir);
    let report = ScoreEngine::new(&schema).score_directory(&cache);

    if !report.malformed.is_empty() {
        warn!("{} result files could not be read", report.malformed.len());
    }

    let rendered = reporters::report(&report, format)?;
    match output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn resolve_schema(explicit: Option<&Path>) -> Result<ScoreSchema> {
    if let Some(path) = explicit {
        return load_schema(path);
    }
    let local = Path::new(DEFAULT_SCHEMA_FILE);
    if local.is_file() {
        return load_schema(local);
    }
    info!("No score schema given; using the built-in example schema");
    ScoreSchema::from_toml_str(EXAMPLE_SCHEMA)
}
