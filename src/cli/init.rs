//! Init command - write example configuration files

use crate::config::{EXAMPLE_SCAN_CONFIG, EXAMPLE_SCHEMA};
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub fn run(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    println!("\n{} Initializing hardscore\n", style("▸").bold());

    for (name, content) in [("scoring.toml", EXAMPLE_SCHEMA), ("hardscore.toml", EXAMPLE_SCAN_CONFIG)] {
        let target = path.join(name);
        if target.exists() {
            println!(
                "{} {} already exists, leaving it alone",
                style("○").dim(),
                style(target.display()).cyan()
            );
            continue;
        }
        std::fs::write(&target, content)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        println!("{} Created {}", style("✓").green(), style(target.display()).cyan());
    }

    println!("\nNext steps:");
    println!("  hardscore <output> <repo> <swap> --config hardscore.toml");
    println!("  hardscore score <output> --schema scoring.toml");
    Ok(())
}
