//! Cache path utilities - results live at `<output>/<first char>/<package>.json`

use std::path::{Path, PathBuf};

/// Shard directory name for a package: its first character
pub fn shard_for(package: &str) -> String {
    match package.chars().next() {
        Some(c) if c != '.' && !std::path::is_separator(c) => c.to_string(),
        _ => "_".to_string(),
    }
}

/// Result file for a package
pub fn result_path(output_dir: &Path, package: &str) -> PathBuf {
    output_dir
        .join(shard_for(package))
        .join(format!("{}.json", package))
}

/// Package name back from a result file path
pub fn package_from_result_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(".json").map(String::from)
}
