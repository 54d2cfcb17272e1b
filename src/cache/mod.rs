//! Result cache
//!
//! One JSON file per package is the only record of a finished scan. A
//! package with a result file is never scanned again; a package whose scan
//! failed has none and is picked up by the next run.
//!
//! Note: results are keyed by package name only. Upgrading
//! `hardening-check` or radare2 does not invalidate existing files; delete
//! the output directory to force a rescan.

pub mod paths;

pub use paths::{package_from_result_path, result_path, shard_for};

use crate::error::ScanResult;
use crate::models::PackageResult;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ResultCache {
    root: PathBuf,
}

impl ResultCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, package: &str) -> PathBuf {
        result_path(&self.root, package)
    }

    /// Whether a result already exists for `package`
    pub fn contains(&self, package: &str) -> bool {
        self.path_for(package).is_file()
    }

    /// Write a result atomically: a temp file in the shard directory is
    /// renamed into place, so readers never see a half-written file
    pub fn write(&self, package: &str, result: &PackageResult) -> ScanResult<PathBuf> {
        let path = self.path_for(package);
        let shard = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(shard)?;

        let mut tmp = tempfile::NamedTempFile::new_in(shard)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, result)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.persist(&path).map_err(|e| e.error)?;

        debug!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn read(&self, package: &str) -> ScanResult<PackageResult> {
        read_result_file(&self.path_for(package))
    }

    /// Every result file under the cache root, in path order
    pub fn result_files(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.root)
            .min_depth(2)
            .max_depth(2)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
    }
}

pub fn read_result_file(path: &Path) -> ScanResult<PackageResult> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
