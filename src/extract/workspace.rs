//! Scratch workspaces
//!
//! Each package is unpacked into its own temporary directory under the
//! scratch root. The directory is removed when the [`Workspace`] is dropped,
//! so concurrent packages never see each other's payloads.

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const PAYLOAD_DIR: &str = "payload";

pub struct Workspace {
    dir: tempfile::TempDir,
    payload: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace for `package` inside `scratch_root`
    pub fn create(scratch_root: &Path, package: &str) -> io::Result<Self> {
        let prefix: String = package
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(48)
            .collect();

        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", prefix))
            .tempdir_in(scratch_root)?;
        let payload = dir.path().join(PAYLOAD_DIR);
        std::fs::create_dir(&payload)?;

        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir, payload })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the package payload is unpacked
    pub fn payload_dir(&self) -> &Path {
        &self.payload
    }
}

/// Clear leftovers from earlier (possibly killed) runs out of the scratch
/// root. Must run before any package is extracted.
pub fn prepare_workspace(scratch_root: &Path) -> io::Result<usize> {
    std::fs::create_dir_all(scratch_root)?;

    let mut removed = 0;
    for entry in std::fs::read_dir(scratch_root)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }

    if removed > 0 {
        debug!("Cleared {} stale entries from {}", removed, scratch_root.display());
    }
    Ok(removed)
}
