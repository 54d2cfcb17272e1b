//! Package extraction
//!
//! Stages a package into a private [`Workspace`], unpacks its payload and
//! enumerates the binaries worth analyzing. An empty binary list is a valid
//! outcome ("no executables found"), not an error.

mod rpm;
mod workspace;

pub use rpm::{parse_rpm_info, RpmExtractor};
pub use workspace::{prepare_workspace, Workspace};

use crate::error::ScanResult;
use crate::models::{BinaryKind, PackageMetadata};
use crate::walker::PackageCandidate;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const ELF_MAGIC: &[u8] = b"\x7fELF";

/// A binary found inside an extracted payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    /// Absolute path inside the workspace
    pub path: PathBuf,
    /// Path relative to the payload root, `/`-separated
    pub relative: String,
    pub kind: BinaryKind,
}

/// Turns a package file into binaries on disk
pub trait PackageExtractor: Send + Sync {
    /// Unpack the payload into `workspace` and list the binaries in it
    fn extract(&self, package: &PackageCandidate, workspace: &Workspace) -> ScanResult<Vec<Binary>>;

    /// Header metadata for the package
    fn metadata(&self, package: &PackageCandidate, workspace: &Workspace) -> ScanResult<PackageMetadata>;
}

/// Regular files under `root` whose magic marks them as ELF objects, in
/// path order. `ar` archives are not ELF and are left out.
pub fn find_executables(root: &Path) -> ScanResult<Vec<Binary>> {
    let mut binaries = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if !is_elf(path) {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        binaries.push(Binary {
            kind: BinaryKind::from_path(path),
            path: path.to_path_buf(),
            relative,
        });
    }

    Ok(binaries)
}

fn is_elf(path: &Path) -> bool {
    let mut header = [0u8; 4];
    let read = File::open(path).and_then(|mut f| {
        let mut filled = 0;
        while filled < header.len() {
            match f.read(&mut header[filled..])? {
                0 => break,
                n => filled += n,
            }
        }
        Ok(filled)
    });

    match read {
        Ok(n) => header[..n] == *ELF_MAGIC,
        Err(_) => false,
    }
}
