//! Repository walker
//!
//! Lazily enumerates package files under a repository tree, skipping every
//! package that already has a cached result. The walk is read-only.

use crate::cache::ResultCache;
use crate::error::{ScanError, ScanResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use walkdir::WalkDir;

/// A package file that still needs scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageCandidate {
    /// File name, used as the package identity and cache key
    pub name: String,
    pub path: PathBuf,
}

pub struct RepositoryWalker<'a> {
    root: PathBuf,
    cache: &'a ResultCache,
    skipped: AtomicUsize,
}

impl<'a> RepositoryWalker<'a> {
    /// Fails when the repository root is missing; that is a startup error,
    /// not something to skip over
    pub fn new(root: impl Into<PathBuf>, cache: &'a ResultCache) -> ScanResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ScanError::MissingRoot(root));
        }
        Ok(Self {
            root,
            cache,
            skipped: AtomicUsize::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Packages without a cached result, in path order
    pub fn candidates(&self) -> impl Iterator<Item = PackageCandidate> + Send + '_ {
        WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(move |entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if self.cache.contains(&name) {
                    debug!("Skipping {}: cached result exists", name);
                    self.skipped.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(PackageCandidate {
                    name,
                    path: entry.into_path(),
                })
            })
    }

    /// Cache hits seen so far by [`candidates`](Self::candidates)
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PackageMetadata, PackageResult};

    fn repo_with(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in names {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            std::fs::write(path, b"rpm").expect("write");
        }
        dir
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let out = tempfile::tempdir().expect("tempdir");
        let cache = ResultCache::new(out.path());
        let err = RepositoryWalker::new("/no/such/repository", &cache).err().expect("error");
        assert!(matches!(err, ScanError::MissingRoot(_)));
    }

    #[test]
    fn test_yields_all_packages_recursively() {
        let repo = repo_with(&["bash.rpm", "Packages/z/zlib.rpm", "Packages/g/gzip.rpm"]);
        let out = tempfile::tempdir().expect("tempdir");
        let cache = ResultCache::new(out.path());
        let walker = RepositoryWalker::new(repo.path(), &cache).expect("walker");

        let names: Vec<String> = walker.candidates().map(|c| c.name).collect();
        assert_eq!(names, vec!["gzip.rpm", "zlib.rpm", "bash.rpm"]);
        assert_eq!(walker.skipped(), 0);
    }

    #[test]
    fn test_skips_cached_packages() {
        let repo = repo_with(&["bash.rpm", "gzip.rpm", "zlib.rpm"]);
        let out = tempfile::tempdir().expect("tempdir");
        let cache = ResultCache::new(out.path());
        cache
            .write("gzip.rpm", &PackageResult::no_executables(PackageMetadata::unparsed()))
            .expect("write");

        let walker = RepositoryWalker::new(repo.path(), &cache).expect("walker");
        let candidates: Vec<PackageCandidate> = walker.candidates().collect();

        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.name != "gzip.rpm"));
        assert_eq!(candidates[0].path, repo.path().join("bash.rpm"));
        assert_eq!(walker.skipped(), 1);
    }

    #[test]
    fn test_walk_is_lazy() {
        let repo = repo_with(&["a.rpm", "b.rpm", "c.rpm"]);
        let out = tempfile::tempdir().expect("tempdir");
        let cache = ResultCache::new(out.path());
        let walker = RepositoryWalker::new(repo.path(), &cache).expect("walker");

        let mut iter = walker.candidates();
        let first = iter.next().expect("first");
        // Caching a later package mid-walk is observed by the walk
        cache
            .write("c.rpm", &PackageResult::no_executables(PackageMetadata::unparsed()))
            .expect("write");
        let rest: Vec<String> = iter.map(|c| c.name).collect();

        assert_eq!(first.name, "a.rpm");
        assert_eq!(rest, vec!["b.rpm"]);
    }
}
