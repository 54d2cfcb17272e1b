//! RPM payload extraction
//!
//! `rpm2cpio <pkg> | cpio -idm` unpacks the payload; `rpm -qip` provides
//! the header metadata recorded alongside the scan results.

use super::{find_executables, Binary, PackageExtractor, Workspace};
use crate::config::ToolPaths;
use crate::error::{ScanError, ScanResult};
use crate::models::PackageMetadata;
use crate::tools::{run_tool, spawn_error};
use crate::walker::PackageCandidate;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

const DESCRIPTION_MARKER: &str = "Description :";

pub struct RpmExtractor {
    rpm2cpio: PathBuf,
    cpio: PathBuf,
    rpm: PathBuf,
    timeout: Option<Duration>,
}

impl RpmExtractor {
    pub fn new(tools: &ToolPaths) -> Self {
        Self {
            rpm2cpio: tools.rpm2cpio.clone(),
            cpio: tools.cpio.clone(),
            rpm: tools.rpm.clone(),
            timeout: None,
        }
    }

    /// Bound `rpm -qip`; a hung query fails the package instead of the run
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Copy the package into the workspace so tools never touch the repository
    fn stage(&self, package: &PackageCandidate, workspace: &Workspace) -> ScanResult<PathBuf> {
        let staged = workspace.path().join(&package.name);
        if !staged.exists() {
            std::fs::copy(&package.path, &staged).map_err(|e| {
                ScanError::extraction(&package.name, format!("copy to workspace failed: {}", e))
            })?;
        }
        Ok(staged)
    }

    /// `rpm2cpio <staged> | cpio -idm`, run inside the payload directory
    fn unpack(&self, package: &str, staged: &Path, dest: &Path) -> ScanResult<()> {
        let mut rpm2cpio = Command::new(&self.rpm2cpio)
            .arg(staged)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| spawn_error("rpm2cpio", e))?;

        let Some(payload) = rpm2cpio.stdout.take() else {
            let _ = rpm2cpio.kill();
            let _ = rpm2cpio.wait();
            return Err(ScanError::extraction(package, "rpm2cpio stdout unavailable"));
        };

        let cpio = Command::new(&self.cpio)
            .arg("-idm")
            .current_dir(dest)
            .stdin(Stdio::from(payload))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();
        let cpio = match cpio {
            Ok(child) => child,
            Err(e) => {
                let _ = rpm2cpio.kill();
                let _ = rpm2cpio.wait();
                return Err(spawn_error("cpio", e));
            }
        };

        let cpio_out = cpio.wait_with_output()?;
        let rpm2cpio_status = rpm2cpio.wait()?;

        if !rpm2cpio_status.success() {
            return Err(ScanError::extraction(
                package,
                format!("rpm2cpio exited with {}", rpm2cpio_status),
            ));
        }
        if !cpio_out.status.success() {
            let stderr = String::from_utf8_lossy(&cpio_out.stderr);
            return Err(ScanError::extraction(
                package,
                format!("cpio exited with {}: {}", cpio_out.status, stderr.trim()),
            ));
        }
        Ok(())
    }
}

impl PackageExtractor for RpmExtractor {
    fn extract(&self, package: &PackageCandidate, workspace: &Workspace) -> ScanResult<Vec<Binary>> {
        let staged = self.stage(package, workspace)?;
        self.unpack(&package.name, &staged, workspace.payload_dir())?;

        let binaries = find_executables(workspace.payload_dir())?;
        debug!("{}: {} ELF objects", package.name, binaries.len());
        Ok(binaries)
    }

    fn metadata(&self, package: &PackageCandidate, workspace: &Workspace) -> ScanResult<PackageMetadata> {
        let staged = self.stage(package, workspace)?;
        let args = [Path::new("-qip"), staged.as_path()];
        let out = run_tool(&self.rpm, &args, "rpm -qip", self.timeout, None)
            .and_then(|out| out.ensure_success("rpm -qip"))
            .map_err(|e| ScanError::Metadata {
                package: package.name.clone(),
                message: e.to_string(),
            })?;
        Ok(parse_rpm_info(&out.stdout))
    }
}

/// Parse `rpm -qip` output: `Key : value` header lines, then a free-form
/// description after the `Description :` marker
pub fn parse_rpm_info(output: &str) -> PackageMetadata {
    let Some((header, description)) = output.split_once(DESCRIPTION_MARKER) else {
        return PackageMetadata::unparsed();
    };

    let mut metadata = PackageMetadata {
        description: description.trim().to_string(),
        ..Default::default()
    };
    for line in header.lines().filter(|l| !l.trim().is_empty()) {
        if let Some((key, value)) = line.split_once(':') {
            metadata
                .fields
                .insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    const QIP: &str = "\
Name        : gzip
Version     : 1.13
Release     : 1.fc40
Architecture: x86_64
Install Date: (not installed)
Build Date  : Thu 25 Jan 2024 12:00:00 PM UTC
URL         : https://www.gzip.org/
Summary     : The GNU data compression program
Description :
The gzip package contains the popular GNU gzip data compression
program. Gzipped files have a .gz extension.
";

    #[test]
    fn test_parse_rpm_info() {
        let metadata = parse_rpm_info(QIP);
        assert_eq!(metadata.get("Name"), Some("gzip"));
        assert_eq!(metadata.get("Architecture"), Some("x86_64"));
        // Only the first colon separates key and value
        assert_eq!(metadata.get("URL"), Some("https://www.gzip.org/"));
        assert_eq!(metadata.get("Build Date"), Some("Thu 25 Jan 2024 12:00:00 PM UTC"));
        assert!(metadata.description.starts_with("The gzip package"));
        assert!(metadata.description.ends_with(".gz extension."));
    }

    #[test]
    fn test_parse_rpm_info_without_description() {
        let metadata = parse_rpm_info("error: not an rpm package\n");
        assert!(metadata.fields.is_empty());
        assert_eq!(metadata.description, PackageMetadata::unparsed().description);
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_unpack_is_extraction_error() {
        let repo = tempfile::tempdir().expect("tempdir");
        let scratch = tempfile::tempdir().expect("tempdir");
        let pkg = repo.path().join("broken.rpm");
        std::fs::write(&pkg, b"not an rpm").expect("write");

        let tools = ToolPaths {
            rpm2cpio: PathBuf::from("/bin/false"),
            ..ToolPaths::default()
        };
        let extractor = RpmExtractor::new(&tools);
        let candidate = PackageCandidate {
            name: "broken.rpm".into(),
            path: pkg,
        };
        let ws = Workspace::create(scratch.path(), &candidate.name).expect("workspace");

        // cpio may or may not be installed; either way this must not succeed
        assert!(extractor.extract(&candidate, &ws).is_err());
        assert!(ws.path().join("broken.rpm").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_metadata_query_fails_package() {
        use std::os::unix::fs::PermissionsExt;

        let repo = tempfile::tempdir().expect("tempdir");
        let scratch = tempfile::tempdir().expect("tempdir");
        let pkg = repo.path().join("gzip-1.13.rpm");
        std::fs::write(&pkg, b"rpm").expect("write");

        let rpm = repo.path().join("rpm");
        std::fs::write(&rpm, "#!/bin/sh\nexec sleep 30\n").expect("write tool");
        std::fs::set_permissions(&rpm, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        let tools = ToolPaths {
            rpm,
            ..ToolPaths::default()
        };
        let extractor = RpmExtractor::new(&tools).with_timeout(Duration::from_millis(300));
        let candidate = PackageCandidate {
            name: "gzip-1.13.rpm".into(),
            path: pkg,
        };
        let ws = Workspace::create(scratch.path(), &candidate.name).expect("workspace");

        let started = std::time::Instant::now();
        let err = extractor.metadata(&candidate, &ws).unwrap_err();
        assert!(matches!(err, ScanError::Metadata { .. }), "{}", err);
        assert!(err.to_string().contains("timed out"), "{}", err);
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
