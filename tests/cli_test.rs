//! CLI contract tests
//!
//! Runs the built binary to check argument handling, exit codes and the
//! score/init commands end to end.

use std::path::Path;
use std::process::{Command, Output};

fn hardscore(args: &[&str], cwd: &Path) -> Output {
    let config_home = cwd.join(".config-home");
    Command::new(env!("CARGO_BIN_EXE_hardscore"))
        .args(args)
        .current_dir(cwd)
        // Keep the developer's own config out of the way
        .env("XDG_CONFIG_HOME", &config_home)
        .env("HOME", cwd)
        .env_remove("HARDSCORE_CONFIG")
        .env_remove("HARDSCORE_HARDENING_CHECK")
        .env_remove("HARDSCORE_RADARE2")
        .env_remove("RUST_LOG")
        .output()
        .expect("run hardscore")
}

const RESULT: &str = r#"{
  "metadata": {
    "Name": "zlib",
    "Description": "compression library"
  },
  "results": {
    "usr/lib64/libz_so_1": {
      "rpm": "zlib-1.3.rpm",
      "filename": "usr/lib64/libz.so.1",
      "hardening-check": {
        "Position Independent Executable": "yes",
        "Stack protected": "no, not found!"
      },
      "report-functions": ["strcpy"],
      "complexity": {"r2aa": {"afCc": 20, "afC": null}}
    }
  }
}
"#;

const SCHEMA: &str = r#"
starting_score = 5.0

[complexity.cyclomatic_complexity]
mean = 10.0
stdev = 5.0
stdev_coefficient = 2.0

[complexity.cycle_cost]
mean = 10.0
stdev = 5.0
stdev_coefficient = 1.0

[hardening-check."Stack protected"]
no = 1.0

[bad_functions]
functions = ["strcpy"]
addend = 2.0
"#;

#[test]
fn test_missing_arguments_is_usage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = hardscore(&["only-one"], dir.path());
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_missing_repository_is_fatal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = hardscore(
        &["out", "no-such-repo", "swap"],
        dir.path(),
    );
    // hardening-check is looked up first; either way this is a fatal error
    assert_eq!(out.status.code(), Some(1));
    assert!(!dir.path().join("out").exists());
}

#[cfg(unix)]
#[test]
fn test_empty_repository_scans_clean() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("repo")).expect("mkdir");
    std::fs::create_dir(dir.path().join("swap")).expect("mkdir");
    std::fs::write(dir.path().join("swap").join("leftover"), "x").expect("write");

    let out = Command::new(env!("CARGO_BIN_EXE_hardscore"))
        .args(["out", "repo", "swap", "--no-progress"])
        .current_dir(dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join(".config-home"))
        .env("HOME", dir.path())
        .env_remove("HARDSCORE_CONFIG")
        .env("HARDSCORE_HARDENING_CHECK", "/bin/sh")
        .output()
        .expect("run hardscore");

    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(dir.path().join("out").is_dir());
    assert!(!dir.path().join("swap").join("leftover").exists());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Scan finished"));
}

#[test]
fn test_score_json_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shard = dir.path().join("out").join("z");
    std::fs::create_dir_all(&shard).expect("mkdir");
    std::fs::write(shard.join("zlib-1.3.rpm.json"), RESULT).expect("write result");
    std::fs::write(dir.path().join("schema.toml"), SCHEMA).expect("write schema");

    let out = hardscore(
        &["score", "out", "--schema", "schema.toml", "--format", "json"],
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));

    let parsed: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout is JSON");
    // 5 + (20-10)/5*2 + 1 (stack) + 2 (strcpy)
    assert_eq!(parsed["packages"]["zlib-1.3.rpm"]["package_score"], 12.0);
}

#[test]
fn test_score_writes_output_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shard = dir.path().join("out").join("z");
    std::fs::create_dir_all(&shard).expect("mkdir");
    std::fs::write(shard.join("zlib-1.3.rpm.json"), RESULT).expect("write result");
    std::fs::write(shard.join("zzz.rpm.json"), "{ not json").expect("write broken");
    std::fs::write(dir.path().join("schema.toml"), SCHEMA).expect("write schema");

    let out = hardscore(
        &["score", "out", "-s", "schema.toml", "-o", "report.txt"],
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(0));
    let report = std::fs::read_to_string(dir.path().join("report.txt")).expect("report");
    assert!(report.contains("zlib-1.3.rpm"));
    assert!(report.contains("1 malformed result files skipped"));
}

#[test]
fn test_score_rejects_zero_stdev() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("out")).expect("mkdir");
    std::fs::write(
        dir.path().join("bad.toml"),
        SCHEMA.replacen("stdev = 5.0", "stdev = 0.0", 1),
    )
    .expect("write schema");

    let out = hardscore(&["score", "out", "--schema", "bad.toml"], dir.path());
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn test_init_writes_usable_schema() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = hardscore(&["init", "cfg"], dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert!(dir.path().join("cfg").join("hardscore.toml").is_file());

    std::fs::create_dir(dir.path().join("out")).expect("mkdir");
    let out = hardscore(
        &["score", "out", "--schema", "cfg/scoring.toml", "--format", "json"],
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(0), "{}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn test_zero_timeout_is_usage_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = hardscore(&["out", "repo", "swap", "--timeout", "0"], dir.path());
    assert_eq!(out.status.code(), Some(2));
    assert!(!dir.path().join("out").exists());
}
