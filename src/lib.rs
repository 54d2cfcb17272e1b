//! hardscore - static hardening assessment of packaged binaries
//!
//! The scan-and-score pipeline:
//! 1. [`walker`] finds packages that have no cached result yet
//! 2. [`extract`] unpacks each package into a private workspace and finds its binaries
//! 3. [`scan`] runs `hardening-check` and radare2 against every binary
//! 4. [`cache`] persists one JSON result per package
//! 5. [`scoring`] turns cached results into z-score normalized risk scores

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod reporters;
pub mod scan;
pub mod scoring;
pub mod tools;
pub mod walker;

pub use error::{ScanError, ScanResult};
