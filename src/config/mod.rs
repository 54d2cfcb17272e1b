//! Configuration module for hardscore
//!
//! This module handles:
//! - The score schema (scoring.toml)
//! - Scan settings: tool paths, timeouts, worker count

mod scan_config;
mod schema;

pub use scan_config::{
    ScanConfig, ToolPaths, DEFAULT_COMPLEXITY_TIMEOUT_SECS, DEFAULT_REPORT_HEADER_LINES,
    DEFAULT_TOOL_TIMEOUT_SECS, EXAMPLE_SCAN_CONFIG,
};
pub use schema::{
    load_schema, BadFunctions, ComplexitySchema, MetricStats, ScoreSchema, EXAMPLE_SCHEMA,
};
