//! Error taxonomy for the scan pipeline
//!
//! Every variant is terminal for its own scope only: a sub-field of a binary
//! report, a single binary, or a single package. Nothing here aborts a run.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while discovering, extracting or analyzing packages
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("{tool} not found. Please install it first.")]
    ToolNotFound { tool: String },

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    Timeout { tool: String, timeout: Duration },

    #[error("unexpected {tool} output: {message}")]
    Parse { tool: String, message: String },

    #[error("extraction of {package} failed: {message}")]
    Extraction { package: String, message: String },

    #[error("metadata for {package} unavailable: {message}")]
    Metadata { package: String, message: String },

    #[error("repository root does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ScanResult<T> = Result<T, ScanError>;

impl ScanError {
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn extraction(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            package: package.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from a bounded operation running out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
