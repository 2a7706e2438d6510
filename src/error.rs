//! Error taxonomy for context gathering.
//!
//! Per-repository failures (`NotFound`, `Fetch`, `Io`) are isolated by the
//! [`Gatherer`](crate::gather::Gatherer) and only surface as diagnostics.
//! Summarization has no error type: it always fits its budget.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    /// A local repository path or an enclosing version-control root is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// Clone or refresh of a remote repository failed with no usable cache.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The walk root (or another required path) could not be read.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested source has no collector behind it.
    #[error("unsupported source: {0}")]
    Unsupported(String),

    /// A plugged-in collector failed for a source whose failure is fatal.
    #[error("{name} collection failed: {reason}")]
    Collector { name: String, reason: String },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ContextError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContextError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        ContextError::Fetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable code, carried by `RepoSkipped` diagnostics.
    pub fn code(&self) -> &'static str {
        match self {
            ContextError::NotFound(_) => "not_found",
            ContextError::Fetch { .. } => "fetch_error",
            ContextError::Io { .. } => "io_error",
            ContextError::Unsupported(_) => "unsupported",
            ContextError::Collector { .. } => "collector_error",
            ContextError::Cancelled => "cancelled",
            ContextError::Config(_) => "config_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ContextError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ContextError::NotFound("x".into()).code(), "not_found");
        assert_eq!(ContextError::fetch("u", "r").code(), "fetch_error");
        assert_eq!(ContextError::Cancelled.code(), "cancelled");
    }

    #[test]
    fn test_fetch_display_includes_url() {
        let err = ContextError::fetch("https://example.com/a.git", "exit 128");
        assert_eq!(
            err.to_string(),
            "fetch failed for https://example.com/a.git: exit 128"
        );
    }
}
