//! Error types for cmsextract.
//!
//! Library crates use [`CmsExtractError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all cmsextract operations.
#[derive(Debug, thiserror::Error)]
pub enum CmsExtractError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Source could not be obtained: network, rendering, unsupported scheme,
    /// or a missing local file.
    #[error("fetch error for {source_label}: {message}")]
    Fetch {
        source_label: String,
        message: String,
    },

    /// Input is not text at all. Malformed HTML is never an error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Oracle failure. Absorbed by the classifier, never surfaced from a page run.
    #[error("classification error: {0}")]
    Classification(String),

    /// Filesystem failure while writing (or reading back) output documents.
    #[error("write error at {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (page invariant, duplicate slug, unknown model type).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Bundle packaging error.
    #[error("archive error: {0}")]
    Archive(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CmsExtractError>;

impl CmsExtractError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error for the given source.
    pub fn fetch(source: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            source_label: source.into(),
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = CmsExtractError::config("unknown provider");
        assert_eq!(err.to_string(), "config error: unknown provider");

        let err = CmsExtractError::fetch("https://example.com", "all renderers failed");
        assert_eq!(
            err.to_string(),
            "fetch error for https://example.com: all renderers failed"
        );

        let err = CmsExtractError::write(
            "/tmp/pages/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("pages/x.json"));
    }
}
