//! Renderer error types.

use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while resolving, rendering, or exporting.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Image bytes could not be decoded.
    #[error("Failed to load resource: {0}")]
    Resource(String),

    /// Image bytes could not be fetched (network failure, refused origin, ...).
    #[error("Failed to fetch {source_ref}: {reason}")]
    Fetch {
        /// What was being fetched.
        source_ref: String,
        /// Why it failed.
        reason: String,
    },

    /// The base image is required but could not be resolved.
    #[error("Base image unavailable: {0}")]
    BaseImageUnavailable(String),

    /// No drawable output buffer could be obtained.
    #[error("Surface error: {0}")]
    Surface(String),

    /// Encoding or saving the export failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// The scene was replaced while its images were resolving.
    #[error("Scene was replaced before its images resolved")]
    Stale,

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
