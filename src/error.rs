//! Error taxonomy for the recording pipeline.

use std::path::PathBuf;

/// Errors produced by the capture, pacing, encoding, and delivery components.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// Bad duration/fps/quality, rejected before any capture happens.
    #[error("invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    /// The requested capture region is empty or exceeds the display bounds.
    #[error("invalid capture region: {reason}")]
    InvalidRegion { reason: String },

    /// The display could not be read (no display session, permission denied).
    #[error("display capture unavailable: {reason}")]
    CaptureUnavailable { reason: String },

    /// The codec rejected a frame or the container could not be written.
    #[error("video encoding failed: {reason}")]
    EncodeFailure { reason: String },

    #[error("I/O error at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact sink rejected the finished recording.
    #[error("upload failed: {diagnostic}")]
    Upload { diagnostic: String },
}

impl RecorderError {
    pub(crate) fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_region(reason: impl Into<String>) -> Self {
        Self::InvalidRegion {
            reason: reason.into(),
        }
    }

    pub(crate) fn capture_unavailable(reason: impl Into<String>) -> Self {
        Self::CaptureUnavailable {
            reason: reason.into(),
        }
    }

    pub(crate) fn encode_failure(reason: impl Into<String>) -> Self {
        Self::EncodeFailure {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = RecorderError> = std::result::Result<T, E>;
