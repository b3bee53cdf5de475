use std::path::PathBuf;

use thiserror::Error;

/// Failures the sheet reader can report.
///
/// Only `ImageRead` and `Processing` ever reach the result record; a
/// `DebugWrite` or `Font` is downgraded to a warning and `Config` stops the
/// CLI before any image is touched.
#[derive(Debug, Error)]
pub enum OmrError {
    /// The source file is missing, unreadable or not a decodable image.
    #[error("Could not read image file")]
    ImageRead {
        path: PathBuf,
        reason: String,
    },

    /// Anything that goes wrong between preprocessing and grid analysis.
    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Could not save debug image {path:?}: {reason}")]
    DebugWrite { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Overlay font that could not be read or parsed.
    #[error("Could not load font {path:?}: {reason}")]
    Font { path: PathBuf, reason: String },
}

impl OmrError {
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, OmrError>;
