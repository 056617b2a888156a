//! Error types for the translator.

use std::path::{Path, PathBuf};

use thiserror::Error;
use usdio_core::usd::StageError;

/// Errors that end an import or export job.
///
/// Per-prim problems (unsupported types, missing parents, undecodable
/// attributes) never surface here; readers absorb them and log.
#[derive(Error, Debug)]
pub enum IoError {
    #[error("could not open archive {}: {reason}", path.display())]
    ArchiveOpenFailure { path: PathBuf, reason: String },

    #[error("no file format plugin registered for '{0}'")]
    PluginNotFound(String),

    #[error("job canceled")]
    CancellationRequested,

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid parameters: {0}")]
    Config(String),

    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl IoError {
    /// Classify a stage failure for `path`.
    pub fn from_stage(path: &Path, err: StageError) -> Self {
        match err {
            StageError::UnsupportedFormat(ext) => IoError::PluginNotFound(ext),
            other => IoError::ArchiveOpenFailure {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

pub type IoResult<T> = Result<T, IoError>;
