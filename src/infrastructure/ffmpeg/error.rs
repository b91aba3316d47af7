use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EncoderError>;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("invalid input file {path}: {reason}")]
    InvalidInput { path: PathBuf, reason: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// Non-zero exit. `stderr` holds every diagnostic line the process wrote.
    #[error("{program} process failed with exit code {code:?}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stderr: Vec<String>,
    },

    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("failed to parse probe output: {0}")]
    ProbeDecode(#[from] serde_json::Error),

    #[error("unable to parse {program} version output")]
    Version { program: String },

    #[error("failed to segment quality level {quality}: {source}")]
    Rendition {
        quality: String,
        source: Box<EncoderError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncoderError {
    /// Diagnostic lines captured from the failed process, if any.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            EncoderError::ProcessFailed { stderr, .. } => stderr,
            EncoderError::Rendition { source, .. } => source.diagnostics(),
            _ => &[],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            EncoderError::Cancelled { .. } => true,
            EncoderError::Rendition { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
