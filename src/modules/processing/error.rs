use std::any::Any;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::infrastructure::ffmpeg::EncoderError;

/// Failure classes used to decide how a job failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any I/O; never retried.
    Validation,
    /// Storage or filesystem failure.
    TransientIo,
    /// Encoder or prober failure, carrying captured diagnostics.
    ProcessExecution,
    /// A bug surfaced as a panic inside the job.
    Internal,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Availability,
    Prepare,
    Download,
    Probe,
    Segment,
    Thumbnail,
    Upload,
    /// No finer stage is known.
    Job,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Availability => "availability",
            Stage::Prepare => "prepare",
            Stage::Download => "download",
            Stage::Probe => "probe",
            Stage::Segment => "segment",
            Stage::Thumbnail => "thumbnail",
            Stage::Upload => "upload",
            Stage::Job => "job",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("invalid object key {0:?}: expected \"{{bucket}}/{{path}}\"")]
    InvalidObjectKey(String),

    #[error("invalid video id in {key:?}: {reason}")]
    InvalidVideoId { key: String, reason: String },

    #[error("encoder not available: {0}")]
    EncoderUnavailable(#[source] EncoderError),

    #[error("I/O error during {stage} at {path}: {source}")]
    Io {
        stage: Stage,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to download {bucket}/{key}: {source}")]
    Download {
        bucket: String,
        key: String,
        source: anyhow::Error,
    },

    #[error("failed to probe input file: {0}")]
    Probe(#[source] EncoderError),

    #[error("failed to segment video: {0}")]
    Segment(#[source] EncoderError),

    #[error("failed to upload {key}: {source}")]
    Upload { key: String, source: anyhow::Error },

    #[error("job cancelled during {0}")]
    Cancelled(Stage),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::MalformedPayload(_)
            | PipelineError::InvalidObjectKey(_)
            | PipelineError::InvalidVideoId { .. } => ErrorKind::Validation,
            PipelineError::Io { .. }
            | PipelineError::Download { .. }
            | PipelineError::Upload { .. } => ErrorKind::TransientIo,
            PipelineError::EncoderUnavailable(_)
            | PipelineError::Probe(_)
            | PipelineError::Segment(_) => ErrorKind::ProcessExecution,
            PipelineError::Cancelled(_) => ErrorKind::Cancelled,
            PipelineError::Panicked(_) => ErrorKind::Internal,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::MalformedPayload(_)
            | PipelineError::InvalidObjectKey(_)
            | PipelineError::InvalidVideoId { .. } => Stage::Validate,
            PipelineError::EncoderUnavailable(_) => Stage::Availability,
            PipelineError::Io { stage, .. } => *stage,
            PipelineError::Download { .. } => Stage::Download,
            PipelineError::Probe(_) => Stage::Probe,
            PipelineError::Segment(_) => Stage::Segment,
            PipelineError::Upload { .. } => Stage::Upload,
            PipelineError::Cancelled(stage) => *stage,
            PipelineError::Panicked(_) => Stage::Job,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Encoder stderr captured for the failure, if any.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            PipelineError::EncoderUnavailable(e)
            | PipelineError::Probe(e)
            | PipelineError::Segment(e) => e.diagnostics(),
            _ => &[],
        }
    }

    pub fn io(stage: Stage, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            stage,
            path: path.into(),
            source,
        }
    }

    /// Wraps a caught panic payload.
    pub fn panicked(payload: &(dyn Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        PipelineError::Panicked(message)
    }

    /// Wraps an encoder failure for `stage`, keeping cancellation distinct.
    pub fn encoder(stage: Stage, error: EncoderError) -> Self {
        if error.is_cancelled() {
            return PipelineError::Cancelled(stage);
        }
        match stage {
            Stage::Availability => PipelineError::EncoderUnavailable(error),
            Stage::Probe => PipelineError::Probe(error),
            _ => PipelineError::Segment(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_failure() -> EncoderError {
        EncoderError::ProcessFailed {
            program: "ffmpeg".to_string(),
            code: Some(1),
            stderr: vec!["moov atom not found".to_string()],
        }
    }

    #[test]
    fn classifies_failures() {
        let validation = PipelineError::InvalidObjectKey("nokey".to_string());
        assert_eq!(validation.kind(), ErrorKind::Validation);
        assert_eq!(validation.stage(), Stage::Validate);

        let upload = PipelineError::Upload {
            key: "k".to_string(),
            source: anyhow::anyhow!("connection reset"),
        };
        assert_eq!(upload.kind(), ErrorKind::TransientIo);
        assert_eq!(upload.stage(), Stage::Upload);

        let probe = PipelineError::encoder(Stage::Probe, process_failure());
        assert_eq!(probe.kind(), ErrorKind::ProcessExecution);
        assert_eq!(probe.diagnostics(), ["moov atom not found"]);
    }

    #[test]
    fn cancelled_encoder_runs_are_not_failures() {
        let err = PipelineError::encoder(
            Stage::Segment,
            EncoderError::Rendition {
                quality: "720p".to_string(),
                source: Box::new(EncoderError::Cancelled {
                    program: "ffmpeg".to_string(),
                }),
            },
        );

        assert!(err.is_cancelled());
        assert_eq!(err.stage(), Stage::Segment);
        assert_eq!(err.to_string(), "job cancelled during segment");
    }

    #[test]
    fn panics_keep_their_message() {
        let err = PipelineError::panicked(&"encoder exploded");
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.stage(), Stage::Job);
        assert_eq!(err.to_string(), "job panicked: encoder exploded");

        let owned: Box<dyn Any + Send> = Box::new(format!("index {} out of range", 3));
        assert_eq!(
            PipelineError::panicked(owned.as_ref()).to_string(),
            "job panicked: index 3 out of range"
        );
    }
}
