pub mod error;
pub mod events;
pub mod ladder;
pub mod model;
pub mod notifier;
pub mod service;

pub use error::{ErrorKind, PipelineError, Stage};
pub use notifier::{Notifier, ProgressPublisher};
pub use service::{JobReport, JobSummary, PipelineSettings, TranscodeService};
