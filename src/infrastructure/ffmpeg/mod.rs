//! External encoder integration.
//!
//! [`Encoder`] is the seam the processing pipeline talks to; [`FFmpeg`] is the
//! subprocess-backed implementation and tests substitute in-memory doubles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub mod args;
pub mod constants;
pub mod error;
pub mod progress;
pub mod segment;
pub mod types;
pub mod wrapper;

pub use error::{EncoderError, Result};
pub use types::{FormatInfo, ProbeInfo, ProgressCallback, ProgressInfo, SegmentOptions, StreamInfo};
pub use wrapper::FFmpeg;

#[async_trait]
pub trait Encoder: Send + Sync {
    /// Succeeds when the encoder binary can be executed.
    async fn is_available(&self, cancel: &CancellationToken) -> Result<()>;

    /// First line of the encoder's version banner.
    async fn version(&self, cancel: &CancellationToken) -> Result<String>;

    async fn probe(&self, cancel: &CancellationToken, input: &Path) -> Result<ProbeInfo>;

    /// Encodes one HLS rendition into `output_dir`.
    async fn segment_video(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output_dir: &Path,
        options: &SegmentOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<()>;

    /// Encodes every rendition of `ladder` in order and writes the master
    /// playlist. Returns the master playlist path.
    async fn segment_video_multi_quality(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output_dir: &Path,
        ladder: &[SegmentOptions],
        progress: Option<ProgressCallback>,
    ) -> Result<PathBuf> {
        segment::segment_ladder(self, cancel, input, output_dir, ladder, progress).await
    }

    async fn create_thumbnail(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
        time_offset: &str,
        size: Option<(u32, u32)>,
    ) -> Result<()>;
}
