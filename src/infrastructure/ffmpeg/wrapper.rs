use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Encoder;
use super::args;
use super::error::{EncoderError, Result};
use super::progress::{ProgressParser, format_time_string};
use super::types::{ProbeInfo, ProgressCallback, SegmentOptions};

const PROGRESS_BUFFER: usize = 100;

/// Subprocess-backed encoder driving the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FFmpeg {
    binary_path: PathBuf,
    probe_path: PathBuf,
    timeout: Option<Duration>,
}

enum Outcome {
    Exited(ExitStatus),
    Cancelled,
    TimedOut(Duration),
}

impl FFmpeg {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        let binary_path = binary_path.into();
        let probe_path = derive_probe_path(&binary_path);
        Self {
            binary_path,
            probe_path,
            timeout: None,
        }
    }

    pub fn with_probe_path(mut self, probe_path: impl Into<PathBuf>) -> Self {
        self.probe_path = probe_path.into();
        self
    }

    /// Kills any invocation still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    pub fn probe_path(&self) -> &Path {
        &self.probe_path
    }

    /// Runs the encoder, streaming stderr through the progress parser when a
    /// callback is given. On non-zero exit the error carries every stderr line.
    async fn run_command(
        &self,
        cancel: &CancellationToken,
        args: Vec<String>,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let program = self.binary_path.display().to_string();
        info!("Running ffmpeg command: {} {}", program, args.join(" "));

        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncoderError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("stderr was not captured"))?;

        let (lines_tx, parser) = match progress {
            Some(callback) => {
                let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
                (Some(tx), Some(tokio::spawn(track_progress(rx, callback))))
            }
            None => (None, None),
        };
        let reader = tokio::spawn(read_diagnostics(stderr, lines_tx));

        let outcome = tokio::select! {
            status = child.wait() => Outcome::Exited(status?),
            _ = cancel.cancelled() => Outcome::Cancelled,
            _ = expire(self.timeout) => Outcome::TimedOut(self.timeout.unwrap_or_default()),
        };

        if !matches!(outcome, Outcome::Exited(_)) {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill {}: {}", program, e);
            }
        }

        let stderr_lines = reader.await.unwrap_or_default();
        if let Some(parser) = parser {
            let _ = parser.await;
        }

        match outcome {
            Outcome::Exited(status) if status.success() => Ok(()),
            Outcome::Exited(status) => {
                error!(
                    code = ?status.code(),
                    "ffmpeg failed:\n{}",
                    stderr_lines.join("\n")
                );
                Err(EncoderError::ProcessFailed {
                    program,
                    code: status.code(),
                    stderr: stderr_lines,
                })
            }
            Outcome::Cancelled => {
                warn!("{} cancelled, process killed", program);
                Err(EncoderError::Cancelled { program })
            }
            Outcome::TimedOut(after) => {
                warn!("{} timed out after {:?}, process killed", program, after);
                Err(EncoderError::Timeout { program, after })
            }
        }
    }

    /// Runs `program` to completion and returns its stdout.
    async fn capture_output(
        &self,
        cancel: &CancellationToken,
        program: &Path,
        args: Vec<String>,
    ) -> Result<Vec<u8>> {
        let name = program.display().to_string();
        debug!("Running {} {}", name, args.join(" "));

        let child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncoderError::Spawn {
                program: name.clone(),
                source,
            })?;

        // Dropping the pending wait kills the child.
        let output = tokio::select! {
            output = child.wait_with_output() => output?,
            _ = cancel.cancelled() => return Err(EncoderError::Cancelled { program: name }),
            _ = expire(self.timeout) => {
                return Err(EncoderError::Timeout {
                    program: name,
                    after: self.timeout.unwrap_or_default(),
                });
            }
        };

        if !output.status.success() {
            return Err(EncoderError::ProcessFailed {
                program: name,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr)
                    .lines()
                    .map(str::to_string)
                    .collect(),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl Encoder for FFmpeg {
    async fn is_available(&self, cancel: &CancellationToken) -> Result<()> {
        let version = self.version(cancel).await?;
        debug!("Found {}", version);
        Ok(())
    }

    async fn version(&self, cancel: &CancellationToken) -> Result<String> {
        let stdout = self
            .capture_output(cancel, &self.binary_path, args::version_args())
            .await?;

        String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| EncoderError::Version {
                program: self.binary_path.display().to_string(),
            })
    }

    async fn probe(&self, cancel: &CancellationToken, input: &Path) -> Result<ProbeInfo> {
        validate_input(input).await?;

        let stdout = self
            .capture_output(cancel, &self.probe_path, args::probe_args(input))
            .await?;
        Ok(serde_json::from_slice(&stdout)?)
    }

    async fn segment_video(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output_dir: &Path,
        options: &SegmentOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        validate_input(input).await?;
        tokio::fs::create_dir_all(output_dir).await?;

        self.run_command(cancel, args::segment_args(input, output_dir, options), progress)
            .await
    }

    async fn create_thumbnail(
        &self,
        cancel: &CancellationToken,
        input: &Path,
        output: &Path,
        time_offset: &str,
        size: Option<(u32, u32)>,
    ) -> Result<()> {
        validate_input(input).await?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        self.run_command(
            cancel,
            args::thumbnail_args(input, output, time_offset, size),
            None,
        )
        .await
    }
}

/// `/usr/bin/ffmpeg` -> `/usr/bin/ffprobe`. Only the file name is rewritten.
pub fn derive_probe_path(binary_path: &Path) -> PathBuf {
    let file_name = binary_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let probe_name = if file_name.contains("ffmpeg") {
        file_name.replace("ffmpeg", "ffprobe")
    } else {
        "ffprobe".to_string()
    };

    binary_path.with_file_name(probe_name)
}

async fn validate_input(path: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| EncoderError::InvalidInput {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !metadata.is_file() {
        return Err(EncoderError::InvalidInput {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    Ok(())
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(after) => tokio::time::sleep(after).await,
        None => std::future::pending::<()>().await,
    }
}

/// Collects stderr lines until EOF. ffmpeg rewrites its status line with
/// carriage returns, so both `\n` and `\r` end a line.
async fn read_diagnostics(stderr: ChildStderr, lines_tx: Option<mpsc::Sender<String>>) -> Vec<String> {
    let mut collected = Vec::new();
    let mut segments = BufReader::new(stderr).split(b'\n');

    loop {
        let segment = match segments.next_segment().await {
            Ok(Some(segment)) => segment,
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading ffmpeg output: {}", e);
                break;
            }
        };

        for line in String::from_utf8_lossy(&segment).split('\r') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("ffmpeg: {}", line);

            if let Some(tx) = &lines_tx {
                // Parser gone; keep draining so the child never blocks.
                let _ = tx.send(line.to_string()).await;
            }
            collected.push(line.to_string());
        }
    }

    collected
}

async fn track_progress(mut lines_rx: mpsc::Receiver<String>, callback: ProgressCallback) {
    let mut parser = ProgressParser::new();
    let mut logged_decile = 0u64;

    while let Some(line) = lines_rx.recv().await {
        let Some(sample) = parser.feed(&line) else {
            continue;
        };

        let decile = (sample.percentage / 10.0) as u64;
        if decile > logged_decile {
            logged_decile = decile;
            info!(
                "Progress: {:.1}% ({} / {}) Speed: {}",
                sample.percentage,
                format_time_string(sample.current),
                format_time_string(sample.duration),
                sample.speed
            );
        }

        callback(sample);
    }
}
