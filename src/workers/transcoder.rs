use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_channel::Receiver;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::ingest::QueuedJob;
use crate::modules::processing::{JobReport, TranscodeService};

/// Drains the job queue one job at a time.
pub struct TranscoderWorker {
    service: Arc<TranscodeService>,
    queue: Receiver<QueuedJob>,
    reports: Option<mpsc::UnboundedSender<JobReport>>,
}

impl TranscoderWorker {
    pub fn new(service: Arc<TranscodeService>, queue: Receiver<QueuedJob>) -> Self {
        Self {
            service,
            queue,
            reports: None,
        }
    }

    /// Forwards every finished job's report to `reports`.
    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<JobReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Runs until `scope` is cancelled or the queue is closed and empty.
    /// Jobs still queued at cancellation are abandoned, not drained.
    pub async fn run(&self, scope: CancellationToken) {
        info!("🎥 Starting Transcoder Worker...");

        loop {
            let job = tokio::select! {
                biased;
                _ = scope.cancelled() => break,
                job = self.queue.recv() => match job {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };

            if let Some(report) = self.process(job).await {
                if let Some(reports) = &self.reports {
                    let _ = reports.send(report);
                }
            }
        }

        let abandoned = self.queue.len();
        if abandoned > 0 {
            warn!("🎥 Transcoder Worker stopped with {} queued jobs abandoned", abandoned);
        } else {
            info!("🎥 Transcoder Worker stopped");
        }
    }

    /// Runs one job and settles its message: ack on success, reject on
    /// failure, nothing when cancelled so the broker redelivers it.
    ///
    /// Returns `None` if handling the message panicked outside the job.
    pub async fn process(&self, job: QueuedJob) -> Option<JobReport> {
        let QueuedJob { scope, message } = job;

        let outcome = AssertUnwindSafe(self.service.handle_message(&scope, &message.payload))
            .catch_unwind()
            .await;

        let report = match outcome {
            Ok(report) => report,
            Err(_) => {
                error!("❌ Job panicked; rejecting message");
                if let Err(e) = message.reject().await {
                    error!("Failed to reject message: {:#}", e);
                }
                return None;
            }
        };

        let settled = match &report.result {
            Ok(_) => message.ack().await,
            Err(e) if e.is_cancelled() => {
                info!("Leaving cancelled job unacknowledged for redelivery");
                Ok(())
            }
            Err(e) => {
                error!(
                    video_id = ?report.video_id,
                    key = report.source_key.as_deref().unwrap_or_default(),
                    stage = %e.stage(),
                    kind = ?e.kind(),
                    "❌ Failed to process job: {}",
                    e
                );
                if !e.diagnostics().is_empty() {
                    error!("Encoder output:\n{}", e.diagnostics().join("\n"));
                }
                message.reject().await
            }
        };

        if let Err(e) = settled {
            error!("Failed to settle message: {:#}", e);
        }

        Some(report)
    }
}
