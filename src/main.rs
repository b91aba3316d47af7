use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use reel_transcoder::config::settings::AppConfig;
use reel_transcoder::infrastructure::ffmpeg::Encoder;
use reel_transcoder::infrastructure::queue::ConsumerOptions;
use reel_transcoder::infrastructure::queue::topics::{VIDEO_PROCESSING_GROUP, VIDEO_UPLOADED};
use reel_transcoder::state::AppState;
use reel_transcoder::workers::ingest::{IngestionConsumer, job_queue};
use reel_transcoder::workers::supervisor::supervise;
use reel_transcoder::workers::transcoder::TranscoderWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting transcoder...");

    let config = AppConfig::new().context("Invalid configuration")?;
    let state = AppState::connect(config).await?;

    let shutdown = CancellationToken::new();
    match state.encoder.version(&shutdown).await {
        Ok(version) => info!("🎬 Using {}", version),
        Err(e) => error!("ffmpeg is not available yet: {}", e),
    }

    let (sender, receiver) = job_queue(state.config.batch_size);
    let options = ConsumerOptions {
        prefetch: state.config.prefetch(),
        consumer_timeout: state.config.consumer_timeout,
    };
    let deliveries = state
        .queue
        .subscribe(VIDEO_PROCESSING_GROUP, &[VIDEO_UPLOADED], options)
        .await?;

    let mut tasks = JoinSet::new();

    let consumer = IngestionConsumer::new(VIDEO_UPLOADED, sender);
    let scope = shutdown.clone();
    tasks.spawn(async move {
        consumer.run(scope, deliveries).await;
        "consumer"
    });

    let worker = TranscoderWorker::new(Arc::new(state.transcode_service()), receiver);
    let scope = shutdown.clone();
    tasks.spawn(async move {
        worker.run(scope).await;
        "worker"
    });

    let signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    };
    supervise(shutdown, signal, tasks).await?;

    info!("Transcoder stopped");
    Ok(())
}
