use std::future::Future;

use anyhow::{Result, anyhow};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Runs until `signal` resolves or a task stops on its own, then cancels
/// `shutdown` and joins every task.
///
/// Each task yields its name when it returns. A task returning before the
/// signal is an error so the process exits and can be restarted.
pub async fn supervise<F>(
    shutdown: CancellationToken,
    signal: F,
    mut tasks: JoinSet<&'static str>,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(signal);

    let early = tokio::select! {
        _ = &mut signal => {
            info!("Shutdown signal received");
            None
        }
        finished = tasks.join_next() => Some(finished),
    };

    shutdown.cancel();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(name) => info!("{} stopped", name),
            Err(e) => error!("Task failed: {}", e),
        }
    }

    match early {
        None => Ok(()),
        Some(Some(Ok(name))) => Err(anyhow!("{} stopped before shutdown was requested", name)),
        Some(Some(Err(e))) => Err(anyhow!("task failed before shutdown was requested: {}", e)),
        Some(None) => Err(anyhow!("nothing to supervise")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn until_cancelled(set: &mut JoinSet<&'static str>, scope: &CancellationToken, name: &'static str) {
        let scope = scope.clone();
        set.spawn(async move {
            scope.cancelled().await;
            name
        });
    }

    #[tokio::test]
    async fn signal_cancels_and_joins_tasks() {
        let shutdown = CancellationToken::new();
        let mut tasks = JoinSet::new();
        until_cancelled(&mut tasks, &shutdown, "consumer");
        until_cancelled(&mut tasks, &shutdown, "worker");

        let result = timeout(
            Duration::from_secs(5),
            supervise(shutdown.clone(), async {}, tasks),
        )
        .await
        .unwrap();

        assert!(result.is_ok());
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn task_ending_early_is_an_error() {
        let shutdown = CancellationToken::new();
        let mut tasks = JoinSet::new();
        // Delivery stream closed by the broker.
        tasks.spawn(async { "consumer" });
        until_cancelled(&mut tasks, &shutdown, "worker");

        let err = timeout(
            Duration::from_secs(5),
            supervise(shutdown.clone(), std::future::pending(), tasks),
        )
        .await
        .expect("supervisor returns without a signal")
        .unwrap_err();

        assert!(err.to_string().contains("consumer"));
        assert!(shutdown.is_cancelled(), "remaining tasks are stopped");
    }

    #[tokio::test]
    async fn panicking_task_is_an_error() {
        let shutdown = CancellationToken::new();
        let mut tasks: JoinSet<&'static str> = JoinSet::new();
        tasks.spawn(async { panic!("worker blew up") });

        let result = supervise(shutdown, std::future::pending(), tasks).await;
        assert!(result.is_err());
    }
}
