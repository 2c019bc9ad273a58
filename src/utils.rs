use std::future::Future;

use anyhow::{Error, Result, anyhow};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LogFormat;

pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(true);

    // A second init (e.g. from tests) is not an error worth failing on.
    let _ = match format {
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Drives `main_task` to completion while watching `background`.
///
/// A background task that finishes cleanly is left alone and `main_task` keeps
/// running. A background failure (error or panic) ends `main_task` and is
/// returned. The background task is aborted once `main_task` is done.
pub async fn run_with_background<F>(
    main_task: F,
    mut background: JoinHandle<Result<()>>,
) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let result = tokio::select! {
        result = main_task => result,
        e = background_failure(&mut background) => {
            error!(error = %format!("{:#}", e), "Background task failed");
            Err(e)
        }
    };

    if !background.is_finished() {
        background.abort();
    }

    result
}

async fn background_failure(background: &mut JoinHandle<Result<()>>) -> Error {
    match background.await {
        Ok(Ok(())) => std::future::pending().await,
        Ok(Err(e)) => e,
        Err(e) => anyhow!("background task panicked: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn background_failure_is_returned() {
        let background = tokio::spawn(async { Err(anyhow!("address in use")) });

        let result = run_with_background(std::future::pending(), background).await;

        assert!(result.unwrap_err().to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn clean_background_exit_does_not_stop_main_task() {
        let background = tokio::spawn(async { Ok(()) });

        let result = run_with_background(
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(())
            },
            background,
        )
        .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn main_task_error_wins_and_background_is_aborted() {
        let background = tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok(())
        });

        let result =
            run_with_background(async { Err(anyhow!("consumer closed")) }, background).await;

        assert!(result.unwrap_err().to_string().contains("consumer closed"));
    }
}
