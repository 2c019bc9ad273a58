use std::{fmt::Display, future::Future, time::Duration};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::ConnectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Fixed-delay, bounded-attempt connector shared by every startup dependency.
///
/// The connect operation is injected, so the retry loop knows nothing about
/// sockets and can be driven by a closure in tests.
#[derive(Debug)]
pub struct RetryConnector {
    target: String,
    max_attempts: u32,
    delay: Duration,
    state: ConnectionState,
}

impl RetryConnector {
    pub fn new(target: impl Into<String>, max_attempts: u32, delay: Duration) -> Self {
        Self {
            target: target.into(),
            max_attempts: max_attempts.max(1),
            delay,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub async fn connect<F, Fut, T, E>(&mut self, mut operation: F) -> Result<T, ConnectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.state = ConnectionState::Connecting;

            match operation().await {
                Ok(connection) => {
                    self.state = ConnectionState::Connected;
                    info!(target_service = %self.target, attempt, "Connection established");
                    return Ok(connection);
                }
                Err(e) => {
                    self.state = ConnectionState::Disconnected;

                    if attempt >= self.max_attempts {
                        error!(
                            target_service = %self.target,
                            max_attempts = self.max_attempts,
                            error = %e,
                            "Giving up on connection"
                        );
                        return Err(ConnectError {
                            target: self.target.clone(),
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    warn!(
                        target_service = %self.target,
                        "Connect error (attempt {}/{}): {}",
                        attempt,
                        self.max_attempts,
                        e
                    );

                    sleep(self.delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use super::*;

    #[tokio::test]
    async fn connects_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut connector = RetryConnector::new("broker", 5, Duration::from_millis(1));

        let counter = Arc::clone(&calls);
        let result = connector
            .connect(|| {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("connection refused")
                    } else {
                        Ok("connection")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "connection");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(connector.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn exhausting_attempts_is_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut connector = RetryConnector::new("broker", 4, Duration::from_millis(1));

        let counter = Arc::clone(&calls);
        let err = connector
            .connect(|| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>("connection refused")
                }
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last_error, "connection refused");
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn waits_between_attempts() {
        let mut connector = RetryConnector::new("store", 3, Duration::from_millis(30));
        let start = tokio::time::Instant::now();

        let _ = connector
            .connect(|| async { Err::<(), _>("down") })
            .await;

        assert!(start.elapsed() >= Duration::from_millis(60));
    }
}
