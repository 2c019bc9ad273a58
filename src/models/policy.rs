use std::fmt::{Display, Formatter, Result};

use serde::Deserialize;

/// Config-level name of a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPolicyKind {
    Bounded,
    Unbounded,
}

/// How a delivery worker reacts to a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Republish with an incremented `retryAttempt` until `max_retries`,
    /// then mark the record `Failed`.
    BoundedRetry { max_retries: u32 },
    /// Nack with requeue and let the broker redeliver forever.
    UnboundedRedeliver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Requeue { next_attempt: u32 },
    GiveUp,
    Redeliver,
}

impl RetryPolicy {
    pub fn from_kind(kind: RetryPolicyKind, max_retries: u32) -> Self {
        match kind {
            RetryPolicyKind::Bounded => RetryPolicy::BoundedRetry { max_retries },
            RetryPolicyKind::Unbounded => RetryPolicy::UnboundedRedeliver,
        }
    }

    pub fn on_failure(&self, retry_attempt: u32) -> RetryDecision {
        match *self {
            RetryPolicy::BoundedRetry { max_retries } if retry_attempt < max_retries => {
                RetryDecision::Requeue {
                    next_attempt: retry_attempt + 1,
                }
            }
            RetryPolicy::BoundedRetry { .. } => RetryDecision::GiveUp,
            RetryPolicy::UnboundedRedeliver => RetryDecision::Redeliver,
        }
    }
}

impl Display for RetryPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            RetryPolicy::BoundedRetry { max_retries } => {
                write!(f, "bounded_retry(max={})", max_retries)
            }
            RetryPolicy::UnboundedRedeliver => write!(f, "unbounded_redeliver"),
        }
    }
}
