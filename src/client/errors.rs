//! # Upstream Error Taxonomy
//!
//! Classification of upstream failures drives the retry, circuit breaker,
//! and quota behavior of the resilient client. Transient errors are retried,
//! permanent errors surface immediately, and rate limits trigger a scheduled
//! wait instead of failure.

use crate::resilience::CircuitOpenError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Errors surfaced by the resilient client and its executors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiClientError {
    /// Retryable: timeouts, 5xx responses, connection resets
    #[error("Transient upstream error: {message}")]
    Transient { message: String },

    /// Not retried: 4xx responses other than 429
    #[error("Permanent upstream error (status {status}): {message}")]
    Permanent { status: u16, message: String },

    /// 429 or near-exhaustion; triggers a scheduled wait
    #[error("Rate limited by upstream: {message}")]
    RateLimited {
        reset_at: Option<DateTime<Utc>>,
        message: String,
    },

    /// Fast-fail while the endpoint group's circuit is open
    #[error("Circuit open for {endpoint_group} (retry in {retry_after:?})")]
    CircuitOpen {
        endpoint_group: String,
        retry_after: Duration,
    },

    /// The transient retry budget was consumed without success
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl ApiClientError {
    /// Whether the client should retry this error locally
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiClientError::Transient { .. } | ApiClientError::RateLimited { .. }
        )
    }
}

impl From<CircuitOpenError> for ApiClientError {
    fn from(err: CircuitOpenError) -> Self {
        ApiClientError::CircuitOpen {
            endpoint_group: err.endpoint_group,
            retry_after: err.retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ApiClientError::Transient {
            message: "timeout".into()
        }
        .is_transient());
        assert!(ApiClientError::RateLimited {
            reset_at: None,
            message: "429".into()
        }
        .is_transient());
        assert!(!ApiClientError::Permanent {
            status: 404,
            message: "not found".into()
        }
        .is_transient());
    }
}
