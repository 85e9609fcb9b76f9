//! # Circuit Breaker Implementation
//!
//! Classic three-state circuit breaker guarding one logical endpoint group.
//! Closed circuits pass calls through; a run of consecutive transient
//! failures opens the circuit, which rejects calls until a cooldown elapses.
//! The half-open state admits exactly one trial call: success closes the
//! circuit, failure reopens it and restarts the cooldown clock.

use crate::config::CircuitBreakerSettings;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - a single trial call is allowed through
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Fast-fail error returned while a circuit is rejecting calls
#[derive(Debug, Clone, thiserror::Error)]
#[error("Circuit breaker is open for {endpoint_group} (retry in {retry_after:?})")]
pub struct CircuitOpenError {
    pub endpoint_group: String,
    pub retry_after: Duration,
}

/// Snapshot of a circuit's counters for observability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CircuitMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u32,
    pub times_opened: u64,
}

#[derive(Debug, Default)]
struct CircuitInner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    metrics: CircuitMetrics,
}

/// Circuit breaker for one logical endpoint group
#[derive(Debug)]
pub struct EndpointCircuit {
    /// Endpoint group name for logging and error reporting
    endpoint_group: String,

    /// Current circuit state (atomic for lock-free reads)
    state: AtomicU8,

    /// Threshold and cooldown configuration
    settings: CircuitBreakerSettings,

    /// Failure bookkeeping protected by mutex
    inner: Mutex<CircuitInner>,
}

impl EndpointCircuit {
    /// Create a new circuit breaker for the given endpoint group
    pub fn new(endpoint_group: String, settings: CircuitBreakerSettings) -> Self {
        info!(
            endpoint_group = %endpoint_group,
            failure_threshold = settings.failure_threshold,
            cooldown_ms = settings.cooldown_ms,
            "🛡️ Circuit breaker initialized"
        );

        Self {
            endpoint_group,
            state: AtomicU8::new(CircuitState::Closed as u8),
            settings,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Get the endpoint group this circuit protects
    pub fn endpoint_group(&self) -> &str {
        &self.endpoint_group
    }

    /// Check whether a call may proceed, transitioning open circuits to
    /// half-open once the cooldown has elapsed. Half-open circuits admit
    /// exactly one trial call; concurrent callers are rejected until the
    /// trial resolves.
    pub async fn try_acquire(&self) -> Result<(), CircuitOpenError> {
        match self.state() {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let mut inner = self.inner.lock().await;
                let opened_at = match inner.opened_at {
                    Some(t) => t,
                    None => {
                        // Open without a timestamp should not happen; allow the call
                        warn!(endpoint_group = %self.endpoint_group, "Circuit open but no timestamp recorded");
                        return Ok(());
                    }
                };

                let elapsed = opened_at.elapsed();
                if elapsed >= self.settings.cooldown() {
                    self.state
                        .store(CircuitState::HalfOpen as u8, Ordering::Release);
                    inner.trial_in_flight = true;
                    info!(
                        endpoint_group = %self.endpoint_group,
                        "🟡 Circuit breaker half-open (testing recovery)"
                    );
                    Ok(())
                } else {
                    Err(CircuitOpenError {
                        endpoint_group: self.endpoint_group.clone(),
                        retry_after: self.settings.cooldown() - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                let mut inner = self.inner.lock().await;
                if inner.trial_in_flight {
                    Err(CircuitOpenError {
                        endpoint_group: self.endpoint_group.clone(),
                        retry_after: self.settings.cooldown(),
                    })
                } else {
                    inner.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Record a successful call. Closes a half-open circuit and resets the
    /// consecutive failure count.
    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.metrics.total_calls += 1;
        inner.metrics.success_count += 1;
        inner.consecutive_failures = 0;
        inner.metrics.consecutive_failures = 0;

        match self.state() {
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                inner.opened_at = None;
                self.state
                    .store(CircuitState::Closed as u8, Ordering::Release);
                info!(
                    endpoint_group = %self.endpoint_group,
                    total_calls = inner.metrics.total_calls,
                    "🟢 Circuit breaker closed (recovered)"
                );
            }
            CircuitState::Closed => {
                debug!(endpoint_group = %self.endpoint_group, "🟢 Call succeeded");
            }
            CircuitState::Open => {
                warn!(endpoint_group = %self.endpoint_group, "Success recorded while circuit is open");
            }
        }
    }

    /// Record a failed call. Crossing the failure threshold opens the
    /// circuit; any failure during a half-open trial reopens it and restarts
    /// the cooldown clock.
    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.metrics.total_calls += 1;
        inner.metrics.failure_count += 1;
        inner.consecutive_failures += 1;
        inner.metrics.consecutive_failures = inner.consecutive_failures;

        match self.state() {
            CircuitState::Closed => {
                if inner.consecutive_failures >= self.settings.failure_threshold {
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen => {
                inner.trial_in_flight = false;
                self.open(&mut inner);
            }
            CircuitState::Open => {
                // Already open, just record the failure
            }
        }
    }

    /// Release a half-open trial slot when the trial ended without a verdict
    /// on upstream health (a permanent 4xx, rate limiting). The circuit stays
    /// half-open and the next caller gets a fresh trial.
    pub async fn release_trial(&self) {
        let mut inner = self.inner.lock().await;
        if self.state() == CircuitState::HalfOpen && inner.trial_in_flight {
            inner.trial_in_flight = false;
            debug!(
                endpoint_group = %self.endpoint_group,
                "Half-open trial released without outcome"
            );
        }
    }

    fn open(&self, inner: &mut CircuitInner) {
        self.state.store(CircuitState::Open as u8, Ordering::Release);
        inner.opened_at = Some(Instant::now());
        inner.metrics.times_opened += 1;

        warn!(
            endpoint_group = %self.endpoint_group,
            consecutive_failures = inner.consecutive_failures,
            failure_threshold = self.settings.failure_threshold,
            cooldown_ms = self.settings.cooldown_ms,
            "🔴 Circuit breaker opened (failing fast)"
        );
    }

    /// Get current metrics snapshot
    pub async fn metrics(&self) -> CircuitMetrics {
        let inner = self.inner.lock().await;
        inner.metrics.clone()
    }
}
