//! # Resilient API Client
//!
//! Composes the response cache, circuit breaker manager, and quota tracker
//! around an executor performing the actual network call. Call order per
//! request: cache lookup, circuit check, pre-emptive quota wait, then the
//! executor under retry-with-backoff. Results update cache, breaker, and
//! quota state.
//!
//! Concurrent calls for an identical request signature are deduplicated:
//! a single in-flight network round-trip is shared by all waiters.

use crate::client::cache::ResponseCache;
use crate::client::errors::ApiClientError;
use crate::client::quota::{QuotaTracker, QuotaUpdate};
use crate::client::signature::RequestSignature;
use crate::config::{CircuitBreakerSettings, ClientConfig};
use crate::resilience::{CircuitBreakerManager, CircuitState};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

/// Successful executor output: the response body plus any rate-limit
/// headers the upstream attached
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub value: Value,
    pub quota: Option<QuotaUpdate>,
}

type InFlightResult = Result<Value, ApiClientError>;

/// The composed, process-wide upstream client
pub struct ResilientApiClient {
    cache: ResponseCache,
    quota: QuotaTracker,
    breakers: CircuitBreakerManager,
    config: ClientConfig,
    in_flight: Mutex<HashMap<String, broadcast::Sender<InFlightResult>>>,
}

impl ResilientApiClient {
    pub fn new(config: ClientConfig, breaker_settings: CircuitBreakerSettings) -> Self {
        Self {
            cache: ResponseCache::new(config.cache_ttl()),
            quota: QuotaTracker::new(config.low_water_mark_remaining, config.max_quota_wait()),
            breakers: CircuitBreakerManager::new(breaker_settings),
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Execute a request through the full resilience stack. The `executor`
    /// performs one network attempt and classifies its own failure; it is
    /// invoked again on each retry.
    pub async fn execute<F, Fut>(
        &self,
        signature: &RequestSignature,
        executor: F,
    ) -> Result<Value, ApiClientError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<ApiResponse, ApiClientError>> + Send,
    {
        let key = signature.cache_key();

        // 1. Cache hit short-circuits everything: no network, no quota or
        //    circuit interaction.
        if let Some(value) = self.cache.get(&key) {
            debug!(signature = %key, "Cache hit");
            return Ok(value);
        }

        // 2. Deduplicate identical in-flight requests.
        let receiver = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(sender) => Some(sender.subscribe()),
                None => {
                    let (sender, _) = broadcast::channel(1);
                    in_flight.insert(key.clone(), sender);
                    None
                }
            }
        };

        if let Some(mut rx) = receiver {
            debug!(signature = %key, "Joining in-flight request");
            return match rx.recv().await {
                Ok(result) => result,
                Err(_) => Err(ApiClientError::Transient {
                    message: "in-flight request was dropped before completing".to_string(),
                }),
            };
        }

        let result = self.execute_guarded(signature, &executor).await;

        let sender = self.in_flight.lock().await.remove(&key);
        if let Some(sender) = sender {
            // Nobody listening is fine; send only fails without receivers
            let _ = sender.send(result.clone());
        }

        result
    }

    async fn execute_guarded<F, Fut>(
        &self,
        signature: &RequestSignature,
        executor: &F,
    ) -> Result<Value, ApiClientError>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<ApiResponse, ApiClientError>> + Send,
    {
        // 3. Circuit check: open circuits fail fast, no network attempted.
        let circuit = self.breakers.circuit_for(signature.endpoint_group());
        circuit.try_acquire().await?;

        // 4. Pre-emptive quota wait when the remaining budget is low.
        let category = signature.quota_category();
        if let Some(wait) = self.quota.required_wait(category) {
            info!(
                signature = %signature,
                category = %category,
                wait_ms = wait.as_millis() as u64,
                "⏳ Quota low - delaying call until reset"
            );
            tokio::time::sleep(wait).await;
        }

        // 5. Execute with retry-with-backoff for transient failures.
        let mut attempt: u32 = 0;
        loop {
            match executor().await {
                Ok(response) => {
                    if let Some(update) = response.quota {
                        self.quota.record(update);
                    }
                    circuit.record_success().await;
                    self.cache.insert(signature.cache_key(), response.value.clone());
                    return Ok(response.value);
                }
                Err(err @ ApiClientError::Permanent { .. }) => {
                    // Permanent failures propagate immediately and say
                    // nothing about upstream health; a half-open trial slot
                    // must be handed back so the circuit cannot wedge.
                    circuit.release_trial().await;
                    return Err(err);
                }
                Err(ApiClientError::RateLimited { reset_at, message }) => {
                    if let Some(reset) = reset_at {
                        self.quota.record_exhausted(category, reset);
                    }
                    if attempt >= self.config.max_retries {
                        circuit.release_trial().await;
                        return Err(ApiClientError::RateLimited { reset_at, message });
                    }
                    let wait = self
                        .quota
                        .required_wait(category)
                        .unwrap_or_else(|| self.config.base_backoff());
                    warn!(
                        signature = %signature,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited - waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    circuit.record_failure().await;
                    if circuit.state() == CircuitState::Open
                        || attempt >= self.config.max_retries
                    {
                        return Err(ApiClientError::RetriesExhausted {
                            attempts: attempt + 1,
                            last_error: err.to_string(),
                        });
                    }
                    let backoff = self.config.base_backoff() * 2u32.saturating_pow(attempt);
                    debug!(
                        signature = %signature,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Transient failure - backing off before retry"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
            attempt += 1;
        }
    }

    /// Quota tracker, exposed for observability
    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Circuit breaker manager, exposed for observability
    pub fn breakers(&self) -> &CircuitBreakerManager {
        &self.breakers
    }

    /// Response cache, exposed for explicit invalidation
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::quota::QuotaCategory;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_config(max_retries: u32) -> ClientConfig {
        ClientConfig {
            cache_ttl_secs: 60,
            max_retries,
            base_backoff_ms: 1,
            request_timeout_ms: 1_000,
            low_water_mark_remaining: 10,
            max_quota_wait_ms: 50,
        }
    }

    fn client(max_retries: u32, failure_threshold: u32) -> ResilientApiClient {
        ResilientApiClient::new(
            fast_config(max_retries),
            CircuitBreakerSettings {
                failure_threshold,
                cooldown_ms: 60_000,
            },
        )
    }

    #[tokio::test]
    async fn test_cache_hit_suppresses_executor() {
        let client = client(0, 5);
        let sig = RequestSignature::get("/repos/rust-lang/rust");
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let value = client
                .execute(&sig, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(ApiResponse {
                            value: json!({"id": 42}),
                            quota: None,
                        })
                    }
                })
                .await
                .unwrap();
            assert_eq!(value, json!({"id": 42}));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_circuit_opens_after_threshold_and_fails_fast() {
        let client = client(0, 2);
        let sig = RequestSignature::get("/repos/a/b");
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let result = client
                .execute(&sig, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<ApiResponse, _>(ApiClientError::Transient {
                            message: "503".to_string(),
                        })
                    }
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Third call must fail fast without invoking the executor
        let calls_clone = Arc::clone(&calls);
        let result = client
            .execute(&sig, move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ApiResponse {
                        value: json!(null),
                        quota: None,
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ApiClientError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let client = client(3, 5);
        let sig = RequestSignature::get("/repos/a/missing");
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let result = client
            .execute(&sig, move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<ApiResponse, _>(ApiClientError::Permanent {
                        status: 404,
                        message: "not found".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ApiClientError::Permanent { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_retried_until_budget_exhausted() {
        let client = client(2, 10);
        let sig = RequestSignature::get("/repos/a/b");
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let result = client
            .execute(&sig, move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<ApiResponse, _>(ApiClientError::Transient {
                        message: "connection reset".to_string(),
                    })
                }
            })
            .await;

        // max_retries = 2 means three attempts total
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result,
            Err(ApiClientError::RetriesExhausted { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_transient_then_success_recovers() {
        let client = client(2, 10);
        let sig = RequestSignature::get("/repos/a/b");
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = Arc::clone(&calls);
        let value = client
            .execute(&sig, move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiClientError::Transient {
                            message: "timeout".to_string(),
                        })
                    } else {
                        Ok(ApiResponse {
                            value: json!({"ok": true}),
                            quota: None,
                        })
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_trial_failure_frees_the_half_open_slot() {
        let client = ResilientApiClient::new(
            fast_config(0),
            CircuitBreakerSettings {
                failure_threshold: 1,
                cooldown_ms: 50,
            },
        );
        let sig = RequestSignature::get("/repos/a/b");

        // One transient failure opens the circuit
        let result = client
            .execute(&sig, || async {
                Err::<ApiResponse, _>(ApiClientError::Transient {
                    message: "503".to_string(),
                })
            })
            .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;

        // The half-open trial ends in a 404; the slot must be handed back
        let result = client
            .execute(&sig, || async {
                Err::<ApiResponse, _>(ApiClientError::Permanent {
                    status: 404,
                    message: "not found".to_string(),
                })
            })
            .await;
        assert!(matches!(result, Err(ApiClientError::Permanent { status: 404, .. })));

        // A healthy call gets a fresh trial and closes the circuit
        let value = client
            .execute(&sig, || async {
                Ok(ApiResponse {
                    value: json!({"ok": true}),
                    quota: None,
                })
            })
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_rate_limited_trial_exhaustion_frees_the_half_open_slot() {
        let client = ResilientApiClient::new(
            fast_config(0),
            CircuitBreakerSettings {
                failure_threshold: 1,
                cooldown_ms: 50,
            },
        );
        let sig = RequestSignature::get("/repos/a/b");

        let result = client
            .execute(&sig, || async {
                Err::<ApiResponse, _>(ApiClientError::Transient {
                    message: "503".to_string(),
                })
            })
            .await;
        assert!(result.is_err());

        tokio::time::sleep(Duration::from_millis(60)).await;

        // Trial exhausts its retry budget on a 429 without a reset hint
        let result = client
            .execute(&sig, || async {
                Err::<ApiResponse, _>(ApiClientError::RateLimited {
                    reset_at: None,
                    message: "429".to_string(),
                })
            })
            .await;
        assert!(matches!(result, Err(ApiClientError::RateLimited { .. })));

        let value = client
            .execute(&sig, || async {
                Ok(ApiResponse {
                    value: json!({"ok": true}),
                    quota: None,
                })
            })
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_rate_limit_marks_quota_exhausted() {
        let client = client(0, 10);
        let sig = RequestSignature::get("/repos/a/b");
        let reset_at = Utc::now() + ChronoDuration::seconds(30);

        let result = client
            .execute(&sig, move || async move {
                Err::<ApiResponse, _>(ApiClientError::RateLimited {
                    reset_at: Some(reset_at),
                    message: "429".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(ApiClientError::RateLimited { .. })));
        let snapshot = client.quota().snapshot(QuotaCategory::Core).unwrap();
        assert_eq!(snapshot.remaining, 0);
        // The next core-category call would wait (bounded by max_quota_wait)
        assert!(client.quota().required_wait(QuotaCategory::Core).is_some());
    }

    #[tokio::test]
    async fn test_success_refreshes_quota_snapshot() {
        let client = client(0, 10);
        let sig = RequestSignature::get("/users/octocat");

        client
            .execute(&sig, move || async move {
                Ok(ApiResponse {
                    value: json!({"login": "octocat"}),
                    quota: Some(QuotaUpdate {
                        category: QuotaCategory::Core,
                        limit: 5000,
                        remaining: 4999,
                        reset_at: Utc::now() + ChronoDuration::seconds(600),
                    }),
                })
            })
            .await
            .unwrap();

        let snapshot = client.quota().snapshot(QuotaCategory::Core).unwrap();
        assert_eq!(snapshot.remaining, 4999);
    }

    #[tokio::test]
    async fn test_concurrent_identical_signatures_share_one_round_trip() {
        let client = Arc::new(client(0, 10));
        let sig = RequestSignature::get("/repos/rust-lang/rust");
        let calls = Arc::new(AtomicUsize::new(0));

        let make_call = |client: Arc<ResilientApiClient>,
                         sig: RequestSignature,
                         calls: Arc<AtomicUsize>| async move {
            client
                .execute(&sig, move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(ApiResponse {
                            value: json!({"id": 7}),
                            quota: None,
                        })
                    }
                })
                .await
        };

        let (a, b) = tokio::join!(
            make_call(Arc::clone(&client), sig.clone(), Arc::clone(&calls)),
            make_call(Arc::clone(&client), sig.clone(), Arc::clone(&calls)),
        );

        assert_eq!(a.unwrap(), json!({"id": 7}));
        assert_eq!(b.unwrap(), json!({"id": 7}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
