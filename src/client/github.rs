//! # GitHub API Surface
//!
//! Typed endpoint wrappers over the resilient client. Each wrapper builds a
//! request signature, performs the network call through `reqwest`, classifies
//! failures into the client error taxonomy, and extracts the `X-RateLimit-*`
//! headers for the quota tracker.
//!
//! The built-in pipelines consume the repository endpoints; the pull request,
//! commit, user, and search wrappers back caller-defined stages that ingest
//! those entities.

use crate::client::errors::ApiClientError;
use crate::client::quota::{QuotaCategory, QuotaTracker, QuotaUpdate};
use crate::client::resilient::{ApiResponse, ResilientApiClient};
use crate::client::signature::RequestSignature;
use crate::config::{CircuitBreakerSettings, ClientConfig, GithubApiConfig};
use chrono::{TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// GitHub API client routing every call through the resilience stack
#[derive(Clone)]
pub struct GitHubApi {
    http: reqwest::Client,
    base_url: String,
    resilient: Arc<ResilientApiClient>,
}

impl GitHubApi {
    /// Build the API surface. Fails on malformed token material or an
    /// unbuildable TLS stack rather than deferring the problem to call time.
    pub fn new(
        github: &GithubApiConfig,
        client_config: ClientConfig,
        breaker_settings: CircuitBreakerSettings,
    ) -> Result<Self, ApiClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&github.user_agent).map_err(|e| {
                ApiClientError::Permanent {
                    status: 0,
                    message: format!("invalid user agent: {e}"),
                }
            })?,
        );

        if let Some(token) = &github.token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                    ApiClientError::Permanent {
                        status: 0,
                        message: format!("invalid token: {e}"),
                    }
                })?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(client_config.request_timeout())
            .build()
            .map_err(|e| ApiClientError::Permanent {
                status: 0,
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: github.base_url.trim_end_matches('/').to_string(),
            resilient: Arc::new(ResilientApiClient::new(client_config, breaker_settings)),
        })
    }

    /// Fetch repository metadata: `GET /repos/{owner}/{repo}`
    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<Value, ApiClientError> {
        self.execute(RequestSignature::get(format!("/repos/{owner}/{repo}")))
            .await
    }

    /// Fetch one pull request: `GET /repos/{owner}/{repo}/pulls/{number}`
    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Value, ApiClientError> {
        self.execute(RequestSignature::get(format!(
            "/repos/{owner}/{repo}/pulls/{number}"
        )))
        .await
    }

    /// Fetch one commit: `GET /repos/{owner}/{repo}/commits/{sha}`
    pub async fn get_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Value, ApiClientError> {
        self.execute(RequestSignature::get(format!(
            "/repos/{owner}/{repo}/commits/{sha}"
        )))
        .await
    }

    /// Fetch a user profile: `GET /users/{username}`
    pub async fn get_user(&self, username: &str) -> Result<Value, ApiClientError> {
        self.execute(RequestSignature::get(format!("/users/{username}")))
            .await
    }

    /// Search repositories: `GET /search/repositories` (search quota bucket)
    pub async fn search_repositories(
        &self,
        query: &str,
        per_page: u32,
    ) -> Result<Value, ApiClientError> {
        self.execute(
            RequestSignature::get("/search/repositories")
                .with_param("q", query)
                .with_param("per_page", per_page.to_string()),
        )
        .await
    }

    /// Shared resilience stack, for pipelines that need quota or breaker
    /// visibility
    pub fn resilient(&self) -> &Arc<ResilientApiClient> {
        &self.resilient
    }

    async fn execute(&self, signature: RequestSignature) -> Result<Value, ApiClientError> {
        let url = format!("{}{}", self.base_url, signature.path_and_query());
        let category = signature.quota_category();
        let http = self.http.clone();
        let resilient = Arc::clone(&self.resilient);

        debug!(signature = %signature, "Dispatching GitHub API call");

        self.resilient
            .execute(&signature, move || {
                let http = http.clone();
                let url = url.clone();
                let resilient = Arc::clone(&resilient);
                async move { perform_request(http, url, category, resilient.quota()).await }
            })
            .await
    }
}

/// One network attempt: send, record the quota headers, classify the status,
/// parse the JSON body. The quota tracker is refreshed from every response
/// that carries headers, error statuses included.
async fn perform_request(
    http: reqwest::Client,
    url: String,
    category: QuotaCategory,
    tracker: &QuotaTracker,
) -> Result<ApiResponse, ApiClientError> {
    let response = http.get(&url).send().await.map_err(classify_reqwest)?;

    let quota = parse_quota_headers(response.headers(), category);
    if let Some(update) = quota.clone() {
        tracker.record(update);
    }
    let status = response.status();

    if is_rate_limited(status, quota.as_ref()) {
        return Err(ApiClientError::RateLimited {
            reset_at: quota.map(|q| q.reset_at),
            message: format!("upstream returned {status} with no remaining quota"),
        });
    }

    if status.is_server_error() {
        return Err(ApiClientError::Transient {
            message: format!("upstream returned {status}"),
        });
    }

    if status.is_client_error() {
        return Err(ApiClientError::Permanent {
            status: status.as_u16(),
            message: format!("upstream returned {status}"),
        });
    }

    let value: Value = response.json().await.map_err(|e| ApiClientError::Transient {
        message: format!("failed to parse response body: {e}"),
    })?;

    Ok(ApiResponse { value, quota })
}

/// GitHub signals rate limiting as 429, or as 403 with a zeroed
/// `X-RateLimit-Remaining` header
fn is_rate_limited(status: StatusCode, quota: Option<&QuotaUpdate>) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN && quota.map(|q| q.remaining == 0).unwrap_or(false)
}

fn classify_reqwest(err: reqwest::Error) -> ApiClientError {
    // Timeouts, connect failures, and resets are all retryable
    ApiClientError::Transient {
        message: err.to_string(),
    }
}

fn parse_quota_headers(headers: &HeaderMap, category: QuotaCategory) -> Option<QuotaUpdate> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let update = QuotaUpdate::from_header_values(
        category,
        header_str("x-ratelimit-limit"),
        header_str("x-ratelimit-remaining"),
        header_str("x-ratelimit-reset"),
    );

    // 429 responses sometimes carry Retry-After instead of a reset epoch
    if update.is_none() {
        if let Some(retry_after) = header_str("retry-after").and_then(|v| v.parse::<i64>().ok()) {
            return Utc
                .timestamp_opt(Utc::now().timestamp() + retry_after, 0)
                .single()
                .map(|reset_at| QuotaUpdate {
                    category,
                    limit: 0,
                    remaining: 0,
                    reset_at,
                });
        }
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::quota::QuotaCategory;
    use serde_json::json;

    fn api(base_url: String) -> GitHubApi {
        let github = GithubApiConfig {
            base_url,
            token: None,
            user_agent: "githarvest-tests".to_string(),
        };
        let client_config = ClientConfig {
            cache_ttl_secs: 60,
            max_retries: 0,
            base_backoff_ms: 1,
            request_timeout_ms: 2_000,
            low_water_mark_remaining: 5,
            max_quota_wait_ms: 50,
        };
        GitHubApi::new(&github, client_config, CircuitBreakerSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_get_repository_parses_body_and_quota() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/rust-lang/rust")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_header("x-ratelimit-limit", "5000")
            .with_header("x-ratelimit-remaining", "4999")
            .with_header("x-ratelimit-reset", "1893456000")
            .with_body(r#"{"id": 724712, "full_name": "rust-lang/rust"}"#)
            .create_async()
            .await;

        let api = api(server.url());
        let value = api.get_repository("rust-lang", "rust").await.unwrap();

        assert_eq!(value["full_name"], json!("rust-lang/rust"));
        mock.assert_async().await;

        let snapshot = api
            .resilient()
            .quota()
            .snapshot(QuotaCategory::Core)
            .unwrap();
        assert_eq!(snapshot.remaining, 4999);
    }

    #[tokio::test]
    async fn test_second_read_served_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/octocat")
            .with_status(200)
            .with_body(r#"{"login": "octocat"}"#)
            .expect(1)
            .create_async()
            .await;

        let api = api(server.url());
        api.get_user("octocat").await.unwrap();
        api.get_user("octocat").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_404_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/nope/missing")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let api = api(server.url());
        let err = api.get_repository("nope", "missing").await.unwrap_err();
        assert!(matches!(err, ApiClientError::Permanent { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_error_response_still_refreshes_quota() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/nope/missing")
            .with_status(404)
            .with_header("x-ratelimit-limit", "5000")
            .with_header("x-ratelimit-remaining", "17")
            .with_header("x-ratelimit-reset", "1893456000")
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let api = api(server.url());
        let err = api.get_repository("nope", "missing").await.unwrap_err();
        assert!(matches!(err, ApiClientError::Permanent { status: 404, .. }));

        // The 404 carried headers, so the tracker sees the shrinking budget
        let snapshot = api
            .resilient()
            .quota()
            .snapshot(QuotaCategory::Core)
            .unwrap();
        assert_eq!(snapshot.remaining, 17);
    }

    #[tokio::test]
    async fn test_429_sets_quota_exhausted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/busy/repo")
            .with_status(429)
            .with_header("x-ratelimit-remaining", "0")
            .with_header("x-ratelimit-reset", "1893456000")
            .create_async()
            .await;

        let api = api(server.url());
        let err = api.get_repository("busy", "repo").await.unwrap_err();
        assert!(matches!(err, ApiClientError::RateLimited { .. }));

        let snapshot = api
            .resilient()
            .quota()
            .snapshot(QuotaCategory::Core)
            .unwrap();
        assert_eq!(snapshot.remaining, 0);
    }

    #[tokio::test]
    async fn test_forbidden_with_zero_remaining_is_rate_limit() {
        let quota = QuotaUpdate {
            category: QuotaCategory::Core,
            limit: 5000,
            remaining: 0,
            reset_at: Utc::now(),
        };
        assert!(is_rate_limited(StatusCode::FORBIDDEN, Some(&quota)));
        assert!(!is_rate_limited(StatusCode::FORBIDDEN, None));
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, None));
    }
}
