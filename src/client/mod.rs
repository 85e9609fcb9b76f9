//! # Resilient API Client
//!
//! The outbound call path to the upstream GitHub API. Every call flows
//! through the same composition: response cache, circuit breaker, quota
//! tracker, then retry-with-backoff around the actual network executor.
//! Results feed back into the cache, the breaker, and the quota tracker.
//!
//! ## Architecture
//!
//! - [`signature`] - Request identity (method, endpoint, normalized params)
//! - [`cache`] - Short-TTL memoization of idempotent reads
//! - [`quota`] - Rate-limit header tracking and pre-emptive waits
//! - [`resilient`] - The composed client with in-flight deduplication
//! - [`batch`] - Bounded-concurrency batch execution with inter-batch delay
//! - [`github`] - Typed GitHub endpoint wrappers feeding the client

pub mod batch;
pub mod cache;
pub mod errors;
pub mod github;
pub mod quota;
pub mod resilient;
pub mod signature;

pub use batch::{BatchExecutor, BatchItemFailure, BatchOutcome};
pub use cache::ResponseCache;
pub use errors::ApiClientError;
pub use github::GitHubApi;
pub use quota::{QuotaCategory, QuotaSnapshot, QuotaTracker, QuotaUpdate};
pub use resilient::{ApiResponse, ResilientApiClient};
pub use signature::RequestSignature;
