//! # Request Signature
//!
//! Immutable identity of an outbound request: method, endpoint path, and
//! normalized query parameters. The signature derives the cache key, the
//! circuit breaker endpoint group, and the quota category for a call.

use crate::client::quota::QuotaCategory;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of an idempotent upstream request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub method: String,
    pub endpoint: String,
    /// BTreeMap keeps parameter order deterministic for cache keying
    pub params: BTreeMap<String, String>,
}

impl RequestSignature {
    /// Create a GET signature for a parameter-less endpoint
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a query parameter, keeping normalization deterministic
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Derive the cache key for this request
    pub fn cache_key(&self) -> String {
        if self.params.is_empty() {
            format!("{} {}", self.method, self.endpoint)
        } else {
            let query: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!("{} {}?{}", self.method, self.endpoint, query.join("&"))
        }
    }

    /// Logical endpoint group for circuit breaker isolation. Failures against
    /// repository reads must not trip the breaker for user reads.
    pub fn endpoint_group(&self) -> &'static str {
        match self.first_segment() {
            "repos" => "repository-reads",
            "users" => "user-reads",
            "search" => "search",
            "graphql" => "graphql",
            _ => "general",
        }
    }

    /// Quota category whose rate-limit headers govern this request
    pub fn quota_category(&self) -> QuotaCategory {
        match self.first_segment() {
            "search" => QuotaCategory::Search,
            "graphql" => QuotaCategory::Graphql,
            _ => QuotaCategory::Core,
        }
    }

    /// Render the endpoint plus query string for URL construction
    pub fn path_and_query(&self) -> String {
        if self.params.is_empty() {
            self.endpoint.clone()
        } else {
            let query: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            format!("{}?{}", self.endpoint, query.join("&"))
        }
    }

    fn first_segment(&self) -> &str {
        self.endpoint
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or("")
    }
}

impl fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}
