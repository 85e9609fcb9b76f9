//! # Merge Request Model
//!
//! Pull requests, keyed by the (repository, number) pair which is the
//! upstream natural id. Review and diff detail fields come from
//! `GET /repos/{owner}/{repo}/pulls/{number}` during enrichment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted merge request row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MergeRequest {
    pub id: Uuid,
    pub repository_github_id: i64,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub author_username: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub is_enriched: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New merge request for upsert (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMergeRequest {
    pub repository_github_id: i64,
    pub number: i64,
    pub title: String,
    pub state: String,
    pub author_username: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl NewMergeRequest {
    /// Normalize a pull request entry from a repository pulls listing
    pub fn from_github_json(repository_github_id: i64, raw: &Value) -> Option<Self> {
        Some(Self {
            repository_github_id,
            number: raw.get("number")?.as_i64()?,
            title: raw.get("title")?.as_str()?.to_string(),
            state: raw
                .get("state")
                .and_then(|v| v.as_str())
                .unwrap_or("open")
                .to_string(),
            author_username: raw
                .pointer("/user/login")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            merged_at: raw
                .get("merged_at")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok()),
        })
    }
}
