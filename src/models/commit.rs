//! # Commit Model
//!
//! Commits key on their SHA, which is globally unique upstream. Detail
//! fields (stats) come from `GET /repos/{owner}/{repo}/commits/{sha}` during
//! enrichment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted commit row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Commit {
    pub id: Uuid,
    pub sha: String,
    pub repository_github_id: i64,
    pub author_username: Option<String>,
    pub message: Option<String>,
    pub committed_at: Option<DateTime<Utc>>,
    pub additions: Option<i32>,
    pub deletions: Option<i32>,
    pub is_enriched: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New commit for upsert (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCommit {
    pub sha: String,
    pub repository_github_id: i64,
    pub author_username: Option<String>,
    pub message: Option<String>,
    pub committed_at: Option<DateTime<Utc>>,
}

impl NewCommit {
    /// Normalize a commit entry from a repository commits listing
    pub fn from_github_json(repository_github_id: i64, raw: &Value) -> Option<Self> {
        let sha = raw.get("sha")?.as_str()?.to_string();
        let commit = raw.get("commit");

        Some(Self {
            sha,
            repository_github_id,
            author_username: raw
                .pointer("/author/login")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            message: commit
                .and_then(|c| c.get("message"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            committed_at: commit
                .and_then(|c| c.pointer("/author/date"))
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok()),
        })
    }
}
