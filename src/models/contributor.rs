//! # Contributor Model
//!
//! GitHub users associated with ingested repositories. Keys on the upstream
//! user id; profile detail fields (`company`, `location`) are filled by the
//! enrichment pass from `GET /users/{username}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted contributor row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Contributor {
    pub id: Uuid,
    pub github_id: i64,
    pub username: String,
    pub avatar_url: Option<String>,
    pub contributions: i32,
    pub company: Option<String>,
    pub location: Option<String>,
    pub is_enriched: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New contributor for upsert (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContributor {
    pub github_id: i64,
    pub username: String,
    pub avatar_url: Option<String>,
    pub contributions: i32,
}

impl NewContributor {
    /// Normalize a contributor entry from a repository contributors listing
    pub fn from_github_json(raw: &Value) -> Option<Self> {
        Some(Self {
            github_id: raw.get("id")?.as_i64()?,
            username: raw.get("login")?.as_str()?.to_string(),
            avatar_url: raw
                .get("avatar_url")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            contributions: raw
                .get("contributions")
                .and_then(|v| v.as_i64())
                .unwrap_or(0) as i32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extraction() {
        let raw = json!({"id": 583231, "login": "octocat", "contributions": 42});
        let row = NewContributor::from_github_json(&raw).unwrap();
        assert_eq!(row.username, "octocat");
        assert_eq!(row.contributions, 42);
    }

    #[test]
    fn test_extraction_requires_login() {
        assert!(NewContributor::from_github_json(&json!({"id": 1})).is_none());
    }
}
