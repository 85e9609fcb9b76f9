//! # Repository Model
//!
//! Primary ingested entity. Rows key on the upstream GitHub repository id
//! (`github_id`); the sync pipeline upserts the listing fields, and a later
//! enrichment pass fills in detail fields and flips `is_enriched` exactly
//! once.
//!
//! ## Database Schema
//!
//! Maps to `harvest_repositories`:
//! - `id`: surrogate primary key (UUID)
//! - `github_id`: upstream natural id (BIGINT, unique)
//! - `is_enriched`: false until the enrichment pipeline completes the row

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted repository row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Repository {
    pub id: Uuid,
    pub github_id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub stargazers_count: i32,
    pub forks_count: i32,
    pub primary_language: Option<String>,
    pub topics: Option<Value>,
    pub is_enriched: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New repository for upsert (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRepository {
    pub github_id: i64,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub stargazers_count: i32,
    pub forks_count: i32,
}

impl NewRepository {
    /// Normalize a raw `GET /repos/{owner}/{repo}` response body into a row.
    /// Returns None when required identity fields are missing or malformed.
    pub fn from_github_json(raw: &Value) -> Option<Self> {
        let github_id = raw.get("id")?.as_i64()?;
        let full_name = raw.get("full_name")?.as_str()?.to_string();
        let (owner, name) = full_name.split_once('/')?;

        Some(Self {
            github_id,
            owner: owner.to_string(),
            name: name.to_string(),
            full_name: full_name.clone(),
            description: raw
                .get("description")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            stargazers_count: raw
                .get("stargazers_count")
                .and_then(|v| v.as_i64())
                .unwrap_or(0) as i32,
            forks_count: raw.get("forks_count").and_then(|v| v.as_i64()).unwrap_or(0) as i32,
        })
    }
}
