//! # Persistence Collaborators
//!
//! Narrow interfaces the pipeline stages and scheduler consume. The store
//! stage treats a conflict on an entity's natural id as an update, not an
//! error, which makes every ingestion pass idempotent. Implementations:
//! Postgres via sqlx for production, in-memory for tests.
//!
//! The built-in pipelines persist repositories; the contributor, commit, and
//! merge request upserts carry the same conflict contract for caller-defined
//! stages ingesting those entities.

pub mod memory;
pub mod postgres;

use crate::models::{
    NewCommit, NewContributor, NewMergeRequest, NewRepository, Repository, ScheduleRecord,
    ScheduleUpdate,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

pub use memory::{InMemoryEntityStore, InMemoryScheduleStore};
pub use postgres::{PgEntityStore, PgScheduleStore};

/// Errors surfaced by persistence collaborators
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    NotFound(Uuid),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Detail fields written by the repository enrichment pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryEnrichment {
    pub primary_language: Option<String>,
    pub topics: Option<Value>,
}

impl RepositoryEnrichment {
    /// Extract enrichment fields from a `GET /repos/{owner}/{repo}` body
    pub fn from_github_json(raw: &Value) -> Self {
        Self {
            primary_language: raw
                .get("language")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            topics: raw.get("topics").filter(|v| v.is_array()).cloned(),
        }
    }
}

/// Idempotent entity persistence keyed by upstream natural ids
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Upsert repositories by `github_id`. Never touches `is_enriched`.
    async fn upsert_repositories(&self, rows: &[NewRepository]) -> Result<u64, StoreError>;

    /// Upsert contributors by `github_id`
    async fn upsert_contributors(&self, rows: &[NewContributor]) -> Result<u64, StoreError>;

    /// Upsert commits by `sha`
    async fn upsert_commits(&self, rows: &[NewCommit]) -> Result<u64, StoreError>;

    /// Upsert merge requests by `(repository_github_id, number)`
    async fn upsert_merge_requests(&self, rows: &[NewMergeRequest]) -> Result<u64, StoreError>;

    /// Repositories still awaiting an enrichment pass
    async fn find_unenriched_repositories(&self, limit: i64)
        -> Result<Vec<Repository>, StoreError>;

    /// Write enrichment fields and flip `is_enriched` exactly once. Returns
    /// false when the row was already enriched (flag never reverts).
    async fn apply_repository_enrichment(
        &self,
        github_id: i64,
        enrichment: &RepositoryEnrichment,
    ) -> Result<bool, StoreError>;

    /// Fetch a repository by its natural id
    async fn find_repository_by_github_id(
        &self,
        github_id: i64,
    ) -> Result<Option<Repository>, StoreError>;
}

/// Persistence for schedule records; the single source of truth the
/// scheduler's timer registry is rebuilt from
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert(&self, record: &ScheduleRecord) -> Result<(), StoreError>;

    async fn update(&self, id: Uuid, patch: &ScheduleUpdate) -> Result<ScheduleRecord, StoreError>;

    /// Hard delete. Returns false when the id was unknown.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduleRecord>, StoreError>;

    async fn list(&self, active_only: bool) -> Result<Vec<ScheduleRecord>, StoreError>;

    /// Atomically acquire the overlap guard: sets `is_running = true` only
    /// when this record is not running and no other record of the same
    /// pipeline type is. Returns whether the guard was acquired.
    async fn try_mark_running(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Release the guard and record run bookkeeping
    async fn complete_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Persist a newly computed fire time
    async fn set_next_run_at(
        &self,
        id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Crash recovery: clear any `is_running` flags left behind by a previous
    /// process. Returns how many rows were cleared.
    async fn clear_running_flags(&self) -> Result<u64, StoreError>;
}
