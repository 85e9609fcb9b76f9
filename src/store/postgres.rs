//! # Postgres Store Implementations
//!
//! sqlx-backed implementations of the persistence collaborators. Upserts use
//! `ON CONFLICT ... DO UPDATE` on the natural id so repeated ingestion passes
//! converge on one row per upstream entity. Runtime-bound queries keep the
//! crate buildable without a live database.

use crate::models::{
    NewCommit, NewContributor, NewMergeRequest, NewRepository, Repository, ScheduleRecord,
    ScheduleUpdate,
};
use crate::store::{EntityStore, RepositoryEnrichment, ScheduleStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Entity persistence backed by Postgres
#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn upsert_repositories(&self, rows: &[NewRepository]) -> Result<u64, StoreError> {
        let mut written = 0;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO harvest_repositories
                    (id, github_id, owner, name, full_name, description,
                     stargazers_count, forks_count, is_enriched, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE, NOW(), NOW())
                ON CONFLICT (github_id) DO UPDATE SET
                    owner = EXCLUDED.owner,
                    name = EXCLUDED.name,
                    full_name = EXCLUDED.full_name,
                    description = EXCLUDED.description,
                    stargazers_count = EXCLUDED.stargazers_count,
                    forks_count = EXCLUDED.forks_count,
                    updated_at = NOW()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.github_id)
            .bind(&row.owner)
            .bind(&row.name)
            .bind(&row.full_name)
            .bind(&row.description)
            .bind(row.stargazers_count)
            .bind(row.forks_count)
            .execute(&self.pool)
            .await?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    async fn upsert_contributors(&self, rows: &[NewContributor]) -> Result<u64, StoreError> {
        let mut written = 0;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO harvest_contributors
                    (id, github_id, username, avatar_url, contributions,
                     is_enriched, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, FALSE, NOW(), NOW())
                ON CONFLICT (github_id) DO UPDATE SET
                    username = EXCLUDED.username,
                    avatar_url = EXCLUDED.avatar_url,
                    contributions = EXCLUDED.contributions,
                    updated_at = NOW()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.github_id)
            .bind(&row.username)
            .bind(&row.avatar_url)
            .bind(row.contributions)
            .execute(&self.pool)
            .await?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    async fn upsert_commits(&self, rows: &[NewCommit]) -> Result<u64, StoreError> {
        let mut written = 0;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO harvest_commits
                    (id, sha, repository_github_id, author_username, message,
                     committed_at, is_enriched, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW(), NOW())
                ON CONFLICT (sha) DO UPDATE SET
                    author_username = EXCLUDED.author_username,
                    message = EXCLUDED.message,
                    committed_at = EXCLUDED.committed_at,
                    updated_at = NOW()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&row.sha)
            .bind(row.repository_github_id)
            .bind(&row.author_username)
            .bind(&row.message)
            .bind(row.committed_at)
            .execute(&self.pool)
            .await?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    async fn upsert_merge_requests(&self, rows: &[NewMergeRequest]) -> Result<u64, StoreError> {
        let mut written = 0;
        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO harvest_merge_requests
                    (id, repository_github_id, number, title, state,
                     author_username, merged_at, is_enriched, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NOW(), NOW())
                ON CONFLICT (repository_github_id, number) DO UPDATE SET
                    title = EXCLUDED.title,
                    state = EXCLUDED.state,
                    author_username = EXCLUDED.author_username,
                    merged_at = EXCLUDED.merged_at,
                    updated_at = NOW()
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(row.repository_github_id)
            .bind(row.number)
            .bind(&row.title)
            .bind(&row.state)
            .bind(&row.author_username)
            .bind(row.merged_at)
            .execute(&self.pool)
            .await?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    async fn find_unenriched_repositories(
        &self,
        limit: i64,
    ) -> Result<Vec<Repository>, StoreError> {
        let rows = sqlx::query_as::<_, Repository>(
            r#"
            SELECT id, github_id, owner, name, full_name, description,
                   stargazers_count, forks_count, primary_language, topics,
                   is_enriched, created_at, updated_at
            FROM harvest_repositories
            WHERE is_enriched = FALSE
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn apply_repository_enrichment(
        &self,
        github_id: i64,
        enrichment: &RepositoryEnrichment,
    ) -> Result<bool, StoreError> {
        // The is_enriched guard makes the flag transition exactly once
        let result = sqlx::query(
            r#"
            UPDATE harvest_repositories
            SET primary_language = $2,
                topics = $3,
                is_enriched = TRUE,
                updated_at = NOW()
            WHERE github_id = $1 AND is_enriched = FALSE
            "#,
        )
        .bind(github_id)
        .bind(&enrichment.primary_language)
        .bind(&enrichment.topics)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_repository_by_github_id(
        &self,
        github_id: i64,
    ) -> Result<Option<Repository>, StoreError> {
        let row = sqlx::query_as::<_, Repository>(
            r#"
            SELECT id, github_id, owner, name, full_name, description,
                   stargazers_count, forks_count, primary_language, topics,
                   is_enriched, created_at, updated_at
            FROM harvest_repositories
            WHERE github_id = $1
            "#,
        )
        .bind(github_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

/// Schedule persistence backed by Postgres
#[derive(Debug, Clone)]
pub struct PgScheduleStore {
    pool: PgPool,
}

impl PgScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleStore for PgScheduleStore {
    async fn insert(&self, record: &ScheduleRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO harvest_schedules
                (id, name, pipeline_type, cron_expression, time_zone,
                 is_active, is_running, last_run_at, next_run_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.pipeline_type)
        .bind(&record.cron_expression)
        .bind(&record.time_zone)
        .bind(record.is_active)
        .bind(record.is_running)
        .bind(record.last_run_at)
        .bind(record.next_run_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: &ScheduleUpdate) -> Result<ScheduleRecord, StoreError> {
        let row = sqlx::query_as::<_, ScheduleRecord>(
            r#"
            UPDATE harvest_schedules
            SET name = COALESCE($2, name),
                cron_expression = COALESCE($3, cron_expression),
                time_zone = COALESCE($4, time_zone),
                is_active = COALESCE($5, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, pipeline_type, cron_expression, time_zone,
                      is_active, is_running, last_run_at, next_run_at,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.cron_expression)
        .bind(&patch.time_zone)
        .bind(patch.is_active)
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(StoreError::NotFound(id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM harvest_schedules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduleRecord>, StoreError> {
        let row = sqlx::query_as::<_, ScheduleRecord>(
            r#"
            SELECT id, name, pipeline_type, cron_expression, time_zone,
                   is_active, is_running, last_run_at, next_run_at,
                   created_at, updated_at
            FROM harvest_schedules
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list(&self, active_only: bool) -> Result<Vec<ScheduleRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ScheduleRecord>(
            r#"
            SELECT id, name, pipeline_type, cron_expression, time_zone,
                   is_active, is_running, last_run_at, next_run_at,
                   created_at, updated_at
            FROM harvest_schedules
            WHERE ($1 = FALSE OR is_active = TRUE)
            ORDER BY created_at ASC
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn try_mark_running(&self, id: Uuid) -> Result<bool, StoreError> {
        // Single statement keeps the check-and-set atomic: the guard is held
        // per pipeline type, not just per schedule row
        let result = sqlx::query(
            r#"
            UPDATE harvest_schedules s
            SET is_running = TRUE, updated_at = NOW()
            WHERE s.id = $1
              AND s.is_running = FALSE
              AND NOT EXISTS (
                  SELECT 1 FROM harvest_schedules o
                  WHERE o.pipeline_type = s.pipeline_type
                    AND o.is_running = TRUE
                    AND o.id <> s.id
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE harvest_schedules
            SET is_running = FALSE,
                last_run_at = $2,
                next_run_at = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(last_run_at)
        .bind(next_run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_next_run_at(
        &self,
        id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE harvest_schedules SET next_run_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(next_run_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_running_flags(&self) -> Result<u64, StoreError> {
        let result =
            sqlx::query("UPDATE harvest_schedules SET is_running = FALSE WHERE is_running = TRUE")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}
