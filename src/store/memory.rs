//! # In-Memory Store Implementations
//!
//! Mirror the Postgres upsert and overlap-guard semantics for tests and
//! embedded usage without a database.

use crate::models::{
    NewCommit, NewContributor, NewMergeRequest, NewRepository, Repository, ScheduleRecord,
    ScheduleUpdate,
};
use crate::store::{EntityStore, RepositoryEnrichment, ScheduleStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Entity persistence held in process memory
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    repositories: RwLock<HashMap<i64, Repository>>,
    contributors: RwLock<HashMap<i64, NewContributor>>,
    commits: RwLock<HashMap<String, NewCommit>>,
    merge_requests: RwLock<HashMap<(i64, i64), NewMergeRequest>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn repository_count(&self) -> usize {
        self.repositories.read().await.len()
    }

    pub async fn contributor_count(&self) -> usize {
        self.contributors.read().await.len()
    }

    pub async fn commit_count(&self) -> usize {
        self.commits.read().await.len()
    }

    pub async fn merge_request_count(&self) -> usize {
        self.merge_requests.read().await.len()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn upsert_repositories(&self, rows: &[NewRepository]) -> Result<u64, StoreError> {
        let mut repositories = self.repositories.write().await;
        for row in rows {
            let now = Utc::now();
            repositories
                .entry(row.github_id)
                .and_modify(|existing| {
                    // Conflict on natural id is an update; enrichment state
                    // is preserved
                    existing.owner = row.owner.clone();
                    existing.name = row.name.clone();
                    existing.full_name = row.full_name.clone();
                    existing.description = row.description.clone();
                    existing.stargazers_count = row.stargazers_count;
                    existing.forks_count = row.forks_count;
                    existing.updated_at = now;
                })
                .or_insert_with(|| Repository {
                    id: Uuid::new_v4(),
                    github_id: row.github_id,
                    owner: row.owner.clone(),
                    name: row.name.clone(),
                    full_name: row.full_name.clone(),
                    description: row.description.clone(),
                    stargazers_count: row.stargazers_count,
                    forks_count: row.forks_count,
                    primary_language: None,
                    topics: None,
                    is_enriched: false,
                    created_at: now,
                    updated_at: now,
                });
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_contributors(&self, rows: &[NewContributor]) -> Result<u64, StoreError> {
        let mut contributors = self.contributors.write().await;
        for row in rows {
            contributors.insert(row.github_id, row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_commits(&self, rows: &[NewCommit]) -> Result<u64, StoreError> {
        let mut commits = self.commits.write().await;
        for row in rows {
            commits.insert(row.sha.clone(), row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_merge_requests(&self, rows: &[NewMergeRequest]) -> Result<u64, StoreError> {
        let mut merge_requests = self.merge_requests.write().await;
        for row in rows {
            merge_requests.insert((row.repository_github_id, row.number), row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn find_unenriched_repositories(
        &self,
        limit: i64,
    ) -> Result<Vec<Repository>, StoreError> {
        let repositories = self.repositories.read().await;
        let mut unenriched: Vec<Repository> = repositories
            .values()
            .filter(|r| !r.is_enriched)
            .cloned()
            .collect();
        unenriched.sort_by_key(|r| r.created_at);
        unenriched.truncate(limit.max(0) as usize);
        Ok(unenriched)
    }

    async fn apply_repository_enrichment(
        &self,
        github_id: i64,
        enrichment: &RepositoryEnrichment,
    ) -> Result<bool, StoreError> {
        let mut repositories = self.repositories.write().await;
        match repositories.get_mut(&github_id) {
            Some(repository) if !repository.is_enriched => {
                repository.primary_language = enrichment.primary_language.clone();
                repository.topics = enrichment.topics.clone();
                repository.is_enriched = true;
                repository.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_repository_by_github_id(
        &self,
        github_id: i64,
    ) -> Result<Option<Repository>, StoreError> {
        Ok(self.repositories.read().await.get(&github_id).cloned())
    }
}

/// Schedule persistence held in process memory
#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    records: RwLock<HashMap<Uuid, ScheduleRecord>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn insert(&self, record: &ScheduleRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn update(&self, id: Uuid, patch: &ScheduleUpdate) -> Result<ScheduleRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if let Some(name) = &patch.name {
            record.name = name.clone();
        }
        if let Some(cron_expression) = &patch.cron_expression {
            record.cron_expression = cron_expression.clone();
        }
        if let Some(time_zone) = &patch.time_zone {
            record.time_zone = time_zone.clone();
        }
        if let Some(is_active) = patch.is_active {
            record.is_active = is_active;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ScheduleRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self, active_only: bool) -> Result<Vec<ScheduleRecord>, StoreError> {
        let records = self.records.read().await;
        let mut out: Vec<ScheduleRecord> = records
            .values()
            .filter(|r| !active_only || r.is_active)
            .cloned()
            .collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }

    async fn try_mark_running(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut records = self.records.write().await;

        let pipeline_type = match records.get(&id) {
            Some(record) if !record.is_running => record.pipeline_type.clone(),
            _ => return Ok(false),
        };

        let sibling_running = records
            .values()
            .any(|r| r.id != id && r.pipeline_type == pipeline_type && r.is_running);
        if sibling_running {
            return Ok(false);
        }

        if let Some(record) = records.get_mut(&id) {
            record.is_running = true;
            record.updated_at = Utc::now();
        }
        Ok(true)
    }

    async fn complete_run(
        &self,
        id: Uuid,
        last_run_at: DateTime<Utc>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&id) {
            record.is_running = false;
            record.last_run_at = Some(last_run_at);
            record.next_run_at = next_run_at;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_next_run_at(
        &self,
        id: Uuid,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&id) {
            record.next_run_at = next_run_at;
            record.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn clear_running_flags(&self) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let mut cleared = 0;
        for record in records.values_mut() {
            if record.is_running {
                record.is_running = false;
                cleared += 1;
            }
        }
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewSchedule;
    use serde_json::json;

    fn repo(github_id: i64, stars: i32) -> NewRepository {
        NewRepository {
            github_id,
            owner: "rust-lang".to_string(),
            name: "rust".to_string(),
            full_name: "rust-lang/rust".to_string(),
            description: None,
            stargazers_count: stars,
            forks_count: 0,
        }
    }

    #[tokio::test]
    async fn test_double_upsert_keeps_one_row_with_second_write() {
        let store = InMemoryEntityStore::new();
        store.upsert_repositories(&[repo(1, 100)]).await.unwrap();
        store.upsert_repositories(&[repo(1, 250)]).await.unwrap();

        assert_eq!(store.repository_count().await, 1);
        let row = store.find_repository_by_github_id(1).await.unwrap().unwrap();
        assert_eq!(row.stargazers_count, 250);
    }

    #[tokio::test]
    async fn test_enrichment_flag_transitions_exactly_once() {
        let store = InMemoryEntityStore::new();
        store.upsert_repositories(&[repo(1, 100)]).await.unwrap();

        let enrichment = RepositoryEnrichment {
            primary_language: Some("Rust".to_string()),
            topics: Some(json!(["systems"])),
        };
        assert!(store.apply_repository_enrichment(1, &enrichment).await.unwrap());
        // Second pass is a no-op: the flag never reverts and is never re-won
        assert!(!store.apply_repository_enrichment(1, &enrichment).await.unwrap());

        let row = store.find_repository_by_github_id(1).await.unwrap().unwrap();
        assert!(row.is_enriched);
        assert_eq!(row.primary_language.as_deref(), Some("Rust"));
    }

    #[tokio::test]
    async fn test_upsert_preserves_enrichment_state() {
        let store = InMemoryEntityStore::new();
        store.upsert_repositories(&[repo(1, 100)]).await.unwrap();
        store
            .apply_repository_enrichment(1, &RepositoryEnrichment::default())
            .await
            .unwrap();

        // A later sync pass must not revert is_enriched
        store.upsert_repositories(&[repo(1, 300)]).await.unwrap();
        let row = store.find_repository_by_github_id(1).await.unwrap().unwrap();
        assert!(row.is_enriched);
        assert_eq!(row.stargazers_count, 300);
    }

    #[tokio::test]
    async fn test_find_unenriched_respects_limit() {
        let store = InMemoryEntityStore::new();
        for i in 0..5 {
            store.upsert_repositories(&[repo(i, 0)]).await.unwrap();
        }
        let unenriched = store.find_unenriched_repositories(3).await.unwrap();
        assert_eq!(unenriched.len(), 3);
    }

    fn schedule(pipeline_type: &str) -> ScheduleRecord {
        NewSchedule {
            name: format!("{pipeline_type}-schedule"),
            pipeline_type: pipeline_type.to_string(),
            cron_expression: "*/5 * * * *".to_string(),
            time_zone: "UTC".to_string(),
            is_active: true,
        }
        .into_record(None)
    }

    #[tokio::test]
    async fn test_overlap_guard_is_per_pipeline_type() {
        let store = InMemoryScheduleStore::new();
        let a = schedule("sync");
        let b = schedule("sync");
        let c = schedule("enrich");
        store.insert(&a).await.unwrap();
        store.insert(&b).await.unwrap();
        store.insert(&c).await.unwrap();

        assert!(store.try_mark_running(a.id).await.unwrap());
        // Same record and same pipeline type both rejected
        assert!(!store.try_mark_running(a.id).await.unwrap());
        assert!(!store.try_mark_running(b.id).await.unwrap());
        // Different pipeline type runs concurrently
        assert!(store.try_mark_running(c.id).await.unwrap());

        store.complete_run(a.id, Utc::now(), None).await.unwrap();
        assert!(store.try_mark_running(b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_running_flags() {
        let store = InMemoryScheduleStore::new();
        let a = schedule("sync");
        store.insert(&a).await.unwrap();
        store.try_mark_running(a.id).await.unwrap();

        assert_eq!(store.clear_running_flags().await.unwrap(), 1);
        let record = store.find_by_id(a.id).await.unwrap().unwrap();
        assert!(!record.is_running);
    }
}
