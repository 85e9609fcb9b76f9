//! # Enrich Stage
//!
//! Second-pass detail fill for repositories the sync pipeline already
//! ingested. Unenriched rows are fetched in bounded-concurrency batches and
//! each successful detail response flips the row's `is_enriched` flag exactly
//! once. Per-repository failures are tallied; the remaining rows still get
//! their pass.

use crate::client::{BatchExecutor, GitHubApi};
use crate::pipeline::stage::{PipelineStage, StageError};
use crate::pipeline::types::{PipelineContext, StageConfig};
use crate::store::{EntityStore, RepositoryEnrichment};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

const DEFAULT_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
struct EnrichOptions {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Stage enriching unenriched repositories in batches
pub struct EnrichStage {
    api: GitHubApi,
    store: Arc<dyn EntityStore>,
    batch: BatchExecutor,
}

impl EnrichStage {
    pub fn new(api: GitHubApi, store: Arc<dyn EntityStore>, batch: BatchExecutor) -> Self {
        Self { api, store, batch }
    }
}

#[async_trait]
impl PipelineStage for EnrichStage {
    fn name(&self) -> &str {
        "enrich"
    }

    async fn execute(
        &self,
        mut context: PipelineContext,
        config: &StageConfig,
    ) -> Result<PipelineContext, StageError> {
        let options: EnrichOptions = if config.options.is_null() {
            EnrichOptions::default()
        } else {
            serde_json::from_value(config.options.clone())
                .map_err(|e| StageError::new(format!("invalid enrich options: {e}")))?
        };

        let candidates = self.store.find_unenriched_repositories(options.limit).await?;
        if candidates.is_empty() {
            info!(run_id = %context.run_id, "No repositories awaiting enrichment");
            return Ok(context);
        }

        let operations: Vec<_> = candidates
            .iter()
            .map(|repo| {
                let api = self.api.clone();
                let store = Arc::clone(&self.store);
                let owner = repo.owner.clone();
                let name = repo.name.clone();
                let github_id = repo.github_id;
                async move {
                    let body = api
                        .get_repository(&owner, &name)
                        .await
                        .map_err(|e| e.to_string())?;
                    let enrichment = RepositoryEnrichment::from_github_json(&body);
                    store
                        .apply_repository_enrichment(github_id, &enrichment)
                        .await
                        .map_err(|e| e.to_string())
                }
            })
            .collect();

        let outcome = self
            .batch
            .run_batch(operations)
            .await
            .map_err(|e| StageError::new(e.to_string()))?;

        // A false result means the row was enriched concurrently; count only
        // rows this run actually flipped
        let flipped = outcome
            .results
            .iter()
            .filter(|r| matches!(r, Ok(true)))
            .count();

        context.increment_stat("repositories_enriched", flipped as i64);
        context.increment_stat("enrich_failures", outcome.failure_count as i64);

        info!(
            run_id = %context.run_id,
            candidates = candidates.len(),
            enriched = flipped,
            failures = outcome.failure_count,
            "Enrichment pass complete"
        );
        Ok(context)
    }
}
