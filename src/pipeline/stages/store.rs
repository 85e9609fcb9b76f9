//! # Store Stage
//!
//! Persists extracted rows through the entity store. Upserts key on the
//! upstream natural id, so re-running a sync over the same targets refreshes
//! existing rows instead of duplicating them.

use crate::models::NewRepository;
use crate::pipeline::stage::{PipelineStage, StageError};
use crate::pipeline::stages::REPOSITORIES_SLOT;
use crate::pipeline::types::{PipelineContext, StageConfig};
use crate::store::EntityStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Stage upserting the `repositories` slot into persistence
pub struct StoreStage {
    store: Arc<dyn EntityStore>,
}

impl StoreStage {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PipelineStage for StoreStage {
    fn name(&self) -> &str {
        "store"
    }

    async fn execute(
        &self,
        mut context: PipelineContext,
        _config: &StageConfig,
    ) -> Result<PipelineContext, StageError> {
        let rows_value = context
            .take(REPOSITORIES_SLOT)
            .ok_or_else(|| StageError::new("no extracted repositories to store"))?;
        let rows: Vec<NewRepository> = serde_json::from_value(rows_value)?;

        if rows.is_empty() {
            info!(run_id = %context.run_id, "Nothing to store");
            return Ok(context);
        }

        let affected = self.store.upsert_repositories(&rows).await?;
        context.increment_stat("repositories_stored", affected as i64);

        info!(
            run_id = %context.run_id,
            affected,
            "Repositories upserted"
        );
        Ok(context)
    }
}
