//! # Pipeline Stage Registry
//!
//! Maps stage names to factories and pipeline types to definitions.
//! Registration is additive; a definition referencing an unregistered stage
//! is rejected at registration time so misconfiguration is a startup error,
//! never a mid-run surprise.

use crate::pipeline::stage::{PipelineStage, StageFactory};
use crate::pipeline::types::{PipelineDefinition, PipelineError, StageConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Registry of stage factories and pipeline definitions
pub struct PipelineRegistry {
    stages: RwLock<HashMap<String, StageFactory>>,
    pipelines: RwLock<HashMap<String, PipelineDefinition>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        Self {
            stages: RwLock::new(HashMap::new()),
            pipelines: RwLock::new(HashMap::new()),
        }
    }

    /// Register a stage factory under a name. Re-registration replaces the
    /// previous factory.
    pub async fn register_stage(&self, name: &str, factory: StageFactory) {
        let mut stages = self.stages.write().await;
        if stages.insert(name.to_string(), factory).is_some() {
            warn!(stage = %name, "Stage factory replaced");
        } else {
            info!(stage = %name, "Registered pipeline stage");
        }
    }

    /// Register a pipeline definition. Every referenced stage must already
    /// be registered.
    pub async fn register_pipeline(
        &self,
        definition: PipelineDefinition,
    ) -> Result<(), PipelineError> {
        let stages = self.stages.read().await;
        for binding in &definition.stages {
            if !stages.contains_key(&binding.stage_name) {
                return Err(PipelineError::UnknownStage {
                    pipeline_type: definition.pipeline_type.clone(),
                    stage: binding.stage_name.clone(),
                });
            }
        }
        drop(stages);

        info!(
            pipeline_type = %definition.pipeline_type,
            stage_count = definition.stages.len(),
            "Registered pipeline definition"
        );
        self.pipelines
            .write()
            .await
            .insert(definition.pipeline_type.clone(), definition);
        Ok(())
    }

    /// Whether a pipeline type is registered (schedule validation)
    pub async fn has_pipeline(&self, pipeline_type: &str) -> bool {
        self.pipelines.read().await.contains_key(pipeline_type)
    }

    /// Look up a pipeline definition
    pub async fn pipeline(&self, pipeline_type: &str) -> Option<PipelineDefinition> {
        self.pipelines.read().await.get(pipeline_type).cloned()
    }

    /// Registered pipeline types
    pub async fn pipeline_types(&self) -> Vec<String> {
        self.pipelines.read().await.keys().cloned().collect()
    }

    /// Instantiate the ordered stage list for a definition
    pub async fn resolve_stages(
        &self,
        definition: &PipelineDefinition,
    ) -> Result<Vec<(Arc<dyn PipelineStage>, StageConfig)>, PipelineError> {
        let stages = self.stages.read().await;
        let mut resolved = Vec::with_capacity(definition.stages.len());
        for binding in &definition.stages {
            let factory =
                stages
                    .get(&binding.stage_name)
                    .ok_or_else(|| PipelineError::UnknownStage {
                        pipeline_type: definition.pipeline_type.clone(),
                        stage: binding.stage_name.clone(),
                    })?;
            resolved.push((factory(), StageConfig::from_binding(binding, definition)));
        }
        Ok(resolved)
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}
