//! # Pipeline Types
//!
//! Plain-data pipeline definitions and the run context threaded through
//! stage execution. Each stage consumes the context and returns an updated
//! one, keeping stage ordering and side effects auditable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Pipeline-level errors (configuration and fatal-stage aborts)
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("Unknown pipeline type '{0}'")]
    UnknownPipeline(String),

    #[error("Pipeline '{pipeline_type}' references unknown stage '{stage}'")]
    UnknownStage {
        pipeline_type: String,
        stage: String,
    },

    #[error("Fatal failure in stage '{stage}': {message}")]
    FatalStage { stage: String, message: String },
}

/// One stage slot within a pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBinding {
    pub stage_name: String,
    /// A fatal stage's failure aborts the remaining stages
    #[serde(default)]
    pub fatal: bool,
    /// Stage-specific options, interpreted by the stage itself
    #[serde(default = "default_options")]
    pub options: Value,
}

fn default_options() -> Value {
    Value::Null
}

impl StageBinding {
    pub fn new(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            fatal: false,
            options: Value::Null,
        }
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = options;
        self
    }
}

/// Immutable pipeline definition, registered once at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub pipeline_type: String,
    pub stages: Vec<StageBinding>,
    /// Concurrency hint for stages that fan out (batch operations)
    pub concurrency: usize,
    /// Retry budget hint for stages that call upstream
    pub max_retries: u32,
}

impl PipelineDefinition {
    pub fn new(pipeline_type: impl Into<String>, stages: Vec<StageBinding>) -> Self {
        Self {
            pipeline_type: pipeline_type.into(),
            stages,
            concurrency: 10,
            max_retries: 3,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Per-stage execution configuration resolved from the definition
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub options: Value,
    pub fatal: bool,
    pub concurrency: usize,
    pub max_retries: u32,
}

impl StageConfig {
    pub fn from_binding(binding: &StageBinding, definition: &PipelineDefinition) -> Self {
        Self {
            options: binding.options.clone(),
            fatal: binding.fatal,
            concurrency: definition.concurrency,
            max_retries: definition.max_retries,
        }
    }
}

/// A stage failure recorded on the run context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: String,
    pub message: String,
}

/// Mutable state for one pipeline run. Created fresh per run, threaded
/// through the stages, and discarded after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineContext {
    pub run_id: Uuid,
    pub pipeline_type: String,
    pub started_at: DateTime<Utc>,
    pub stats: HashMap<String, i64>,
    pub errors: Vec<StageFailure>,
    data: HashMap<String, Value>,
}

impl PipelineContext {
    pub fn new(pipeline_type: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_type: pipeline_type.into(),
            started_at: Utc::now(),
            stats: HashMap::new(),
            errors: Vec::new(),
            data: HashMap::new(),
        }
    }

    /// Add to a named counter (entity counts, failure tallies)
    pub fn increment_stat(&mut self, key: &str, by: i64) {
        *self.stats.entry(key.to_string()).or_insert(0) += by;
    }

    pub fn stat(&self, key: &str) -> i64 {
        self.stats.get(key).copied().unwrap_or(0)
    }

    /// Place intermediate output for a later stage
    pub fn put(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Remove and return intermediate output (the consuming stage owns it)
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn record_failure(&mut self, stage: &str, message: impl Into<String>) {
        self.errors.push(StageFailure {
            stage: stage.to_string(),
            message: message.into(),
        });
    }

    /// Whether every stage completed without recording an error
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
