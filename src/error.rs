use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum GitHarvestError {
    DatabaseError(String),
    ClientError(String),
    PipelineError(String),
    SchedulerError(String),
    ValidationError(String),
    ConfigurationError(String),
}

impl fmt::Display for GitHarvestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitHarvestError::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            GitHarvestError::ClientError(msg) => write!(f, "Client error: {msg}"),
            GitHarvestError::PipelineError(msg) => write!(f, "Pipeline error: {msg}"),
            GitHarvestError::SchedulerError(msg) => write!(f, "Scheduler error: {msg}"),
            GitHarvestError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            GitHarvestError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for GitHarvestError {}

impl From<sqlx::Error> for GitHarvestError {
    fn from(err: sqlx::Error) -> Self {
        GitHarvestError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for GitHarvestError {
    fn from(err: serde_json::Error) -> Self {
        GitHarvestError::ValidationError(err.to_string())
    }
}

impl From<crate::store::StoreError> for GitHarvestError {
    fn from(err: crate::store::StoreError) -> Self {
        GitHarvestError::DatabaseError(err.to_string())
    }
}

impl From<crate::client::ApiClientError> for GitHarvestError {
    fn from(err: crate::client::ApiClientError) -> Self {
        GitHarvestError::ClientError(err.to_string())
    }
}

impl From<crate::pipeline::PipelineError> for GitHarvestError {
    fn from(err: crate::pipeline::PipelineError) -> Self {
        GitHarvestError::PipelineError(err.to_string())
    }
}

impl From<crate::scheduler::SchedulerError> for GitHarvestError {
    fn from(err: crate::scheduler::SchedulerError) -> Self {
        GitHarvestError::SchedulerError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GitHarvestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_errors_map_to_root_classes() {
        let err: GitHarvestError =
            crate::store::StoreError::Database("connection refused".to_string()).into();
        assert!(matches!(err, GitHarvestError::DatabaseError(_)));

        let err: GitHarvestError = crate::client::ApiClientError::Transient {
            message: "timeout".to_string(),
        }
        .into();
        assert!(matches!(err, GitHarvestError::ClientError(_)));

        let err: GitHarvestError =
            crate::pipeline::PipelineError::UnknownPipeline("nightly".to_string()).into();
        assert!(matches!(err, GitHarvestError::PipelineError(_)));

        let err: GitHarvestError =
            crate::scheduler::SchedulerError::Validation("bad cron".to_string()).into();
        assert!(matches!(err, GitHarvestError::SchedulerError(_)));
    }
}
