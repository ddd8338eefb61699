use std::time::Duration;

use crate::JobId;

/// Failure reported by a [`Summarizer`](crate::Summarizer) call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Rate limited{}", .retry_after.map(|d| format!(", retry after {}s", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Terminal failure of a job, delivered through the job sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Job was cancelled")]
    Cancelled,

    #[error("Summarizer aborted: {0}")]
    Aborted(String),
}

/// Synchronous rejection of a runner operation.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("A job is already running ({running})")]
    Busy { running: JobId },

    #[error("Model profile `{0}` is not in the catalog")]
    UnknownProfile(String),

    #[error("Refusing to summarize empty content")]
    EmptyContent,

    #[error("No Tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog has no profiles")]
    Empty,

    #[error("Profile `{0}` is listed more than once")]
    DuplicateProfile(String),

    #[error("Profile `{0}` must have a capacity greater than zero")]
    ZeroCapacity(String),

    #[error("Default profile `{0}` is not in the catalog")]
    UnknownDefault(String),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}
