mod catalog;
mod error;
mod llm;
mod runner;
pub mod tracing;

pub use catalog::{estimate_tokens, ModelCatalog, ModelProfile};
pub use credential_vault::Credential;
pub use error::{CatalogError, ClientError, JobError, RunnerError};
pub use llm::openai;
pub use llm::summarizer::Summarizer;
pub use runner::{
    builder::JobRunnerBuilder,
    job::{JobHandle, JobId, JobOutcome, JobState, Phase, ProgressEvent},
    sink::{FnSink, JobEvent, JobSink},
    JobRunner,
};
