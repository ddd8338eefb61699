use std::sync::{atomic::AtomicU64, Arc, Mutex};

use tokio::runtime::Handle;

use crate::{JobRunner, ModelCatalog, RunnerError, Summarizer};

pub struct JobRunnerBuilder<S = ()> {
    summarizer: S,
    catalog: ModelCatalog,
    runtime: Option<Handle>,
}

impl JobRunnerBuilder {
    pub fn new() -> Self {
        Self {
            summarizer: (),
            catalog: ModelCatalog::builtin(),
            runtime: None,
        }
    }
}

impl Default for JobRunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> JobRunnerBuilder<S> {
    pub fn summarizer<S2: Summarizer + Send + Sync + 'static>(
        self,
        summarizer: S2,
    ) -> JobRunnerBuilder<S2> {
        JobRunnerBuilder {
            summarizer,
            catalog: self.catalog,
            runtime: self.runtime,
        }
    }

    pub fn catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Runtime that job tasks are spawned on. Defaults to the current one.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

impl<S> JobRunnerBuilder<S>
where
    S: Summarizer + Send + Sync + 'static,
{
    pub fn build(self) -> Result<JobRunner<S>, RunnerError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current()?,
        };

        Ok(JobRunner {
            summarizer: Arc::new(self.summarizer),
            catalog: self.catalog,
            runtime,
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        })
    }
}
