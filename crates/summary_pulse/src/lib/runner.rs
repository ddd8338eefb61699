pub mod builder;
pub mod job;
pub mod sink;

use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use credential_vault::Credential;
use futures::FutureExt;
use tokio::{runtime::Handle, sync::watch};
use tokio_util::sync::CancellationToken;

use crate::{estimate_tokens, JobError, ModelCatalog, ModelProfile, RunnerError, Summarizer};
use job::{JobHandle, JobId, JobOutcome, JobState, Phase, ProgressEvent};
use sink::JobSink;

/// Single-flight summarization runner.
///
/// At most one job is in flight per runner; a submission while a job is
/// running is rejected with [`RunnerError::Busy`] rather than queued. Each job
/// runs on its own Tokio task, reports [`Phase`] checkpoints to its sink and
/// finishes with exactly one [`JobOutcome`]. Failed jobs are not retried.
///
/// The runner is freed just before the outcome reaches the sink, so a caller
/// may resubmit from inside [`JobSink::on_finished`]. A sink shared by two
/// consecutive jobs can therefore see the next job's `Started` event before
/// the previous job's outcome; give each job its own sink when that order
/// matters.
///
/// Concurrent jobs need one runner per worker; runners share no job state.
pub struct JobRunner<S>
where
    S: Summarizer + Send + Sync + 'static,
{
    pub(crate) summarizer: Arc<S>,
    pub(crate) catalog: ModelCatalog,
    pub(crate) runtime: Handle,
    pub(crate) active: Arc<Mutex<Option<JobId>>>,
    pub(crate) next_id: AtomicU64,
}

fn lock(active: &Mutex<Option<JobId>>) -> MutexGuard<'_, Option<JobId>> {
    active.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S> JobRunner<S>
where
    S: Summarizer + Send + Sync + 'static,
{
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn active_job(&self) -> Option<JobId> {
        *lock(&self.active)
    }

    pub fn is_busy(&self) -> bool {
        self.active_job().is_some()
    }

    /// Starts summarizing `content` with `profile` in the background.
    ///
    /// `profile` must be one of the catalog's profiles. Progress and the final
    /// outcome go to `sink`; the returned handle observes and cancels the job.
    #[tracing::instrument(skip_all, fields(model = %profile.name))]
    pub fn submit<K>(
        &self,
        content: impl Into<String>,
        profile: &ModelProfile,
        credential: &Credential,
        sink: K,
    ) -> Result<JobHandle, RunnerError>
    where
        K: JobSink,
    {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(RunnerError::EmptyContent);
        }
        if !self.catalog.contains(profile) {
            return Err(RunnerError::UnknownProfile(profile.name.clone()));
        }

        let slot = {
            let mut active = lock(&self.active);
            if let Some(running) = *active {
                tracing::debug!(%running, "Rejecting submission, runner is busy");
                return Err(RunnerError::Busy { running });
            }
            let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
            *active = Some(id);
            ActiveSlot {
                active: Arc::clone(&self.active),
                id,
            }
        };

        let id = slot.id;
        let (state_tx, state_rx) = watch::channel(JobState::Pending);
        let cancel = CancellationToken::new();

        tracing::info!(
            job_id = %id,
            estimated_tokens = estimate_tokens(&content),
            capacity_tokens = profile.capacity_tokens,
            "Submitting summarization job"
        );

        let job = Job {
            id,
            content,
            profile: profile.clone(),
            credential: credential.clone(),
            summarizer: Arc::clone(&self.summarizer),
            cancel: cancel.clone(),
            state: state_tx,
            sink,
            slot,
        };
        self.runtime.spawn(job.run());

        Ok(JobHandle {
            id,
            state: state_rx,
            cancel,
        })
    }
}

/// Marks the runner busy for as long as it lives, including across panics.
struct ActiveSlot {
    active: Arc<Mutex<Option<JobId>>>,
    id: JobId,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let mut active = lock(&self.active);
        if *active == Some(self.id) {
            *active = None;
        }
    }
}

struct Job<S, K> {
    id: JobId,
    content: String,
    profile: ModelProfile,
    credential: Credential,
    summarizer: Arc<S>,
    cancel: CancellationToken,
    state: watch::Sender<JobState>,
    sink: K,
    slot: ActiveSlot,
}

impl<S, K> Job<S, K>
where
    S: Summarizer + Send + Sync + 'static,
    K: JobSink,
{
    fn emit(&self, phase: Phase) {
        let event = ProgressEvent::new(self.id, phase);
        tracing::debug!(percent = event.percent, %phase, "Job progress");
        self.sink.on_progress(event);
    }

    #[tracing::instrument(skip_all, fields(job_id = %self.id, model = %self.profile.name))]
    async fn run(self) {
        self.state.send_replace(JobState::Running);
        self.emit(Phase::Started);

        let outcome = self.call_summarizer().await;
        match &outcome {
            Ok(summary) => {
                self.emit(Phase::ResponseReceived);
                self.emit(Phase::Completed);
                tracing::info!(summary_len = summary.len(), "Job succeeded");
            }
            Err(e) => {
                self.emit(Phase::Reset);
                tracing::error!(error = %e, "Job failed");
            }
        }

        let Job {
            id,
            state,
            sink,
            slot,
            ..
        } = self;

        // free the runner before anyone can observe the outcome; a shared
        // sink may see the next job start before this outcome arrives
        drop(slot);
        state.send_replace(JobState::from_outcome(&outcome));
        sink.on_finished(id, outcome);
    }

    async fn call_summarizer(&self) -> JobOutcome {
        if self.cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        // the synchronous part of `summarize` can panic too
        let call = AssertUnwindSafe(async {
            self.summarizer
                .summarize(&self.credential, &self.profile.name, &self.content)
                .await
        })
        .catch_unwind();

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(JobError::Cancelled),
            result = call => result,
        };

        match result {
            Ok(Ok(_)) if self.cancel.is_cancelled() => Err(JobError::Cancelled),
            Ok(Ok(summary)) => Ok(summary),
            Ok(Err(e)) => Err(JobError::Client(e)),
            Err(panic) => Err(JobError::Aborted(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "summarizer panicked".into())
}
