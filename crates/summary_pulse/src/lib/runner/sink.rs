use tokio::sync::mpsc::UnboundedSender;

use crate::runner::job::{JobId, JobOutcome, ProgressEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress(ProgressEvent),
    Finished { job_id: JobId, outcome: JobOutcome },
}

/// Receives a job's progress events followed by exactly one outcome.
pub trait JobSink: Send + Sync + 'static {
    fn on_progress(&self, event: ProgressEvent);

    fn on_finished(&self, job_id: JobId, outcome: JobOutcome);
}

impl JobSink for UnboundedSender<JobEvent> {
    fn on_progress(&self, event: ProgressEvent) {
        if self.send(JobEvent::Progress(event)).is_err() {
            tracing::debug!("Progress receiver dropped");
        }
    }

    fn on_finished(&self, job_id: JobId, outcome: JobOutcome) {
        if self.send(JobEvent::Finished { job_id, outcome }).is_err() {
            tracing::warn!(%job_id, "Outcome receiver dropped before the job finished");
        }
    }
}

/// Adapts a closure into a [`JobSink`].
pub struct FnSink<F>(pub F);

impl<F> JobSink for FnSink<F>
where
    F: Fn(JobEvent) + Send + Sync + 'static,
{
    fn on_progress(&self, event: ProgressEvent) {
        (self.0)(JobEvent::Progress(event))
    }

    fn on_finished(&self, job_id: JobId, outcome: JobOutcome) {
        (self.0)(JobEvent::Finished { job_id, outcome })
    }
}
