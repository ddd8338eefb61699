use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Result handed to the sink when a job ends.
pub type JobOutcome = Result<String, JobError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded(String),
    Failed(JobError),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    pub(crate) fn from_outcome(outcome: &JobOutcome) -> Self {
        match outcome {
            Ok(summary) => Self::Succeeded(summary.clone()),
            Err(e) => Self::Failed(e.clone()),
        }
    }
}

/// Checkpoints a job reports on its way through the runner.
///
/// `Reset` is only emitted on failure; its 0% is a reset signal for progress
/// displays, not a regression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Started,
    ResponseReceived,
    Completed,
    Reset,
}

impl Phase {
    pub fn percent(self) -> u8 {
        match self {
            Self::Started => 25,
            Self::ResponseReceived => 85,
            Self::Completed => 100,
            Self::Reset => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Started => "Contacting summarizer",
            Self::ResponseReceived => "Processing response",
            Self::Completed => "Summary completed",
            Self::Reset => "Reset",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub percent: u8,
    pub phase: Phase,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    pub(crate) fn new(job_id: JobId, phase: Phase) -> Self {
        Self {
            job_id,
            percent: phase.percent(),
            phase,
            at: Utc::now(),
        }
    }
}

/// Caller-side view of a submitted job.
#[derive(Debug)]
pub struct JobHandle {
    pub(crate) id: JobId,
    pub(crate) state: watch::Receiver<JobState>,
    pub(crate) cancel: CancellationToken,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    /// Requests cancellation. The job ends as `Failed(Cancelled)` unless it
    /// already reached a terminal state.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits until the job reaches a terminal state.
    pub async fn wait(&mut self) -> JobState {
        let terminal = self
            .state
            .wait_for(JobState::is_terminal)
            .await
            .map(|state| (*state).clone());

        match terminal {
            Ok(state) => state,
            // the job task went away without reporting
            Err(_) => match self.state() {
                state if state.is_terminal() => state,
                _ => JobState::Failed(JobError::Aborted(
                    "job task ended without a result".into(),
                )),
            },
        }
    }
}
