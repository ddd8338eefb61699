mod mocks;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use credential_vault::{CredentialVault, VaultConfig};
use mocks::summarizer::{EagerPanicSummarizer, MockSummarizer, SummarizeCall};
use summary_pulse::{
    estimate_tokens, ClientError, Credential, FnSink, JobError, JobEvent, JobOutcome, JobRunner,
    JobRunnerBuilder, JobState, ModelCatalog, ModelProfile, Phase, ProgressEvent, RunnerError,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};

fn build_runner(summarizer: MockSummarizer) -> JobRunner<MockSummarizer> {
    JobRunnerBuilder::new()
        .summarizer(summarizer)
        .catalog(ModelCatalog::builtin())
        .build()
        .expect("runner should build inside a tokio runtime")
}

fn profile(name: &str) -> ModelProfile {
    ModelCatalog::builtin()
        .get(name)
        .cloned()
        .expect("builtin profile")
}

fn credential() -> Credential {
    Credential::new("sk-test")
}

async fn collect_events(rx: &mut UnboundedReceiver<JobEvent>) -> (Vec<ProgressEvent>, JobOutcome) {
    let mut progress = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            JobEvent::Progress(event) => progress.push(event),
            JobEvent::Finished { outcome, .. } => return (progress, outcome),
        }
    }
    panic!("sink closed before the job finished");
}

fn percents(events: &[ProgressEvent]) -> Vec<u8> {
    events.iter().map(|e| e.percent).collect()
}

// ─── Happy path ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_successful_job_reports_progress_then_summary() {
    let summarizer = MockSummarizer::new("## Minutes\nDecisions were made.");
    let calls = summarizer.calls.clone();
    let runner = build_runner(summarizer);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = runner
        .submit("Alice: hello. Bob: hi.", &profile("gpt-4"), &credential(), tx)
        .unwrap();

    let (progress, outcome) = collect_events(&mut rx).await;

    assert_eq!(outcome, Ok("## Minutes\nDecisions were made.".to_string()));
    assert_eq!(percents(&progress), [25, 85, 100]);
    assert_eq!(
        progress.iter().map(|e| e.phase).collect::<Vec<_>>(),
        [Phase::Started, Phase::ResponseReceived, Phase::Completed]
    );
    assert!(progress.iter().all(|e| e.job_id == handle.id()));

    assert_eq!(
        handle.wait().await,
        JobState::Succeeded("## Minutes\nDecisions were made.".into())
    );
    assert!(!runner.is_busy());

    let calls = calls.lock().unwrap();
    assert_eq!(
        *calls,
        [SummarizeCall {
            api_key: "sk-test".into(),
            model: "gpt-4".into(),
            content: "Alice: hello. Bob: hi.".into(),
        }]
    );
}

#[tokio::test]
async fn test_progress_is_monotonic_and_precedes_outcome() {
    let events = Arc::new(Mutex::new(Vec::<JobEvent>::new()));
    let sink_events = events.clone();
    let runner = build_runner(MockSummarizer::new("summary"));

    let mut handle = runner
        .submit(
            "transcript",
            &profile("gpt-4o"),
            &credential(),
            FnSink(move |event: JobEvent| sink_events.lock().unwrap().push(event)),
        )
        .unwrap();
    handle.wait().await;
    // the outcome is delivered right after the state flips
    tokio::task::yield_now().await;

    let events = events.lock().unwrap();
    let (last, progress) = events.split_last().expect("events");
    assert!(matches!(last, JobEvent::Finished { outcome: Ok(_), .. }));

    let mut previous = 0;
    for event in progress {
        let JobEvent::Progress(event) = event else {
            panic!("outcome delivered before progress finished: {event:?}");
        };
        assert!(event.percent >= previous);
        previous = event.percent;
    }
    assert_eq!(previous, 100);
}

// ─── Single flight ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_second_submit_while_running_is_busy() {
    let (summarizer, gate) = MockSummarizer::gated("first summary");
    let calls = summarizer.calls.clone();
    let runner = build_runner(summarizer);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut first = runner
        .submit("first transcript", &profile("gpt-4"), &credential(), tx)
        .unwrap();
    gate.entered().await;

    assert_eq!(first.state(), JobState::Running);
    assert_eq!(runner.active_job(), Some(first.id()));

    let (tx2, _rx2) = mpsc::unbounded_channel();
    let second = runner.submit("second transcript", &profile("gpt-4"), &credential(), tx2);
    match second {
        Err(RunnerError::Busy { running }) => assert_eq!(running, first.id()),
        other => panic!("expected Busy, got {other:?}"),
    }

    // the in-flight job is untouched
    assert_eq!(first.state(), JobState::Running);
    assert_eq!(calls.lock().unwrap().len(), 1);

    gate.release();
    let (_, outcome) = collect_events(&mut rx).await;
    assert_eq!(outcome, Ok("first summary".to_string()));
    assert_eq!(first.wait().await, JobState::Succeeded("first summary".into()));

    // runner accepts work again
    let (tx3, mut rx3) = mpsc::unbounded_channel();
    let third = runner
        .submit("third transcript", &profile("gpt-4"), &credential(), tx3)
        .unwrap();
    assert_ne!(third.id(), first.id());
    gate.release();
    let (_, outcome) = collect_events(&mut rx3).await;
    assert!(outcome.is_ok());
}

// ─── Failures ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_job_frees_runner_for_resubmission() {
    let summarizer = MockSummarizer::failing_once(
        ClientError::Network("connection reset".into()),
        "second try worked",
    );
    let runner = build_runner(summarizer);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = runner
        .submit("transcript", &profile("gpt-4"), &credential(), tx)
        .unwrap();

    let (progress, outcome) = collect_events(&mut rx).await;
    assert_eq!(
        outcome,
        Err(JobError::Client(ClientError::Network("connection reset".into())))
    );
    assert_eq!(percents(&progress), [25, 0]);
    assert_eq!(progress.last().map(|e| e.phase), Some(Phase::Reset));
    assert!(matches!(handle.wait().await, JobState::Failed(JobError::Client(_))));

    // no automatic retry happened; the caller resubmits
    assert!(!runner.is_busy());
    let (tx, mut rx) = mpsc::unbounded_channel();
    runner
        .submit("transcript", &profile("gpt-4"), &credential(), tx)
        .expect("runner must not stay busy after a failure");
    let (_, outcome) = collect_events(&mut rx).await;
    assert_eq!(outcome, Ok("second try worked".to_string()));
}

#[tokio::test]
async fn test_resubmit_from_outcome_callback_is_accepted() {
    let runner = Arc::new(build_runner(MockSummarizer::new("summary")));
    let resubmitted = Arc::new(Mutex::new(None));
    let (tx, mut rx) = mpsc::unbounded_channel();

    let sink_runner = runner.clone();
    let sink_result = resubmitted.clone();
    runner
        .submit(
            "first transcript",
            &profile("gpt-4"),
            &credential(),
            FnSink(move |event: JobEvent| {
                if let JobEvent::Finished { .. } = event {
                    let result = sink_runner
                        .submit("second transcript", &profile("gpt-4"), &credential(), tx.clone())
                        .map(|handle| handle.id());
                    *sink_result.lock().unwrap() = Some(result);
                }
            }),
        )
        .unwrap();

    // only the second job reports to this channel
    let (progress, outcome) = collect_events(&mut rx).await;
    assert_eq!(percents(&progress), [25, 85, 100]);
    assert_eq!(outcome, Ok("summary".to_string()));
    assert!(matches!(*resubmitted.lock().unwrap(), Some(Ok(_))));
}

#[tokio::test]
async fn test_client_error_kinds_are_delivered_typed() {
    let errors = [
        ClientError::Auth("invalid api key".into()),
        ClientError::RateLimited {
            retry_after: Some(Duration::from_secs(30)),
        },
        ClientError::Malformed("missing choices".into()),
        ClientError::Network("timeout".into()),
    ];

    for error in errors {
        let runner = build_runner(MockSummarizer::failing(error.clone()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        runner
            .submit("transcript", &profile("gpt-4o"), &credential(), tx)
            .unwrap();

        let (_, outcome) = collect_events(&mut rx).await;
        assert_eq!(outcome, Err(JobError::Client(error)));
    }
}

#[tokio::test]
async fn test_panicking_summarizer_is_reported_as_aborted() {
    let runner = build_runner(MockSummarizer::panicking("boom"));

    let (tx, mut rx) = mpsc::unbounded_channel();
    runner
        .submit("transcript", &profile("gpt-4"), &credential(), tx)
        .unwrap();

    let (_, outcome) = collect_events(&mut rx).await;
    assert_eq!(outcome, Err(JobError::Aborted("boom".into())));
    assert!(!runner.is_busy());
}

#[tokio::test]
async fn test_panic_before_the_future_is_built_reaches_the_sink() {
    let runner = JobRunnerBuilder::new()
        .summarizer(EagerPanicSummarizer::new("bad request builder"))
        .build()
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = runner
        .submit("transcript", &profile("gpt-4"), &credential(), tx)
        .unwrap();

    let (progress, outcome) = collect_events(&mut rx).await;
    assert_eq!(outcome, Err(JobError::Aborted("bad request builder".into())));
    assert_eq!(percents(&progress), [25, 0]);
    assert_eq!(
        handle.wait().await,
        JobState::Failed(JobError::Aborted("bad request builder".into()))
    );
    assert!(!runner.is_busy());
}

// ─── Cancellation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancel_during_call_fails_with_cancelled() {
    let (summarizer, gate) = MockSummarizer::gated("never delivered");
    let runner = build_runner(summarizer);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut handle = runner
        .submit("transcript", &profile("gpt-4"), &credential(), tx)
        .unwrap();
    gate.entered().await;

    handle.cancel();

    let (progress, outcome) = collect_events(&mut rx).await;
    assert_eq!(outcome, Err(JobError::Cancelled));
    assert_eq!(progress.last().map(|e| e.phase), Some(Phase::Reset));
    assert_eq!(handle.wait().await, JobState::Failed(JobError::Cancelled));
    assert!(!runner.is_busy());
}

#[tokio::test]
async fn test_cancel_before_start_skips_the_call() {
    let summarizer = MockSummarizer::new("unused");
    let calls = summarizer.calls.clone();
    let runner = build_runner(summarizer);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = runner
        .submit("transcript", &profile("gpt-4"), &credential(), tx)
        .unwrap();
    // current-thread runtime: the job task has not been polled yet
    assert_eq!(handle.state(), JobState::Pending);
    handle.cancel();

    let (_, outcome) = collect_events(&mut rx).await;
    assert_eq!(outcome, Err(JobError::Cancelled));
    assert!(calls.lock().unwrap().is_empty());
}

// ─── Validation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unknown_profile_and_empty_content_are_rejected() {
    let runner = build_runner(MockSummarizer::new("summary"));

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = runner.submit(
        "transcript",
        &ModelProfile::new("not-a-model", 1_000),
        &credential(),
        tx,
    );
    assert!(matches!(result, Err(RunnerError::UnknownProfile(name)) if name == "not-a-model"));

    let (tx, _rx) = mpsc::unbounded_channel();
    let result = runner.submit("  \n ", &profile("gpt-4"), &credential(), tx);
    assert!(matches!(result, Err(RunnerError::EmptyContent)));

    assert!(!runner.is_busy());
}

#[test]
fn test_build_outside_runtime_is_an_error() {
    let result = JobRunnerBuilder::new()
        .summarizer(MockSummarizer::new("summary"))
        .build();
    assert!(matches!(result, Err(RunnerError::NoRuntime(_))));
}

#[test]
fn test_build_with_explicit_runtime_handle() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let runner = JobRunnerBuilder::new()
        .summarizer(MockSummarizer::new("from explicit runtime"))
        .runtime(runtime.handle().clone())
        .build()
        .unwrap();

    // submitted from outside the runtime, executed on it
    let (tx, mut rx) = mpsc::unbounded_channel();
    runner
        .submit("transcript", &profile("gpt-4"), &credential(), tx)
        .unwrap();
    let (_, outcome) = runtime.block_on(collect_events(&mut rx));
    assert_eq!(outcome, Ok("from explicit runtime".to_string()));
}

// ─── End to end ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_vault_catalog_runner_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let vault = CredentialVault::new(&VaultConfig::new(dir.path()));

    vault.store("sk-test").unwrap();
    let stored = vault.get_stored().unwrap().expect("credential stored");
    assert_eq!(stored.expose(), "sk-test");

    let catalog = ModelCatalog::builtin();
    let transcript = vec!["word"; 1000].join(" ");
    assert_eq!(estimate_tokens(&transcript), 1330);
    let selected = catalog.select_for(&transcript).clone();
    assert!(selected.capacity_tokens >= 1330);
    assert!(catalog
        .profiles()
        .iter()
        .filter(|p| p.capacity_tokens >= 1330)
        .all(|p| p.capacity_tokens >= selected.capacity_tokens));

    let summarizer = MockSummarizer::new("summary");
    let calls = summarizer.calls.clone();
    let runner = JobRunnerBuilder::new()
        .summarizer(summarizer)
        .catalog(catalog)
        .build()
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    runner.submit(transcript, &selected, &stored, tx).unwrap();
    let (_, outcome) = collect_events(&mut rx).await;
    assert_eq!(outcome, Ok("summary".to_string()));

    {
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].api_key, "sk-test");
        assert_eq!(calls[0].model, selected.name);
    }

    vault.delete().unwrap();
    assert!(vault.get_stored().unwrap().is_none());
}

#[tokio::test]
async fn test_oversized_transcript_uses_default_profile() {
    let catalog = ModelCatalog::new(
        vec![
            ModelProfile::new("mini", 100),
            ModelProfile::new("standard", 500),
            ModelProfile::new("max", 1_000),
        ],
        "standard",
    )
    .unwrap();
    let transcript = vec!["word"; 2000].join(" ");
    let selected = catalog.select_for(&transcript).clone();
    assert_eq!(selected.name, "standard");

    let summarizer = MockSummarizer::new("summary");
    let calls = summarizer.calls.clone();
    let runner = JobRunnerBuilder::new()
        .summarizer(summarizer)
        .catalog(catalog)
        .build()
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    runner
        .submit(transcript, &selected, &credential(), tx)
        .unwrap();
    let (_, outcome) = collect_events(&mut rx).await;

    assert!(outcome.is_ok());
    assert_eq!(calls.lock().unwrap()[0].model, "standard");
}
