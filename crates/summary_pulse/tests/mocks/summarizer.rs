use std::{
    future::Future,
    sync::{Arc, Mutex},
};

use summary_pulse::{ClientError, Credential, Summarizer};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq)]
pub struct SummarizeCall {
    pub api_key: String,
    pub model: String,
    pub content: String,
}

/// Parks calls until the test releases them.
#[derive(Clone, Default)]
pub struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Gate {
    /// Resolves once a call is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await
    }

    pub fn release(&self) {
        self.release.notify_one()
    }
}

#[derive(Clone)]
pub struct MockSummarizer {
    pub summary: String,
    pub calls: Arc<Mutex<Vec<SummarizeCall>>>,
    pub fail_with: Option<ClientError>,
    pub fail_next: Arc<Mutex<Option<ClientError>>>,
    pub panic_with: Option<String>,
    pub gate: Option<Gate>,
}

impl MockSummarizer {
    pub fn new(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_with: None,
            fail_next: Arc::new(Mutex::new(None)),
            panic_with: None,
            gate: None,
        }
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new("")
        }
    }

    /// Fails the first call with `error`, then succeeds with `summary`.
    pub fn failing_once(error: ClientError, summary: &str) -> Self {
        Self {
            fail_next: Arc::new(Mutex::new(Some(error))),
            ..Self::new(summary)
        }
    }

    pub fn panicking(msg: &str) -> Self {
        Self {
            panic_with: Some(msg.to_string()),
            ..Self::new("")
        }
    }

    pub fn gated(summary: &str) -> (Self, Gate) {
        let gate = Gate::default();
        let mock = Self {
            gate: Some(gate.clone()),
            ..Self::new(summary)
        };
        (mock, gate)
    }
}

impl Summarizer for MockSummarizer {
    async fn summarize(
        &self,
        credential: &Credential,
        model_name: &str,
        content: &str,
    ) -> Result<String, ClientError> {
        self.calls.lock().unwrap().push(SummarizeCall {
            api_key: credential.expose().to_string(),
            model: model_name.to_string(),
            content: content.to_string(),
        });

        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if let Some(msg) = &self.panic_with {
            panic!("{msg}");
        }
        if let Some(error) = self.fail_next.lock().unwrap().take() {
            return Err(error);
        }
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        Ok(self.summary.clone())
    }
}

/// Panics while building the future, before any `.await`.
#[derive(Clone)]
pub struct EagerPanicSummarizer {
    pub message: String,
}

impl EagerPanicSummarizer {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Summarizer for EagerPanicSummarizer {
    fn summarize(
        &self,
        _credential: &Credential,
        _model_name: &str,
        _content: &str,
    ) -> impl Future<Output = Result<String, ClientError>> + Send {
        if !self.message.is_empty() {
            panic!("{}", self.message);
        }
        std::future::ready(Ok(String::new()))
    }
}
