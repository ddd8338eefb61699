use std::time::Duration;

use credential_vault::Credential;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;

use crate::{ClientError, Summarizer};

/// Chat Completions client used as the production [`Summarizer`].
///
/// The API key is supplied per call so that it can come straight from the
/// credential vault; the client itself holds no secret.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    client: Client,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

impl Default for OpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAIClient {
    const SYSTEM_PROMPT: &'static str = include_str!("./prompts/system_0.txt");
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";

    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: Self::DEFAULT_BASE_URL.into(),
            max_tokens: 5000,
            temperature: 0.5,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Upper bound on the length of the generated summary.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn send_completion_request(
        &self,
        api_key: &str,
        model_name: &str,
        transcript: &str,
    ) -> Result<CompletionResponse, ClientError> {
        let body = serde_json::json!({
            "model": model_name,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "n": 1,
            "messages": [
                {
                    "role": "system",
                    "content": Self::SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": format!("Summarize the following meeting transcript:\n\n{transcript}")
                }
            ]
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to make http request"))
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let message = resp.text().await.unwrap_or_default();
            return Err(classify_status(status, retry_after, message));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        serde_json::from_str::<CompletionResponse>(&body)
            .map_err(|e| ClientError::Malformed(e.to_string()))
    }
}

/// Maps a non-success HTTP status onto the client error taxonomy.
fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    message: String,
) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited { retry_after },
        _ => ClientError::Network(format!("{status}: {message}")),
    }
}

/// Only the delay-seconds form of `Retry-After` is understood.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[derive(Debug, Deserialize)]
pub struct CompletionResponse {
    pub id: String,
    pub choices: Vec<CompletionChoice>,
}

impl CompletionResponse {
    /// Text of the first choice.
    pub fn into_summary(self) -> Result<String, ClientError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| ClientError::Malformed("No content in response".into()))
    }
}

#[derive(Debug, Deserialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: CompletionMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CompletionMessage {
    pub role: String,
    pub content: Option<String>,
}

impl Summarizer for OpenAIClient {
    async fn summarize(
        &self,
        credential: &Credential,
        model_name: &str,
        content: &str,
    ) -> Result<String, ClientError> {
        let response = self
            .send_completion_request(credential.expose(), model_name, content)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to summarize content"))?;

        tracing::debug!(response_id = %response.id, "Received completion");
        response.into_summary()
    }
}
