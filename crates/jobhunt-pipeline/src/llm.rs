//! Anthropic Messages API client used to draft cover letters.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use jobhunt_storage::{classify_status, BackoffPolicy, RetryDisposition};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Produces letter text for a prompt. The pipeline only sees this seam.
#[async_trait]
pub trait LetterDrafter: Send + Sync {
    async fn draft(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn first_text(response: MessagesResponse) -> Option<String> {
    response
        .content
        .into_iter()
        .find(|block| block.block_type == "text")
        .and_then(|block| block.text)
        .filter(|text| !text.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    backoff: BackoffPolicy,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building LLM http client")?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            backoff: BackoffPolicy {
                max_retries: 2,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(4),
            },
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn completion; 429 and 5xx responses are retried with backoff.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await;

            let failure = match response {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: MessagesResponse = resp.json().await?;
                    debug!(model = %self.model, "LLM call succeeded");
                    return first_text(parsed).ok_or(LlmError::EmptyContent);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                        .map(|e| e.error.message)
                        .unwrap_or(text);
                    let err = LlmError::Api {
                        status: status.as_u16(),
                        message,
                    };
                    if classify_status(status) == RetryDisposition::NonRetryable {
                        return Err(err);
                    }
                    err
                }
                Err(err) => LlmError::Http(err),
            };

            if attempt >= self.backoff.max_retries {
                return Err(failure);
            }
            let delay = self.backoff.delay_for_attempt(attempt);
            warn!(attempt, ?delay, error = %failure, "LLM call failed, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl LetterDrafter for LlmClient {
    async fn draft(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete(prompt).await
    }
}
