//! LLM client: the single point of entry for all generative calls.
//!
//! ARCHITECTURAL RULE: no other module may call the Anthropic API directly.
//! Step executors consume the `GenerativeCapability` trait so tests can
//! substitute a fake; `LlmClient` is the production implementation.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all generative calls.
/// Intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-3-5-sonnet-20241022";
const MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f32 = 0.7;
const MAX_RETRIES: u32 = 3;

/// Rolling 60-second budgets enforced before each call.
const REQUESTS_PER_MINUTE: usize = 50;
const TOKENS_PER_MINUTE: u32 = 40_000;
const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("model returned empty content")]
    EmptyContent,
}

/// One successful generative completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens_used: u32,
    pub latency: Duration,
}

/// The generative text capability consumed by step executors.
/// Success does not guarantee the text is well-formed JSON.
#[async_trait]
pub trait GenerativeCapability: Send + Sync {
    async fn generate(&self, prompt: &str, system: &str) -> Result<Completion, CapabilityError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl ApiResponse {
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// Rolling-window usage ledger for request and token budgets.
#[derive(Debug, Default)]
struct RateWindow {
    requests: VecDeque<Instant>,
    tokens: VecDeque<(Instant, u32)>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant) {
        while self
            .requests
            .front()
            .is_some_and(|t| now.duration_since(*t) > RATE_WINDOW)
        {
            self.requests.pop_front();
        }
        while self
            .tokens
            .front()
            .is_some_and(|(t, _)| now.duration_since(*t) > RATE_WINDOW)
        {
            self.tokens.pop_front();
        }
    }

    /// Time until the window frees capacity, or zero when a call may proceed.
    fn wait_needed(&mut self, now: Instant) -> Duration {
        self.prune(now);

        if self.requests.len() >= REQUESTS_PER_MINUTE {
            if let Some(oldest) = self.requests.front() {
                return RATE_WINDOW.saturating_sub(now.duration_since(*oldest));
            }
        }

        let spent: u32 = self.tokens.iter().map(|(_, n)| n).sum();
        if spent >= TOKENS_PER_MINUTE {
            if let Some((oldest, _)) = self.tokens.front() {
                return RATE_WINDOW.saturating_sub(now.duration_since(*oldest));
            }
        }

        Duration::ZERO
    }

    fn record(&mut self, now: Instant, tokens: u32) {
        self.requests.push_back(now);
        self.tokens.push_back((now, tokens));
    }
}

/// Production LLM client wrapping the Anthropic Messages API with retry,
/// exponential backoff, and a rolling per-minute rate budget.
pub struct LlmClient {
    client: Client,
    api_key: String,
    window: Mutex<RateWindow>,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            window: Mutex::new(RateWindow::default()),
        }
    }

    /// Sleeps until the rolling window has request and token capacity.
    /// Backoff is internal to the call; callers never see a budget error.
    async fn wait_for_capacity(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock().expect("rate window poisoned");
                window.wait_needed(Instant::now())
            };
            if wait.is_zero() {
                return;
            }
            warn!("Rate budget exhausted, sleeping {}ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }

    fn record_usage(&self, tokens: u32) {
        let mut window = self.window.lock().expect("rate window poisoned");
        window.record(Instant::now(), tokens);
    }

    /// Makes one generative call. Retries on 429 and 5xx with exponential
    /// backoff (1s, 2s, 4s).
    async fn call(&self, prompt: &str, system: &str) -> Result<Completion, CapabilityError> {
        self.wait_for_capacity().await;

        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let started = Instant::now();
        let mut last_error: Option<CapabilityError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(CapabilityError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(CapabilityError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(CapabilityError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let api_response: ApiResponse = match response.json().await {
                Ok(r) => r,
                Err(e) => return Err(CapabilityError::Http(e)),
            };
            let tokens_used = api_response.usage.input_tokens + api_response.usage.output_tokens;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                api_response.usage.input_tokens, api_response.usage.output_tokens
            );

            self.record_usage(tokens_used);

            let text = api_response
                .text()
                .ok_or(CapabilityError::EmptyContent)?
                .to_string();

            return Ok(Completion {
                text,
                tokens_used,
                latency: started.elapsed(),
            });
        }

        Err(last_error.unwrap_or(CapabilityError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }
}

#[async_trait]
impl GenerativeCapability for LlmClient {
    async fn generate(&self, prompt: &str, system: &str) -> Result<Completion, CapabilityError> {
        self.call(prompt, system).await
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_rate_window_allows_when_under_budget() {
        let mut window = RateWindow::default();
        let now = Instant::now();
        window.record(now, 500);
        assert_eq!(window.wait_needed(now), Duration::ZERO);
    }

    #[test]
    fn test_rate_window_blocks_on_request_count() {
        let mut window = RateWindow::default();
        let now = Instant::now();
        for _ in 0..REQUESTS_PER_MINUTE {
            window.record(now, 10);
        }
        assert!(window.wait_needed(now) > Duration::ZERO);
    }

    #[test]
    fn test_rate_window_blocks_on_token_budget() {
        let mut window = RateWindow::default();
        let now = Instant::now();
        window.record(now, TOKENS_PER_MINUTE);
        assert!(window.wait_needed(now) > Duration::ZERO);
    }

    #[test]
    fn test_rate_window_prunes_old_entries() {
        let mut window = RateWindow::default();
        let now = Instant::now();
        window.record(now, TOKENS_PER_MINUTE);
        // Pruning keys off the probe instant, so probing one window later
        // clears the ledger.
        assert_eq!(window.wait_needed(now + RATE_WINDOW + Duration::from_secs(1)), Duration::ZERO);
        assert!(window.requests.is_empty());
    }
}
