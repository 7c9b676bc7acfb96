// src/openai.rs
//! Minimal chat-completions client and the retry policy around it.
//!
//! The client issues one call per invocation and reports failures as
//! [`CompletionError`]; deciding whether and when to call again belongs
//! to the caller's attempt loop, parameterized by [`RetryPolicy`].

use crate::config::OpenAiConfig;
use crate::constants::{CLASSIFIER_BACKOFF_FACTOR, CLASSIFIER_MAX_RETRIES, OPENAI_MODEL};
use crate::error::{AppError, CompletionError};
use rand::Rng;
use reqwest::{header, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    api_base: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self, AppError> {
        let mut headers = header::HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&auth).map_err(|e| {
                AppError::MissingConfiguration(format!("Invalid OpenAI key format: {}", e))
            })?,
        );

        let http = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: OPENAI_MODEL.to_string(),
        })
    }

    /// Issues one chat completion and returns the completion text.
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: Option<f32>,
    ) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature,
        };

        let url = format!("{}/chat/completions", self.api_base);
        log::debug!("POST {}", url);
        let response = self.http.post(&url).json(&request).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(CompletionError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Service { status, body });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)
    }
}

/// Bounded exponential backoff with jitter for rate-limited calls.
///
/// The delay before attempt `n + 1` is `factor^n + jitter[0,1)` units,
/// unless the server supplied an explicit retry-after duration, which
/// wins outright. The unit is one second in production; tests shrink it
/// so the retry bound can be exercised without real multi-second sleeps.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: CLASSIFIER_MAX_RETRIES,
            backoff_factor: CLASSIFIER_BACKOFF_FACTOR,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay to sleep after rate-limited attempt `attempt` (0-based).
    pub fn delay(&self, attempt: u32, server_retry_after: Option<Duration>) -> Duration {
        if let Some(server) = server_retry_after {
            return server;
        }
        let jitter: f64 = rand::rng().random();
        let scale = self.backoff_factor.powi(attempt as i32) + jitter;
        self.unit.mul_f64(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delays_are_non_decreasing() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 0..5 {
            let delay = policy.delay(attempt, None);
            let floor = policy.unit.mul_f64(policy.backoff_factor.powi(attempt as i32));
            let ceiling = floor + policy.unit;
            assert!(delay >= floor, "attempt {} below backoff floor", attempt);
            assert!(delay < ceiling, "attempt {} above jitter ceiling", attempt);
            assert!(delay >= previous, "attempt {} shrank the delay", attempt);
            previous = delay;
        }
    }

    #[test]
    fn server_retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        let delay = policy.delay(4, Some(Duration::from_secs(7)));
        assert_eq!(delay, Duration::from_secs(7));
    }

    #[test]
    fn unit_scales_the_whole_schedule() {
        let policy = RetryPolicy {
            unit: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        // 2^4 + jitter < 17 units
        assert!(policy.delay(4, None) < Duration::from_millis(17));
    }
}
