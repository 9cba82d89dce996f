//! Assistant proxy for an OpenAI-compatible chat-completions API
//!
//! A prompt is forwarded verbatim behind a fixed system instruction and the
//! first completion is relayed back. Every failure mode maps to a labeled
//! placeholder answer instead of an error, so callers can always respond.

use std::time::Duration;

use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::config::AssistantConfig;
use crate::{CareMapError, Result};

/// Answer when no credential is configured
pub const DISABLED_ANSWER: &str = "🛠️ Work in progress. AI support not yet configured.";
/// Answer when the upstream cannot be reached or replies with garbage
pub const UNAVAILABLE_ANSWER: &str =
    "🛠️ Work in progress. The assistant is currently unavailable.";
/// Answer when the upstream returns no completion
pub const NO_ANSWER: &str = "⚠️ No AI response available.";

const DEFAULT_UPSTREAM_ERROR: &str = "Something went wrong";

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Completion,
    Disabled,
    UpstreamError,
    NoAnswer,
    Unavailable,
}

/// Text relayed to the user plus how it was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantAnswer {
    pub answer: String,
    pub source: AnswerSource,
}

impl AssistantAnswer {
    fn placeholder(answer: &str, source: AnswerSource) -> Self {
        Self {
            answer: answer.to_string(),
            source,
        }
    }

    fn upstream_error(message: &str) -> Self {
        Self {
            answer: format!("⚠️ AI error: {message}"),
            source: AnswerSource::UpstreamError,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn into_answer(self) -> AssistantAnswer {
        if let Some(err) = self.error {
            let message = err
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(DEFAULT_UPSTREAM_ERROR);
            error!("Assistant upstream returned an error: {}", message);
            return AssistantAnswer::upstream_error(message);
        }

        match self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
        {
            Some(content) => AssistantAnswer {
                answer: content,
                source: AnswerSource::Completion,
            },
            None => {
                warn!("Assistant upstream returned no choices");
                AssistantAnswer::placeholder(NO_ANSWER, AnswerSource::NoAnswer)
            }
        }
    }
}

/// Chat-completions client
pub struct AssistantProxy {
    client: ClientWithMiddleware,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    system_prompt: String,
    deadline: Duration,
}

impl AssistantProxy {
    /// Create a new proxy. A missing credential is not an error; the proxy
    /// answers with the disabled placeholder instead.
    pub fn new(config: &AssistantConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.into()))
            .user_agent(concat!("CareMap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CareMapError::config(format!("Failed to create HTTP client: {e}")))?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(200), Duration::from_secs(5))
            .build_with_max_retries(config.max_retries);
        let attempts = config.max_retries.saturating_add(1);
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        if config.api_key.is_none() {
            warn!("No assistant API key configured; /ask will answer with a placeholder");
        }

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            deadline: Duration::from_secs(config.timeout_seconds.into()) * attempts,
        })
    }

    /// Bound the whole call, retries included. Past the deadline the
    /// unavailable placeholder is returned.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Whether a credential is configured
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Forward `prompt` upstream. Never fails: every failure is converted to
    /// a placeholder answer.
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn ask(&self, prompt: &str) -> AssistantAnswer {
        let Some(api_key) = self.api_key.as_deref() else {
            return AssistantAnswer::placeholder(DISABLED_ANSWER, AnswerSource::Disabled);
        };

        match tokio::time::timeout(self.deadline, self.complete(api_key, prompt)).await {
            Ok(answer) => answer,
            Err(_) => {
                error!("Assistant did not answer within {:?}", self.deadline);
                AssistantAnswer::placeholder(UNAVAILABLE_ANSWER, AnswerSource::Unavailable)
            }
        }
    }

    async fn complete(&self, api_key: &str, prompt: &str) -> AssistantAnswer {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        debug!("Forwarding prompt to {}", self.endpoint);
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Assistant request failed: {}", e);
                return AssistantAnswer::placeholder(UNAVAILABLE_ANSWER, AnswerSource::Unavailable);
            }
        };

        let status = response.status();
        // Error bodies carry a JSON `error` object, so the status alone is not
        // inspected.
        match response.json::<ChatResponse>().await {
            Ok(parsed) => {
                let answer = parsed.into_answer();
                info!(
                    "Assistant answered ({:?}, upstream status {})",
                    answer.source, status
                );
                answer
            }
            Err(e) => {
                error!("Assistant response (status {}) was not valid JSON: {}", status, e);
                AssistantAnswer::placeholder(UNAVAILABLE_ANSWER, AnswerSource::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> AssistantAnswer {
        serde_json::from_str::<ChatResponse>(json)
            .unwrap()
            .into_answer()
    }

    #[test]
    fn test_first_choice_is_relayed() {
        let answer = parse(
            r#"{"choices": [
                {"message": {"role": "assistant", "content": "Try CommUnityCare."}},
                {"message": {"role": "assistant", "content": "second"}}
            ]}"#,
        );
        assert_eq!(answer.answer, "Try CommUnityCare.");
        assert_eq!(answer.source, AnswerSource::Completion);
    }

    #[test]
    fn test_zero_choices_is_no_answer() {
        assert_eq!(parse(r#"{"choices": []}"#).source, AnswerSource::NoAnswer);
        assert_eq!(parse("{}").answer, NO_ANSWER);
        assert_eq!(
            parse(r#"{"choices": [{"message": {"role": "assistant"}}]}"#).source,
            AnswerSource::NoAnswer
        );
    }

    #[test]
    fn test_upstream_error_object() {
        let answer = parse(r#"{"error": {"message": "Incorrect API key provided"}}"#);
        assert_eq!(answer.answer, "⚠️ AI error: Incorrect API key provided");
        assert_eq!(answer.source, AnswerSource::UpstreamError);

        let answer = parse(r#"{"error": "boom"}"#);
        assert_eq!(answer.answer, "⚠️ AI error: Something went wrong");
    }

    #[tokio::test]
    async fn test_missing_credential_answers_disabled() {
        let proxy = AssistantProxy::new(&AssistantConfig::default()).unwrap();
        assert!(!proxy.is_enabled());

        let answer = proxy.ask("Where is the nearest clinic?").await;
        assert_eq!(answer.answer, DISABLED_ANSWER);
        assert_eq!(answer.source, AnswerSource::Disabled);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        let config = AssistantConfig {
            api_key: Some("sk-test-key".to_string()),
            // Port 9 (discard) on localhost refuses connections.
            base_url: "http://127.0.0.1:9/v1".to_string(),
            max_retries: 0,
            timeout_seconds: 2,
            ..AssistantConfig::default()
        };
        let proxy = AssistantProxy::new(&config).unwrap();

        let answer = proxy.ask("hello").await;
        assert_eq!(answer.source, AnswerSource::Unavailable);
        assert_eq!(answer.answer, UNAVAILABLE_ANSWER);
    }

    #[tokio::test]
    async fn test_slow_upstream_hits_deadline() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::POST).path("/v1/chat/completions");
            then.status(200)
                .delay(Duration::from_secs(5))
                .body(r#"{"choices": [{"message": {"content": "late"}}]}"#);
        });

        let config = AssistantConfig {
            api_key: Some("sk-test-key".to_string()),
            base_url: server.url("/v1"),
            timeout_seconds: 30,
            ..AssistantConfig::default()
        };
        let proxy = AssistantProxy::new(&config)
            .unwrap()
            .with_deadline(Duration::from_millis(300));

        let started = std::time::Instant::now();
        let answer = proxy.ask("hello").await;
        assert_eq!(answer.source, AnswerSource::Unavailable);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
