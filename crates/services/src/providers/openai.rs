use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::providers::CompletionProvider;

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl OpenAiConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("TUTOR_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        let base_url =
            env::var("TUTOR_AI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
        let model = env::var("TUTOR_AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
        Some(Self {
            base_url,
            api_key,
            model,
        })
    }
}

/// Completion client for OpenAI-compatible chat endpoints.
#[derive(Clone)]
pub struct OpenAiCompletion {
    client: Client,
    config: Option<OpenAiConfig>,
}

impl OpenAiCompletion {
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(OpenAiConfig::from_env())
    }

    #[must_use]
    pub fn new(config: Option<OpenAiConfig>) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }
}

pub(crate) fn classify_status(status: StatusCode) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        StatusCode::REQUEST_TIMEOUT => ProviderError::Timeout,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth,
        s if s.is_server_error() => ProviderError::Unavailable(format!("upstream status {s}")),
        s => ProviderError::Rejected(format!("unexpected status {s}")),
    }
}

pub(crate) fn classify_transport(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, prompt: &str, max_output: u32) -> Result<String, ProviderError> {
        let config = self.config.as_ref().ok_or(ProviderError::NotConfigured)?;

        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        let payload = ChatRequest {
            model: config.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            temperature: 0.2,
            max_tokens: max_output,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        if !response.status().is_success() {
            return Err(classify_status(response.status()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Rejected(format!("malformed response body: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ProviderError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_onto_provider_errors() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderError::RateLimited
        );
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED), ProviderError::Auth);
        assert_eq!(classify_status(StatusCode::FORBIDDEN), ProviderError::Auth);
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY),
            ProviderError::Rejected(_)
        ));
    }

    #[test]
    fn transient_classification_matches_retry_policy() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE).is_transient());
        assert!(!classify_status(StatusCode::UNAUTHORIZED).is_transient());
        assert!(!ProviderError::NotConfigured.is_transient());
    }

    #[tokio::test]
    async fn unconfigured_client_fails_fast() {
        let client = OpenAiCompletion::new(None);
        assert!(!client.enabled());
        let err = client.complete("hello", 16).await.unwrap_err();
        assert_eq!(err, ProviderError::NotConfigured);
    }
}
