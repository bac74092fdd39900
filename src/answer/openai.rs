//! Blocking chat-completions client for OpenAI and Azure OpenAI

use super::generator::{
    Completion, CompletionRequest, FinishReason, GenerationBackend, GenerationError,
};
use crate::config::{resolve_api_key, ApiFlavor, LlmConfig};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub struct OpenAiChat {
    client: Client,
    endpoint: String,
    model: String,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

impl OpenAiChat {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        if !config.enabled {
            return Err(GenerationError::Unavailable(
                "generation disabled in configuration".to_string(),
            ));
        }

        let flavor = ApiFlavor::parse(&config.provider).ok_or_else(|| {
            GenerationError::Unavailable(format!("unknown chat provider '{}'", config.provider))
        })?;

        let api_key = resolve_api_key(&config.api_key_envs).ok_or_else(|| {
            GenerationError::Unavailable(format!("none of {:?} is set", config.api_key_envs))
        })?;

        let endpoint = flavor
            .url(
                config.endpoint.as_deref(),
                &config.model,
                &config.api_version,
                "chat/completions",
            )
            .ok_or_else(|| GenerationError::Unavailable("endpoint not configured".to_string()))?;

        let (name, value) = flavor.auth_header(&api_key);
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value)
                .map_err(|_| GenerationError::Unavailable("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| {
                GenerationError::Unavailable(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            top_p: config.top_p,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
        })
    }
}

impl GenerationBackend for OpenAiChat {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user_prompt,
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: self.top_p,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| GenerationError::Transient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(GenerationError::Transient(format!(
                "chat endpoint returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        parse_completion(parsed)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        true
    }
}

fn parse_completion(parsed: ChatResponse) -> Result<Completion, GenerationError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("response has no choices".to_string()))?;

    Ok(Completion {
        text: choice.message.content.unwrap_or_default(),
        finish_reason: FinishReason::parse(choice.finish_reason.as_deref().unwrap_or("unknown")),
    })
}

/// Stand-in backend when generation is not configured
pub struct DisabledChat {
    reason: String,
}

impl DisabledChat {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl GenerationBackend for DisabledChat {
    fn complete(&self, _request: &CompletionRequest) -> Result<Completion, GenerationError> {
        Err(GenerationError::Unavailable(self.reason.clone()))
    }

    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Build the configured chat backend once at startup
pub fn build_backend(config: &LlmConfig) -> Arc<dyn GenerationBackend> {
    match OpenAiChat::from_config(config) {
        Ok(chat) => {
            tracing::info!("Chat backend ready: {} ({})", chat.model, config.provider);
            Arc::new(chat)
        }
        Err(e) => {
            tracing::warn!("Chat backend not configured: {}", e);
            Arc::new(DisabledChat::new(e.to_string()))
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
