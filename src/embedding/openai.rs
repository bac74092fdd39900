//! Blocking embeddings client for OpenAI-compatible and Azure OpenAI endpoints

use super::provider::{check_dimension, EmbeddingError, EmbeddingProvider};
use crate::config::{resolve_api_key, ApiFlavor, EmbeddingConfig};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP embedding provider
///
/// Performs exactly one request per call; transport and HTTP failures are
/// reported as `EmbeddingError::Transient`.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    send_dimensions: bool,
}

impl OpenAiEmbedder {
    /// Build a client from configuration
    ///
    /// Returns `Unavailable` when the credential or endpoint is missing.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let flavor = ApiFlavor::parse(&config.provider).ok_or_else(|| {
            EmbeddingError::Unavailable(format!(
                "'{}' is not an HTTP embedding provider",
                config.provider
            ))
        })?;

        let api_key = resolve_api_key(&config.api_key_envs).ok_or_else(|| {
            EmbeddingError::Unavailable(format!(
                "none of {:?} is set",
                config.api_key_envs
            ))
        })?;

        let endpoint = flavor
            .url(
                config.endpoint.as_deref(),
                &config.model,
                &config.api_version,
                "embeddings",
            )
            .ok_or_else(|| EmbeddingError::Unavailable("endpoint not configured".to_string()))?;

        let client = build_client(flavor, &api_key, config.timeout_secs)?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            dimension: config.dimension,
            send_dimensions: flavor == ApiFlavor::OpenAi,
        })
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.send_dimensions.then_some(self.dimension),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| EmbeddingError::Transient(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Transient(format!(
                "embeddings endpoint returned {}: {}",
                status, text
            )));
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .map_err(|e| EmbeddingError::Transient(format!("malformed response: {}", e)))?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingError::Transient(format!(
                "received {} embeddings for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|e| e.embedding).collect();
        for vector in &vectors {
            check_dimension(vector, self.dimension)?;
        }
        Ok(vectors)
    }
}

fn build_client(
    flavor: ApiFlavor,
    api_key: &str,
    timeout_secs: u64,
) -> Result<Client, EmbeddingError> {
    let (name, value) = flavor.auth_header(api_key);
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static(name),
        HeaderValue::from_str(&value)
            .map_err(|_| EmbeddingError::Unavailable("invalid API key".to_string()))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .default_headers(headers)
        .build()
        .map_err(|e| EmbeddingError::Unavailable(format!("failed to build HTTP client: {}", e)))
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput("Empty text".to_string()));
        }

        self.request(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::Transient("No embeddings generated".to_string()))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::InvalidInput(
                "Batch contains empty text".to_string(),
            ));
        }

        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.request(&inputs)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_keys(envs: &[&str]) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-large".to_string(),
            dimension: 3072,
            endpoint: None,
            api_version: "2024-02-01".to_string(),
            api_key_envs: envs.iter().map(|s| s.to_string()).collect(),
            batch_size: 16,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let config = config_with_keys(&["RFPQA_TEST_EMBEDDER_KEY_THAT_IS_NEVER_SET"]);
        let result = OpenAiEmbedder::from_config(&config);
        assert!(matches!(result, Err(EmbeddingError::Unavailable(_))));
    }

    #[test]
    fn test_local_provider_is_not_http() {
        let mut config = config_with_keys(&[]);
        config.provider = "local".to_string();
        assert!(matches!(
            OpenAiEmbedder::from_config(&config),
            Err(EmbeddingError::Unavailable(_))
        ));
    }

    #[test]
    fn test_response_parsing_orders_by_index() {
        let body = r#"{"data":[{"index":1,"embedding":[0.5]},{"index":0,"embedding":[0.25]}]}"#;
        let mut parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        parsed.data.sort_by_key(|entry| entry.index);
        assert_eq!(parsed.data[0].embedding, vec![0.25]);
    }

    #[test]
    #[ignore] // Requires network access and OPENAI_API_KEY
    fn test_live_embedding() {
        let config = config_with_keys(&["OPENAI_API_KEY"]);
        let embedder = OpenAiEmbedder::from_config(&config).unwrap();
        let vector = embedder.embed("Supports SMS alerts").unwrap();
        assert_eq!(vector.len(), 3072);
    }
}
