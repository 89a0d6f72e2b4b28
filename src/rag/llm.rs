//! Generation backend seam and the Ollama implementation.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::OllamaConfig;
use crate::error::{RagError, Result};

/// Timeout for the lightweight connectivity probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A text generation backend. The pipeline is generic over this trait so
/// tests run against a scripted backend instead of a live server.
pub trait LlmBackend: Send + Sync {
    /// Generate a completion for `prompt` under `system_prompt`.
    fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for a local Ollama server's `/api/generate` endpoint.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OllamaClient {
    /// Build a client with the configured request timeout.
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Whether the Ollama server answers its tags endpoint.
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

impl LlmBackend for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            system: system_prompt,
            options: GenerateOptions {
                temperature,
                num_predict: self.max_tokens,
            },
        };

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(RagError::LlmUnavailable(format!(
                "Ollama returned status {}",
                response.status()
            )));
        }

        let body: GenerateResponse = response.json().await?;
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let config = OllamaConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            model: "phi3:mini",
            prompt: "hello",
            stream: false,
            system: None,
            options: GenerateOptions {
                temperature: 0.7,
                num_predict: 1024,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "phi3:mini");
        assert!(json.get("system").is_none());
        assert_eq!(json["options"]["num_predict"], 1024);
    }

    #[tokio::test]
    async fn test_unreachable_server_maps_to_unavailable() {
        let config = OllamaConfig {
            // Reserved TEST-NET address, nothing listens there
            base_url: "http://192.0.2.1:1".to_string(),
            timeout_secs: 1,
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();

        let result = client.generate("hi", None, 0.7).await;
        assert!(matches!(result, Err(RagError::LlmUnavailable(_))));

        assert!(!client.check_connection().await);
    }
}
