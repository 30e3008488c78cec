//! OpenAI-compatible generation and speech backend implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use notegen_core::{defaults, AudioFormat, Error, GenerationBackend, Result, SpeechBackend};

use super::error::{request_error, to_provider_error, OpenAIErrorCode};
use super::types::*;

/// Provider name used in error messages.
pub const PROVIDER: &str = "openai";

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for JSON generation.
    pub gen_model: String,
    /// Model to use for speech synthesis.
    pub tts_model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::OPENAI_URL.to_string(),
            api_key: None,
            gen_model: defaults::GEN_MODEL.to_string(),
            tts_model: defaults::TTS_MODEL.to_string(),
            timeout_seconds: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl OpenAIConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| defaults::OPENAI_URL.to_string()),
            api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            gen_model: std::env::var("OPENAI_GEN_MODEL")
                .unwrap_or_else(|_| defaults::GEN_MODEL.to_string()),
            tts_model: std::env::var("OPENAI_TTS_MODEL")
                .unwrap_or_else(|_| defaults::TTS_MODEL.to_string()),
            timeout_seconds: std::env::var("OPENAI_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::GEN_TIMEOUT_SECS),
        }
    }
}

/// OpenAI-compatible backend for JSON generation and speech synthesis.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            url = %config.base_url,
            gen_model = %config.gen_model,
            tts_model = %config.tts_model,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        req.header("Content-Type", "application/json")
    }

    /// Turn a non-success response into a classified provider error.
    async fn error_from_response(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let (error_type, message) = match serde_json::from_str::<OpenAIErrorResponse>(&body) {
            Ok(parsed) => (parsed.error.error_type, parsed.error.message),
            Err(_) => (String::new(), body.chars().take(200).collect()),
        };
        let code = OpenAIErrorCode::from_response(status, &error_type);
        to_provider_error(PROVIDER, code, status, &message)
    }
}

fn response_format(schema: &serde_json::Value) -> ResponseFormat {
    if schema.is_null() {
        return ResponseFormat::JsonObject;
    }
    let name = schema
        .get("title")
        .and_then(|t| t.as_str())
        .unwrap_or("response")
        .to_string();
    ResponseFormat::JsonSchema {
        json_schema: JsonSchemaFormat {
            name,
            schema: schema.clone(),
            strict: false,
        },
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate_json(
        &self,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<String> {
        debug!(
            subsystem = "inference",
            component = "openai",
            model = %self.config.gen_model,
            prompt_len = user.len(),
            "Generating JSON"
        );

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage::new("system", system));
        }
        messages.push(ChatMessage::new("user", user));

        let request = ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages,
            temperature: None,
            response_format: Some(response_format(schema)),
        };

        let response = self
            .build_request("/chat/completions")
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let result: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::provider(PROVIDER, format!("Failed to parse response: {}", e), true)
        })?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::provider(PROVIDER, "response contained no choices", true))?;

        if choice.finish_reason.as_deref() == Some("length") {
            warn!(
                subsystem = "inference",
                component = "openai",
                model = %self.config.gen_model,
                "Completion stopped at the output token limit"
            );
        }

        let content = choice.message.content.unwrap_or_default();
        debug!(
            subsystem = "inference",
            component = "openai",
            response_len = content.len(),
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[async_trait]
impl SpeechBackend for OpenAIBackend {
    async fn synthesize(&self, text: &str, voice: &str, format: AudioFormat) -> Result<Vec<u8>> {
        debug!(
            subsystem = "inference",
            component = "openai",
            model = %self.config.tts_model,
            voice,
            format = format.as_str(),
            text_len = text.len(),
            "Synthesizing speech"
        );

        let request = SpeechRequest {
            model: self.config.tts_model.clone(),
            input: text.to_string(),
            voice: voice.to_string(),
            response_format: format.as_str().to_string(),
        };

        let response = self
            .build_request("/audio/speech")
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;
        if bytes.is_empty() {
            return Err(Error::provider(PROVIDER, "speech response was empty", true));
        }
        Ok(bytes.to_vec())
    }

    fn model_name(&self) -> &str {
        &self.config.tts_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, defaults::OPENAI_URL);
        assert_eq!(config.gen_model, defaults::GEN_MODEL);
        assert_eq!(config.tts_model, defaults::TTS_MODEL);
        assert_eq!(config.timeout_seconds, defaults::GEN_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_model_name_accessors() {
        let config = OpenAIConfig {
            gen_model: "test-gen".to_string(),
            tts_model: "test-tts".to_string(),
            ..Default::default()
        };
        let backend = OpenAIBackend::new(config).unwrap();
        assert_eq!(GenerationBackend::model_name(&backend), "test-gen");
        assert_eq!(SpeechBackend::model_name(&backend), "test-tts");
    }

    #[test]
    fn test_response_format_uses_schema_title() {
        let schema = serde_json::json!({"title": "quiz", "type": "object"});
        match response_format(&schema) {
            ResponseFormat::JsonSchema { json_schema } => assert_eq!(json_schema.name, "quiz"),
            other => panic!("unexpected format: {:?}", other),
        }
    }

    #[test]
    fn test_response_format_null_schema_is_json_object() {
        assert!(matches!(
            response_format(&serde_json::Value::Null),
            ResponseFormat::JsonObject
        ));
    }
}
