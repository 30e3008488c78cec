//! Whisper-compatible transcription backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use notegen_core::{
    defaults, Error, Result, TranscriptSegment, TranscriptWord, TranscriptionBackend,
    TranscriptionOutput,
};

use crate::openai::{request_error, to_provider_error, OpenAIErrorCode};

/// Provider name used in error messages.
pub const PROVIDER: &str = "whisper";

/// Configuration for the Whisper backend.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::WHISPER_URL.to_string(),
            model: defaults::WHISPER_MODEL.to_string(),
            timeout_secs: defaults::WHISPER_TIMEOUT_SECS,
        }
    }
}

/// OpenAI-compatible Whisper backend (works with Speaches/faster-whisper-server).
pub struct WhisperBackend {
    config: WhisperConfig,
    client: reqwest::Client,
}

impl WhisperBackend {
    pub fn new(config: WhisperConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment variables.
    /// Returns None if WHISPER_BASE_URL is not set.
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("WHISPER_BASE_URL").ok()?;
        if base_url.is_empty() {
            return None;
        }
        let model = std::env::var("WHISPER_MODEL")
            .unwrap_or_else(|_| defaults::WHISPER_MODEL.to_string());
        let timeout_secs = std::env::var("WHISPER_TIMEOUT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::WHISPER_TIMEOUT_SECS);
        Some(Self::new(WhisperConfig {
            base_url,
            model,
            timeout_secs,
        }))
    }
}

/// File extension for an audio MIME type.
fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/flac" => "flac",
        "audio/aac" => "aac",
        "audio/webm" => "webm",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        _ => "wav",
    }
}

/// Whisper `verbose_json` response format.
#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Option<Vec<WhisperSegment>>,
    #[serde(default)]
    words: Option<Vec<WhisperWord>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

#[derive(Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
}

#[derive(Deserialize)]
struct WhisperWord {
    word: String,
    start: f64,
    end: f64,
}

impl From<WhisperResponse> for TranscriptionOutput {
    fn from(result: WhisperResponse) -> Self {
        TranscriptionOutput {
            text: result.text.trim().to_string(),
            language_detected: result.language,
            duration_secs: result.duration,
            segments: result
                .segments
                .unwrap_or_default()
                .into_iter()
                .map(|s| TranscriptSegment {
                    start_secs: s.start,
                    end_secs: s.end,
                    text: s.text.trim().to_string(),
                })
                .collect(),
            words: result
                .words
                .unwrap_or_default()
                .into_iter()
                .map(|w| TranscriptWord {
                    word: w.word.trim().to_string(),
                    start_secs: w.start,
                    end_secs: w.end,
                })
                .collect(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for WhisperBackend {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        content_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionOutput> {
        let url = format!(
            "{}/v1/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );

        let filename = if filename.contains('.') {
            filename.to_string()
        } else {
            format!("{}.{}", filename, extension_for(content_type))
        };

        debug!(
            subsystem = "inference",
            component = "whisper",
            model = %self.config.model,
            size_bytes = audio.len(),
            filename = %filename,
            "Transcribing audio"
        );

        let file_part = reqwest::multipart::Part::bytes(audio)
            .file_name(filename)
            .mime_str(content_type)
            .map_err(|e| Error::InvalidInput(format!("Invalid audio content type: {}", e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .text("timestamp_granularities[]", "word");

        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| request_error(PROVIDER, e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let code = OpenAIErrorCode::from_response(status, "");
            let message: String = body.chars().take(200).collect();
            return Err(to_provider_error(PROVIDER, code, status, &message));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            Error::provider(PROVIDER, format!("Failed to parse response: {}", e), true)
        })?;

        Ok(result.into())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whisper_config_defaults() {
        let config = WhisperConfig::default();
        assert_eq!(config.base_url, defaults::WHISPER_URL);
        assert_eq!(config.model, defaults::WHISPER_MODEL);
        assert_eq!(config.timeout_secs, defaults::WHISPER_TIMEOUT_SECS);
    }

    #[test]
    fn test_model_name() {
        let backend = WhisperBackend::new(WhisperConfig {
            model: "custom-whisper".to_string(),
            ..Default::default()
        });
        assert_eq!(backend.model_name(), "custom-whisper");
    }

    #[test]
    fn test_whisper_response_conversion() {
        let json = r#"{
            "text": " Hello world ",
            "segments": [
                {"start": 0.0, "end": 2.5, "text": " Hello"},
                {"start": 2.5, "end": 5.0, "text": " world"}
            ],
            "words": [
                {"word": "Hello", "start": 0.0, "end": 0.4},
                {"word": " world", "start": 2.5, "end": 2.9}
            ],
            "language": "en",
            "duration": 5.0
        }"#;

        let response: WhisperResponse = serde_json::from_str(json).unwrap();
        let output: TranscriptionOutput = response.into();
        assert_eq!(output.text, "Hello world");
        assert_eq!(output.segments.len(), 2);
        assert_eq!(output.segments[1].text, "world");
        assert_eq!(output.words[1].word, "world");
        assert_eq!(output.language_detected.as_deref(), Some("en"));
        assert_eq!(output.duration_secs, Some(5.0));
    }

    #[test]
    fn test_whisper_response_minimal() {
        let response: WhisperResponse = serde_json::from_str(r#"{"text": "Hi"}"#).unwrap();
        let output: TranscriptionOutput = response.into();
        assert_eq!(output.text, "Hi");
        assert!(output.segments.is_empty());
        assert!(output.words.is_empty());
        assert!(output.language_detected.is_none());
    }

    #[test]
    fn test_extension_for_content_type() {
        let cases = [
            ("audio/mpeg", "mp3"),
            ("audio/mp3", "mp3"),
            ("audio/x-wav", "wav"),
            ("audio/ogg", "ogg"),
            ("audio/flac", "flac"),
            ("audio/webm", "webm"),
            ("audio/x-m4a", "m4a"),
            ("audio/unknown", "wav"),
        ];
        for (content_type, expected) in cases {
            assert_eq!(extension_for(content_type), expected, "{}", content_type);
        }
    }
}
