//! HTTP-level tests for the OpenAI and Whisper backends against a mock server.

use notegen_core::{AudioFormat, GenerationBackend, SpeechBackend, TranscriptionBackend};
use notegen_inference::{OpenAIBackend, OpenAIConfig, WhisperBackend, WhisperConfig};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_backend(server: &MockServer) -> OpenAIBackend {
    OpenAIBackend::new(OpenAIConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        gen_model: "test-gen".to_string(),
        tts_model: "test-tts".to_string(),
        timeout_seconds: 5,
    })
    .expect("Failed to create backend")
}

#[tokio::test]
async fn test_generate_json_sends_schema_and_returns_content() {
    let mock_server = MockServer::start().await;

    let chat_response = serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": "{\"questions\": []}"},
            "finish_reason": "stop"
        }]
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-gen",
            "response_format": {"type": "json_schema", "json_schema": {"name": "quiz"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&chat_response))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = openai_backend(&mock_server);
    let schema = serde_json::json!({"title": "quiz", "type": "object"});
    let raw = backend
        .generate_json("system", "user", &schema)
        .await
        .expect("generation should succeed");
    assert_eq!(raw, "{\"questions\": []}");
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
            "error": {"message": "overloaded", "type": "server_error", "code": null}
        })))
        .mount(&mock_server)
        .await;

    let backend = openai_backend(&mock_server);
    let err = backend
        .generate_json("", "user", &serde_json::Value::Null)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("openai error:"));
    assert!(err.to_string().contains("overloaded"));
}

#[tokio::test]
async fn test_auth_error_is_not_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": {"message": "bad key", "type": "invalid_request_error", "code": "invalid_api_key"}
        })))
        .mount(&mock_server)
        .await;

    let backend = openai_backend(&mock_server);
    let err = backend
        .generate_json("", "user", &serde_json::Value::Null)
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_synthesize_returns_audio_bytes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(body_partial_json(serde_json::json!({
            "model": "test-tts",
            "voice": "nova",
            "response_format": "opus"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 32]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = openai_backend(&mock_server);
    let audio = backend
        .synthesize("Hello there.", "nova", AudioFormat::Opus)
        .await
        .expect("synthesis should succeed");
    assert_eq!(audio.len(), 32);
}

#[tokio::test]
async fn test_whisper_transcription() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "text": "Hello world",
            "language": "en",
            "duration": 1.5,
            "segments": [{"start": 0.0, "end": 1.5, "text": "Hello world"}],
            "words": [
                {"word": "Hello", "start": 0.0, "end": 0.5},
                {"word": "world", "start": 0.6, "end": 1.5}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = WhisperBackend::new(WhisperConfig {
        base_url: mock_server.uri(),
        model: "whisper-1".to_string(),
        timeout_secs: 5,
    });
    let output = backend
        .transcribe(vec![0u8; 64], "clip", "audio/mpeg", Some("en"))
        .await
        .expect("transcription should succeed");
    assert_eq!(output.text, "Hello world");
    assert_eq!(output.words.len(), 2);
    assert_eq!(output.language_detected.as_deref(), Some("en"));
}

#[tokio::test]
async fn test_whisper_timeout_is_retryable_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"text": "late"}))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let backend = WhisperBackend::new(WhisperConfig {
        base_url: mock_server.uri(),
        model: "whisper-1".to_string(),
        timeout_secs: 1,
    });
    let err = backend
        .transcribe(vec![0u8; 8], "clip.wav", "audio/wav", None)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().starts_with("whisper error: request timed out"));
}
