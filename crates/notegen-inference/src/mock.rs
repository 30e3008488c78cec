//! Scripted mock backends for deterministic testing.
//!
//! Each mock replays a queue of scripted replies (successes or provider
//! failures) in order, then falls back to a default reply. Every call is
//! recorded so tests can assert on attempt counts.
//!
//! ## Usage
//!
//! ```rust
//! use notegen_inference::mock::MockSpeechBackend;
//!
//! let speech = MockSpeechBackend::new()
//!     .with_failure("service unavailable", true)
//!     .with_failure("service unavailable", true)
//!     .with_audio(vec![0u8; 16]);
//! assert_eq!(speech.call_count(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use notegen_core::{
    AudioFormat, Error, GenerationBackend, Result, SpeechBackend, TranscriptionBackend,
    TranscriptionOutput,
};

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum MockReply<T> {
    Ok(T),
    Fail { message: String, retryable: bool },
}

/// A recorded call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

struct Script<T> {
    queue: VecDeque<MockReply<T>>,
    fallback: Option<MockReply<T>>,
}

/// Shared scripting core for the mock backends.
struct Scripted<T> {
    provider: &'static str,
    script: Arc<Mutex<Script<T>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    latency: Duration,
}

impl<T> Clone for Scripted<T> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider,
            script: self.script.clone(),
            calls: self.calls.clone(),
            latency: self.latency,
        }
    }
}

fn lock<U>(m: &Mutex<U>) -> MutexGuard<'_, U> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Clone + Send> Scripted<T> {
    fn new(provider: &'static str) -> Self {
        Self {
            provider,
            script: Arc::new(Mutex::new(Script {
                queue: VecDeque::new(),
                fallback: None,
            })),
            calls: Arc::new(Mutex::new(Vec::new())),
            latency: Duration::ZERO,
        }
    }

    fn push(&self, reply: MockReply<T>) {
        lock(&self.script).queue.push_back(reply);
    }

    fn set_fallback(&self, reply: MockReply<T>) {
        lock(&self.script).fallback = Some(reply);
    }

    async fn next(&self, operation: &str, input: String) -> Result<T> {
        lock(&self.calls).push(MockCall {
            operation: operation.to_string(),
            input,
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let reply = {
            let mut script = lock(&self.script);
            script.queue.pop_front().or_else(|| script.fallback.clone())
        };
        match reply {
            Some(MockReply::Ok(value)) => Ok(value),
            Some(MockReply::Fail { message, retryable }) => {
                Err(Error::provider(self.provider, message, retryable))
            }
            None => Err(Error::provider(self.provider, "no scripted reply", false)),
        }
    }

    fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

// =============================================================================
// GENERATION
// =============================================================================

/// Mock JSON generation backend.
#[derive(Clone)]
pub struct MockGenerationBackend {
    inner: Scripted<String>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self {
            inner: Scripted::new("mock-llm"),
        }
    }

    /// Queue a raw reply.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        self.inner.push(MockReply::Ok(reply.into()));
        self
    }

    /// Queue a provider failure.
    pub fn with_failure(self, message: impl Into<String>, retryable: bool) -> Self {
        self.inner.push(MockReply::Fail {
            message: message.into(),
            retryable,
        });
        self
    }

    /// Reply returned once the queue is exhausted.
    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        self.inner.set_fallback(MockReply::Ok(reply.into()));
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.inner.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.calls()
    }

    pub fn call_count(&self) -> usize {
        self.inner.call_count()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate_json(
        &self,
        system: &str,
        user: &str,
        _schema: &serde_json::Value,
    ) -> Result<String> {
        self.inner
            .next("generate_json", format!("{}\n---\n{}", system, user))
            .await
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}

// =============================================================================
// SPEECH
// =============================================================================

/// Mock speech synthesis backend.
#[derive(Clone)]
pub struct MockSpeechBackend {
    inner: Scripted<Vec<u8>>,
}

impl Default for MockSpeechBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpeechBackend {
    pub fn new() -> Self {
        Self {
            inner: Scripted::new("mock-tts"),
        }
    }

    /// Queue synthesized audio.
    pub fn with_audio(self, audio: Vec<u8>) -> Self {
        self.inner.push(MockReply::Ok(audio));
        self
    }

    /// Queue a provider failure.
    pub fn with_failure(self, message: impl Into<String>, retryable: bool) -> Self {
        self.inner.push(MockReply::Fail {
            message: message.into(),
            retryable,
        });
        self
    }

    /// Audio returned once the queue is exhausted.
    pub fn with_default_audio(self, audio: Vec<u8>) -> Self {
        self.inner.set_fallback(MockReply::Ok(audio));
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.calls()
    }

    pub fn call_count(&self) -> usize {
        self.inner.call_count()
    }
}

#[async_trait]
impl SpeechBackend for MockSpeechBackend {
    async fn synthesize(&self, text: &str, voice: &str, format: AudioFormat) -> Result<Vec<u8>> {
        self.inner
            .next(
                "synthesize",
                format!("{}|{}|{}", voice, format.as_str(), text),
            )
            .await
    }

    fn model_name(&self) -> &str {
        "mock-tts"
    }
}

// =============================================================================
// TRANSCRIPTION
// =============================================================================

/// Mock transcription backend.
#[derive(Clone)]
pub struct MockTranscriptionBackend {
    inner: Scripted<TranscriptionOutput>,
}

impl Default for MockTranscriptionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscriptionBackend {
    pub fn new() -> Self {
        Self {
            inner: Scripted::new("mock-whisper"),
        }
    }

    /// Queue a transcript.
    pub fn with_transcript(self, output: TranscriptionOutput) -> Self {
        self.inner.push(MockReply::Ok(output));
        self
    }

    /// Queue a plain-text transcript without timestamps.
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_transcript(TranscriptionOutput {
            text: text.into(),
            language_detected: Some("en".to_string()),
            duration_secs: None,
            segments: vec![],
            words: vec![],
        })
    }

    /// Queue a provider failure.
    pub fn with_failure(self, message: impl Into<String>, retryable: bool) -> Self {
        self.inner.push(MockReply::Fail {
            message: message.into(),
            retryable,
        });
        self
    }

    /// Failure returned once the queue is exhausted.
    pub fn with_default_failure(self, message: impl Into<String>, retryable: bool) -> Self {
        self.inner.set_fallback(MockReply::Fail {
            message: message.into(),
            retryable,
        });
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.inner.calls()
    }

    pub fn call_count(&self) -> usize {
        self.inner.call_count()
    }
}

#[async_trait]
impl TranscriptionBackend for MockTranscriptionBackend {
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        content_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionOutput> {
        self.inner
            .next(
                "transcribe",
                format!(
                    "{}|{}|{}|{}",
                    filename,
                    content_type,
                    audio.len(),
                    language.unwrap_or("auto")
                ),
            )
            .await
    }

    fn model_name(&self) -> &str {
        "mock-whisper"
    }
}
