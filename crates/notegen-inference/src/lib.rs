//! # notegen-inference
//!
//! External AI service clients for notegen.
//!
//! - [`openai::OpenAIBackend`]: chat completions in JSON mode and speech
//!   synthesis against any OpenAI-compatible endpoint
//! - [`transcription::WhisperBackend`]: Whisper-compatible transcription
//! - [`mock`]: scripted backends for tests (`mock` feature)
//!
//! Every failure surfaces as `Error::Provider` with a retryable flag, so the
//! pipeline's retry invoker can tell transient failures from permanent ones.

pub mod openai;
pub mod transcription;

#[cfg(feature = "mock")]
pub mod mock;

pub use openai::{OpenAIBackend, OpenAIConfig};
pub use transcription::{WhisperBackend, WhisperConfig};
