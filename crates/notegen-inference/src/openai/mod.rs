//! OpenAI-compatible inference backend.
//!
//! Works with any OpenAI-compatible endpoint (OpenAI cloud, vLLM, LocalAI,
//! Ollama in compatibility mode) for chat completions in JSON mode and for
//! speech synthesis via `/audio/speech`.
//!
//! # Example
//!
//! ```rust,no_run
//! use notegen_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use notegen_core::GenerationBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OpenAIBackend::new(OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         ..Default::default()
//!     })
//!     .unwrap();
//!
//!     let schema = serde_json::json!({"title": "quiz", "type": "object"});
//!     let raw = backend.generate_json("You write quizzes.", "Note text", &schema).await;
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig, PROVIDER};
pub use error::{request_error, to_provider_error, OpenAIErrorCode};
pub use types::*;
