//! # notegen-jobs
//!
//! Asynchronous AI generation pipeline for notegen.
//!
//! This crate provides:
//! - Response cleaning and lenient, content-aware validation of model replies
//! - Bounded retry of external calls with observable retry events
//! - A stage executor that claims, runs, and records one stage atomically
//! - Quiz, narration, and transcription stages driven by one orchestrator
//! - Per-family worker pools fed by a fire-and-forget event dispatcher
//! - The synchronous "create job" service
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use notegen_jobs::{Collaborators, JobService, JobWorker, Pipeline, PipelineConfig, RetryInvoker};
//!
//! let config = PipelineConfig::from_env();
//! let collaborators = Collaborators::from_database(&db, generation, speech, transcription);
//! let pipeline = Pipeline::new(&collaborators, RetryInvoker::new(config.retry.clone()));
//!
//! let worker = JobWorker::new(pipeline, config);
//! let service = JobService::new(collaborators, worker.dispatcher());
//! let handle = worker.start();
//!
//! service.recover_waiting_jobs().await?;
//! let job = service.create_quiz_job(owner_id, note_id, quiz_config).await?;
//!
//! // Graceful shutdown
//! handle.shutdown().await?;
//! ```

pub mod cleaner;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod narration;
pub mod pipeline;
pub mod prompts;
pub mod quiz;
pub mod retry;
pub mod service;
pub mod stage;
pub mod tags;
pub mod transcription;
pub mod validation;
pub mod wav;
pub mod worker;

// Re-export core types
pub use notegen_core::*;

pub use cleaner::clean_response;
pub use config::PipelineConfig;
pub use context::Collaborators;
pub use dispatcher::{EventDispatcher, JobEvent};
pub use narration::{split_for_speech, NarrationScriptStage, NarrationSpeechStage};
pub use pipeline::{Pipeline, PipelineOutcome, WorkerEvent};
pub use quiz::QuizStage;
pub use retry::{RetryExhausted, RetryInvoker, RetryObserver, RetryPolicy, TracingRetryObserver};
pub use service::JobService;
pub use stage::{Stage, StageError, StageExecutor, StageOutcome};
pub use tags::filter_tags;
pub use transcription::TranscriptionStage;
pub use validation::{
    parse_lenient, validate_response, FailureKind, NarrationValidator, QuizValidator,
    ResponseValidator, ValidationFailure,
};
pub use worker::{JobWorker, WorkerHandle};
