//! Core traits for notegen abstractions.
//!
//! These traits define the collaborator interfaces the pipeline depends on,
//! enabling pluggable persistence and inference backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::*;

// =============================================================================
// PERSISTENCE TRAITS
// =============================================================================

/// Repository for generation jobs.
///
/// Implementations provide read-your-writes consistency for the worker that
/// just wrote a job.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a newly created job.
    async fn insert(&self, job: &GenerationJob) -> Result<()>;

    /// Get a job by ID.
    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>>;

    /// Get a job by ID, failing with `JobNotFound` when absent.
    async fn load(&self, id: Uuid) -> Result<GenerationJob> {
        self.get(id).await?.ok_or(Error::JobNotFound(id))
    }

    /// Atomically move a job from `expected` to `next`.
    ///
    /// Returns `false` when the job is not currently in `expected`.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool>;

    /// Persist status, intermediate artifact, result, and error together.
    async fn save(&self, job: &GenerationJob) -> Result<()>;

    /// List an owner's jobs, newest first.
    async fn list_for_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<GenerationJob>>;

    /// List jobs of `kind` currently in any of `statuses`, oldest first.
    async fn list_in_statuses(
        &self,
        kind: JobKind,
        statuses: &[JobStatus],
    ) -> Result<Vec<GenerationJob>>;
}

/// Read access to source notes.
#[async_trait]
pub trait NoteSource: Send + Sync {
    /// Fetch a note owned by `owner_id`.
    async fn get_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<Option<Note>>;
}

/// Storage for uploaded and synthesized audio.
#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Fetch an audio blob owned by `owner_id`.
    async fn load_audio(&self, owner_id: Uuid, audio_id: Uuid) -> Result<Option<AudioBlob>>;

    /// Store an audio blob, returning its ID.
    async fn store_audio(
        &self,
        owner_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Uuid>;
}

/// Owner tag lookup, used to resolve proposed tag names into tag IDs.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// List all tags owned by `owner_id`.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Tag>>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for structured JSON generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a reply for `user` under `system`, steering the model toward
    /// `schema`. Returns the raw reply text; it is not guaranteed to be JSON.
    async fn generate_json(
        &self,
        system: &str,
        user: &str,
        schema: &serde_json::Value,
    ) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text-to-speech synthesis.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Synthesize `text` with `voice`, returning encoded audio bytes.
    async fn synthesize(&self, text: &str, voice: &str, format: AudioFormat) -> Result<Vec<u8>>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for audio transcription.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe audio bytes.
    ///
    /// `language` is an optional ISO 639-1 hint; the backend auto-detects
    /// when it is absent.
    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        content_type: &str,
        language: Option<&str>,
    ) -> Result<TranscriptionOutput>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
