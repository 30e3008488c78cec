//! Collaborators shared by the pipeline stages and the job service.

use std::sync::Arc;

use notegen_core::{
    AudioStore, GenerationBackend, JobRepository, NoteSource, SpeechBackend, TagRepository,
    TranscriptionBackend,
};
use notegen_db::{
    Database, InMemoryStore, PgAudioRepository, PgJobRepository, PgNoteRepository,
    PgTagRepository,
};

/// Persistence and inference collaborators, behind trait objects.
#[derive(Clone)]
pub struct Collaborators {
    pub jobs: Arc<dyn JobRepository>,
    pub notes: Arc<dyn NoteSource>,
    pub tags: Arc<dyn TagRepository>,
    pub audio: Arc<dyn AudioStore>,
    pub generation: Arc<dyn GenerationBackend>,
    pub speech: Arc<dyn SpeechBackend>,
    /// Absent when no transcription service is configured.
    pub transcription: Option<Arc<dyn TranscriptionBackend>>,
}

impl Collaborators {
    /// PostgreSQL-backed persistence with the given inference backends.
    pub fn from_database(
        db: &Database,
        generation: Arc<dyn GenerationBackend>,
        speech: Arc<dyn SpeechBackend>,
        transcription: Option<Arc<dyn TranscriptionBackend>>,
    ) -> Self {
        Self {
            jobs: Arc::new(PgJobRepository::new(db.pool.clone())),
            notes: Arc::new(PgNoteRepository::new(db.pool.clone())),
            tags: Arc::new(PgTagRepository::new(db.pool.clone())),
            audio: Arc::new(PgAudioRepository::new(db.pool.clone())),
            generation,
            speech,
            transcription,
        }
    }

    /// In-memory persistence with the given inference backends.
    pub fn in_memory(
        store: &InMemoryStore,
        generation: Arc<dyn GenerationBackend>,
        speech: Arc<dyn SpeechBackend>,
        transcription: Option<Arc<dyn TranscriptionBackend>>,
    ) -> Self {
        Self {
            jobs: Arc::new(store.clone()),
            notes: Arc::new(store.clone()),
            tags: Arc::new(store.clone()),
            audio: Arc::new(store.clone()),
            generation,
            speech,
            transcription,
        }
    }
}
