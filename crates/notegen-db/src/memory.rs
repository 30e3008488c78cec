//! In-memory implementation of every persistence collaborator.
//!
//! Used by pipeline and API tests, and by local runs without PostgreSQL.
//! Mutations happen under a single lock, so readers never observe a
//! half-updated status/result/error triple.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use notegen_core::{
    AudioBlob, AudioStore, Error, GenerationJob, JobKind, JobRepository, JobStatus, Note,
    NoteSource, Result, Tag, TagRepository,
};

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, GenerationJob>,
    notes: HashMap<Uuid, Note>,
    tags: Vec<Tag>,
    audio: HashMap<Uuid, AudioBlob>,
}

/// Shared in-memory store. Clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Internal("in-memory store lock poisoned".into()))
    }

    /// Seed a note; returns its ID.
    pub fn add_note(&self, owner_id: Uuid, title: Option<&str>, content: &str) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.lock()?.notes.insert(
            id,
            Note {
                id,
                owner_id,
                title: title.map(str::to_string),
                content: content.to_string(),
            },
        );
        Ok(id)
    }

    /// Seed a tag; returns its ID.
    pub fn add_tag(&self, owner_id: Uuid, name: &str) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.lock()?.tags.push(Tag {
            id,
            owner_id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Snapshot of every stored job, oldest first.
    pub fn jobs(&self) -> Result<Vec<GenerationJob>> {
        let mut jobs: Vec<_> = self.lock()?.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    /// Number of stored audio blobs.
    pub fn audio_count(&self) -> Result<usize> {
        Ok(self.lock()?.audio.len())
    }
}

#[async_trait]
impl JobRepository for InMemoryStore {
    async fn insert(&self, job: &GenerationJob) -> Result<()> {
        let mut state = self.lock()?;
        if state.jobs.contains_key(&job.id) {
            return Err(Error::InvalidInput(format!("job {} already exists", job.id)));
        }
        state.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<GenerationJob>> {
        Ok(self.lock()?.jobs.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: JobStatus,
        next: JobStatus,
    ) -> Result<bool> {
        let mut state = self.lock()?;
        match state.jobs.get_mut(&id) {
            Some(job) if job.status == expected => {
                job.status = next;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn save(&self, job: &GenerationJob) -> Result<()> {
        let mut state = self.lock()?;
        let stored = state.jobs.get_mut(&job.id).ok_or(Error::JobNotFound(job.id))?;
        // Terminal rows are never rewritten.
        if stored.status.is_terminal() {
            return Err(Error::InvalidTransition {
                job_id: job.id,
                from: stored.status,
                to: job.status,
            });
        }
        stored.status = job.status;
        stored.intermediate = job.intermediate.clone();
        stored.result = job.result.clone();
        stored.error_message = job.error_message.clone();
        stored.updated_at = job.updated_at;
        Ok(())
    }

    async fn list_for_owner(&self, owner_id: Uuid, limit: i64) -> Result<Vec<GenerationJob>> {
        let state = self.lock()?;
        let mut jobs: Vec<_> = state
            .jobs
            .values()
            .filter(|j| j.owner_id == owner_id)
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn list_in_statuses(
        &self,
        kind: JobKind,
        statuses: &[JobStatus],
    ) -> Result<Vec<GenerationJob>> {
        let state = self.lock()?;
        let mut jobs: Vec<_> = state
            .jobs
            .values()
            .filter(|j| j.kind == kind && statuses.contains(&j.status))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

#[async_trait]
impl NoteSource for InMemoryStore {
    async fn get_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<Option<Note>> {
        Ok(self
            .lock()?
            .notes
            .get(&note_id)
            .filter(|n| n.owner_id == owner_id)
            .cloned())
    }
}

#[async_trait]
impl AudioStore for InMemoryStore {
    async fn load_audio(&self, owner_id: Uuid, audio_id: Uuid) -> Result<Option<AudioBlob>> {
        Ok(self
            .lock()?
            .audio
            .get(&audio_id)
            .filter(|a| a.owner_id == owner_id)
            .cloned())
    }

    async fn store_audio(
        &self,
        owner_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.lock()?.audio.insert(
            id,
            AudioBlob {
                id,
                owner_id,
                filename: filename.to_string(),
                content_type: content_type.to_string(),
                data,
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl TagRepository for InMemoryStore {
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<Tag>> {
        Ok(self
            .lock()?
            .tags
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notegen_core::{JobConfig, NarrationConfig, TranscriptionConfig};

    fn narration_job(owner: Uuid) -> GenerationJob {
        GenerationJob::new(owner, Uuid::new_v4(), JobConfig::Narration(NarrationConfig::default()))
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = InMemoryStore::new();
        let job = narration_job(Uuid::new_v4());
        store.insert(&job).await.unwrap();

        let loaded = store.load(job.id).await.unwrap();
        assert_eq!(loaded, job);
    }

    #[tokio::test]
    async fn test_load_missing_is_job_not_found() {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.load(id).await, Err(Error::JobNotFound(got)) if got == id));
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = InMemoryStore::new();
        let job = narration_job(Uuid::new_v4());
        store.insert(&job).await.unwrap();
        assert!(store.insert(&job).await.is_err());
    }

    #[tokio::test]
    async fn test_compare_and_set_only_once() {
        let store = InMemoryStore::new();
        let job = narration_job(Uuid::new_v4());
        store.insert(&job).await.unwrap();

        let first = store
            .compare_and_set_status(job.id, JobStatus::WaitingForScript, JobStatus::ProcessingScript)
            .await
            .unwrap();
        let second = store
            .compare_and_set_status(job.id, JobStatus::WaitingForScript, JobStatus::ProcessingScript)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);
        assert_eq!(store.load(job.id).await.unwrap().status, JobStatus::ProcessingScript);
    }

    #[tokio::test]
    async fn test_compare_and_set_missing_job() {
        let store = InMemoryStore::new();
        let swapped = store
            .compare_and_set_status(Uuid::new_v4(), JobStatus::Pending, JobStatus::Processing)
            .await
            .unwrap();
        assert!(!swapped);
    }

    #[tokio::test]
    async fn test_save_rejects_terminal_rewrite() {
        let store = InMemoryStore::new();
        let mut job = narration_job(Uuid::new_v4());
        store.insert(&job).await.unwrap();

        job.begin_stage().unwrap();
        job.fail("boom").unwrap();
        store.save(&job).await.unwrap();

        let err = store.save(&job).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_list_in_statuses_filters_kind() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let narration = narration_job(owner);
        let transcription = GenerationJob::new(
            owner,
            Uuid::new_v4(),
            JobConfig::Transcription(TranscriptionConfig::default()),
        );
        store.insert(&narration).await.unwrap();
        store.insert(&transcription).await.unwrap();

        let waiting = store
            .list_in_statuses(JobKind::Narration, &JobKind::Narration.waiting_statuses())
            .await
            .unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, narration.id);
    }

    #[tokio::test]
    async fn test_list_for_owner_respects_limit() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        for _ in 0..3 {
            store.insert(&narration_job(owner)).await.unwrap();
        }
        store.insert(&narration_job(Uuid::new_v4())).await.unwrap();

        assert_eq!(JobRepository::list_for_owner(&store, owner, 10).await.unwrap().len(), 3);
        assert_eq!(JobRepository::list_for_owner(&store, owner, 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_notes_are_owner_scoped() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let id = store.add_note(owner, Some("T"), "content").unwrap();

        assert!(store.get_note(owner, id).await.unwrap().is_some());
        assert!(store.get_note(Uuid::new_v4(), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_audio_round_trip() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let id = store
            .store_audio(owner, "a.mp3", "audio/mpeg", vec![1, 2, 3])
            .await
            .unwrap();
        let blob = store.load_audio(owner, id).await.unwrap().unwrap();
        assert_eq!(blob.data, vec![1, 2, 3]);
        assert!(store.load_audio(Uuid::new_v4(), id).await.unwrap().is_none());
        assert_eq!(store.audio_count().unwrap(), 1);
    }
}
