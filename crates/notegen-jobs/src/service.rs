//! Synchronous "create job" entry points and job polling.
//!
//! Creation validates configuration and source ownership, inserts the job
//! in its initial status, and only then dispatches it. Pipeline failures
//! never surface here; callers poll [`JobService::get_job`].

use tracing::{info, warn};
use uuid::Uuid;

use notegen_core::{
    defaults, Error, GenerationJob, JobConfig, JobKind, JobOutput, JobStatus, NarrationConfig,
    NarrationSource, QuizConfig, Result, TranscriptionConfig,
};

use crate::context::Collaborators;
use crate::dispatcher::{EventDispatcher, JobEvent};

/// Creates, looks up, and recovers generation jobs.
#[derive(Clone)]
pub struct JobService {
    collaborators: Collaborators,
    dispatcher: EventDispatcher,
}

impl JobService {
    pub fn new(collaborators: Collaborators, dispatcher: EventDispatcher) -> Self {
        Self {
            collaborators,
            dispatcher,
        }
    }

    /// Create a QUIZ job over one of the owner's notes.
    pub async fn create_quiz_job(
        &self,
        owner_id: Uuid,
        note_id: Uuid,
        config: QuizConfig,
    ) -> Result<GenerationJob> {
        let config = JobConfig::Quiz(config);
        config.validate()?;
        self.require_note(owner_id, note_id).await?;
        self.submit(GenerationJob::new(owner_id, note_id, config))
            .await
    }

    /// Create a NARRATION job.
    ///
    /// `source_id` is a note ID, or the ID of a processed transcription job
    /// when `config.source` is `TRANSCRIPTION`.
    pub async fn create_narration_job(
        &self,
        owner_id: Uuid,
        source_id: Uuid,
        config: NarrationConfig,
    ) -> Result<GenerationJob> {
        let source = config.source;
        let config = JobConfig::Narration(config);
        config.validate()?;
        match source {
            NarrationSource::Note => self.require_note(owner_id, source_id).await?,
            NarrationSource::Transcription => {
                self.require_transcript(owner_id, source_id).await?
            }
        }
        self.submit(GenerationJob::new(owner_id, source_id, config))
            .await
    }

    /// Create a TRANSCRIPTION job over one of the owner's audio uploads.
    pub async fn create_transcription_job(
        &self,
        owner_id: Uuid,
        audio_id: Uuid,
        config: TranscriptionConfig,
    ) -> Result<GenerationJob> {
        if self.collaborators.transcription.is_none() {
            return Err(Error::Config(
                "Transcription service is not configured".to_string(),
            ));
        }
        let config = JobConfig::Transcription(config);
        config.validate()?;
        if self
            .collaborators
            .audio
            .load_audio(owner_id, audio_id)
            .await?
            .is_none()
        {
            return Err(Error::AudioNotFound(audio_id));
        }
        self.submit(GenerationJob::new(owner_id, audio_id, config))
            .await
    }

    /// Fetch one of the owner's jobs. Another owner's job reads as missing.
    pub async fn get_job(&self, owner_id: Uuid, job_id: Uuid) -> Result<GenerationJob> {
        match self.collaborators.jobs.get(job_id).await? {
            Some(job) if job.owner_id == owner_id => Ok(job),
            _ => Err(Error::JobNotFound(job_id)),
        }
    }

    /// The owner's most recent jobs, newest first.
    pub async fn list_jobs(&self, owner_id: Uuid, limit: Option<i64>) -> Result<Vec<GenerationJob>> {
        let limit = limit.unwrap_or(defaults::PAGE_LIMIT).clamp(1, defaults::PAGE_LIMIT);
        self.collaborators.jobs.list_for_owner(owner_id, limit).await
    }

    /// Re-dispatch every job sitting in a waiting status.
    ///
    /// Jobs left in a processing status are not resumed. Returns the number
    /// of events the pools accepted.
    pub async fn recover_waiting_jobs(&self) -> Result<usize> {
        let mut accepted = 0;
        let mut found = 0;
        for kind in JobKind::ALL {
            let waiting = self
                .collaborators
                .jobs
                .list_in_statuses(kind, &kind.waiting_statuses())
                .await?;
            found += waiting.len();
            for job in waiting {
                if self.dispatcher.dispatch(JobEvent::StageReady {
                    job_id: job.id,
                    kind: job.kind,
                }) {
                    accepted += 1;
                }
            }
        }
        if found > accepted {
            warn!(
                subsystem = "jobs",
                component = "service",
                found,
                accepted,
                "Some waiting jobs could not be re-dispatched"
            );
        }
        info!(
            subsystem = "jobs",
            component = "service",
            recovered = accepted,
            "Recovered waiting jobs"
        );
        Ok(accepted)
    }

    async fn submit(&self, job: GenerationJob) -> Result<GenerationJob> {
        self.collaborators.jobs.insert(&job).await?;
        info!(
            subsystem = "jobs",
            component = "service",
            job_id = %job.id,
            job_kind = %job.kind,
            owner_id = %job.owner_id,
            "Job created"
        );
        // Dispatch only after the insert has committed.
        self.dispatcher.dispatch(JobEvent::JobCreated {
            job_id: job.id,
            kind: job.kind,
        });
        Ok(job)
    }

    async fn require_note(&self, owner_id: Uuid, note_id: Uuid) -> Result<()> {
        let note = self
            .collaborators
            .notes
            .get_note(owner_id, note_id)
            .await?
            .ok_or(Error::NoteNotFound(note_id))?;
        if note.content.trim().is_empty() {
            return Err(Error::InvalidInput(format!("Note {} has no content", note_id)));
        }
        Ok(())
    }

    async fn require_transcript(&self, owner_id: Uuid, job_id: Uuid) -> Result<()> {
        let job = self.get_job(owner_id, job_id).await?;
        match (job.kind, job.status, &job.result) {
            (JobKind::Transcription, JobStatus::Processed, Some(JobOutput::Transcription(_))) => {
                Ok(())
            }
            (JobKind::Transcription, status, _) => Err(Error::InvalidInput(format!(
                "Transcription {} is not processed (status {})",
                job_id, status
            ))),
            (kind, _, _) => Err(Error::InvalidInput(format!(
                "Job {} is a {} job, not a transcription",
                job_id, kind
            ))),
        }
    }
}
