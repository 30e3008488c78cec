//! Generic job orchestrator.
//!
//! One [`Pipeline`] serves every job kind: it looks up the stage list for
//! the job's kind and drives the job through the [`StageExecutor`] until it
//! reaches a terminal status, fails, or is claimed elsewhere. Stage order
//! follows `JobKind::stages()`, so the state machine and the stage list
//! cannot drift apart.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{error, info, instrument};
use uuid::Uuid;

use notegen_core::{
    defaults, Error, GenerationJob, JobConfig, JobKind, JobOutput, JobRepository, JobStatus,
    NarrationSource, Result,
};

use crate::context::Collaborators;
use crate::dispatcher::JobEvent;
use crate::narration::{NarrationScriptStage, NarrationSpeechStage};
use crate::quiz::QuizStage;
use crate::retry::RetryInvoker;
use crate::stage::{Stage, StageExecutor, StageOutcome};
use crate::transcription::TranscriptionStage;

/// Event emitted while jobs move through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// A worker picked up a job.
    JobStarted { job_id: Uuid, kind: JobKind },
    /// A stage finished and the job advanced to `status`.
    StageCompleted {
        job_id: Uuid,
        kind: JobKind,
        stage: &'static str,
        status: JobStatus,
    },
    /// The job reached PROCESSED.
    JobCompleted { job_id: Uuid, kind: JobKind },
    /// The job reached FAILED.
    JobFailed {
        job_id: Uuid,
        kind: JobKind,
        error: String,
        class: &'static str,
    },
    /// The event was stale or a duplicate; nothing ran.
    JobSkipped {
        job_id: Uuid,
        kind: JobKind,
        reason: &'static str,
    },
    /// A finished job created a downstream job.
    FollowUpCreated {
        parent_id: Uuid,
        job_id: Uuid,
        kind: JobKind,
    },
    /// A worker pool started.
    WorkerStarted { kind: JobKind, workers: usize },
    /// A worker pool stopped.
    WorkerStopped { kind: JobKind },
}

/// Where a pipeline run left the job.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub job_id: Uuid,
    /// Status after the run; unchanged when the run was skipped.
    pub status: JobStatus,
    /// Downstream jobs to dispatch once this run returns.
    pub follow_ups: Vec<JobEvent>,
}

/// Runs jobs of every kind through their stages.
pub struct Pipeline {
    executor: StageExecutor,
    jobs: Arc<dyn JobRepository>,
    quiz: Vec<Arc<dyn Stage>>,
    narration: Vec<Arc<dyn Stage>>,
    transcription: Vec<Arc<dyn Stage>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl Pipeline {
    /// Build the standard stage lists over `collaborators`.
    pub fn new(collaborators: &Collaborators, retry: RetryInvoker) -> Self {
        let c = collaborators;
        let quiz: Vec<Arc<dyn Stage>> = vec![Arc::new(QuizStage::new(
            c.notes.clone(),
            c.tags.clone(),
            c.generation.clone(),
        ))];
        let narration: Vec<Arc<dyn Stage>> = vec![
            Arc::new(NarrationScriptStage::new(
                c.jobs.clone(),
                c.notes.clone(),
                c.tags.clone(),
                c.generation.clone(),
            )),
            Arc::new(NarrationSpeechStage::new(c.audio.clone(), c.speech.clone())),
        ];
        let transcription: Vec<Arc<dyn Stage>> = vec![Arc::new(TranscriptionStage::new(
            c.audio.clone(),
            c.transcription.clone(),
        ))];

        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            executor: StageExecutor::new(c.jobs.clone(), retry),
            jobs: c.jobs.clone(),
            quiz,
            narration,
            transcription,
            event_tx,
        }
    }

    /// Replace the stage list of `kind`.
    ///
    /// The list must line up with `kind.stages()`; a mismatching stage makes
    /// the executor reject the job with an internal error.
    pub fn with_stages(mut self, kind: JobKind, stages: Vec<Arc<dyn Stage>>) -> Self {
        match kind {
            JobKind::Quiz => self.quiz = stages,
            JobKind::Narration => self.narration = stages,
            JobKind::Transcription => self.transcription = stages,
        }
        self
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }

    pub(crate) fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }

    fn stages_for(&self, kind: JobKind) -> &[Arc<dyn Stage>] {
        match kind {
            JobKind::Quiz => &self.quiz,
            JobKind::Narration => &self.narration,
            JobKind::Transcription => &self.transcription,
        }
    }

    /// Run every remaining stage of `job_id` in order.
    ///
    /// Stage failures end up on the job row and in the returned status;
    /// `Err` means the job could not be read or written at all.
    #[instrument(skip(self), fields(subsystem = "jobs", component = "pipeline"))]
    pub async fn run(&self, job_id: Uuid) -> Result<PipelineOutcome> {
        let start = Instant::now();
        let job = self.jobs.load(job_id).await?;
        let kind = job.kind;
        let mut status = job.status;

        self.emit(WorkerEvent::JobStarted { job_id, kind });

        loop {
            let Some((index, _)) = notegen_core::state::locate(kind, status) else {
                // Terminal already; the executor reports why.
                break;
            };
            let stage = self.stages_for(kind).get(index).cloned().ok_or_else(|| {
                Error::Internal(format!("no stage {} registered for {} jobs", index, kind))
            })?;

            match self.executor.execute(job_id, stage.as_ref()).await? {
                StageOutcome::Advanced { status: next } => {
                    status = next;
                    self.emit(WorkerEvent::StageCompleted {
                        job_id,
                        kind,
                        stage: stage.name(),
                        status: next,
                    });
                    if next == JobStatus::Processed {
                        info!(
                            subsystem = "jobs",
                            component = "pipeline",
                            job_id = %job_id,
                            job_kind = %kind,
                            duration_ms = start.elapsed().as_millis() as u64,
                            "Job completed successfully"
                        );
                        self.emit(WorkerEvent::JobCompleted { job_id, kind });
                        let follow_ups = self.follow_ups(job_id).await;
                        return Ok(PipelineOutcome {
                            job_id,
                            status,
                            follow_ups,
                        });
                    }
                }
                StageOutcome::Failed { error, class } => {
                    self.emit(WorkerEvent::JobFailed {
                        job_id,
                        kind,
                        error,
                        class,
                    });
                    return Ok(PipelineOutcome {
                        job_id,
                        status: JobStatus::Failed,
                        follow_ups: Vec::new(),
                    });
                }
                StageOutcome::Skipped { reason } => {
                    self.emit(WorkerEvent::JobSkipped {
                        job_id,
                        kind,
                        reason,
                    });
                    return Ok(PipelineOutcome {
                        job_id,
                        status,
                        follow_ups: Vec::new(),
                    });
                }
            }
        }

        self.emit(WorkerEvent::JobSkipped {
            job_id,
            kind,
            reason: "terminal",
        });
        Ok(PipelineOutcome {
            job_id,
            status,
            follow_ups: Vec::new(),
        })
    }

    /// Create the downstream jobs of a job that just reached PROCESSED.
    ///
    /// Failures are logged; the parent job stays PROCESSED either way.
    async fn follow_ups(&self, job_id: Uuid) -> Vec<JobEvent> {
        match self.create_follow_ups(job_id).await {
            Ok(events) => events,
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "pipeline",
                    job_id = %job_id,
                    error = %e,
                    "Failed to create downstream job"
                );
                Vec::new()
            }
        }
    }

    async fn create_follow_ups(&self, job_id: Uuid) -> Result<Vec<JobEvent>> {
        let parent = self.jobs.load(job_id).await?;
        let (JobConfig::Transcription(config), Some(JobOutput::Transcription(_))) =
            (&parent.config, &parent.result)
        else {
            return Ok(Vec::new());
        };
        let Some(narration) = &config.narration else {
            return Ok(Vec::new());
        };

        let mut narration = narration.clone();
        narration.source = NarrationSource::Transcription;
        if narration.language.is_none() {
            narration.language = config.language.clone();
        }
        let child = GenerationJob::new(parent.owner_id, parent.id, JobConfig::Narration(narration));
        self.jobs.insert(&child).await?;

        info!(
            subsystem = "jobs",
            component = "pipeline",
            job_id = %child.id,
            parent_id = %parent.id,
            job_kind = %child.kind,
            "Created downstream narration job"
        );
        self.emit(WorkerEvent::FollowUpCreated {
            parent_id: parent.id,
            job_id: child.id,
            kind: child.kind,
        });
        Ok(vec![JobEvent::JobCreated {
            job_id: child.id,
            kind: child.kind,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notegen_core::{QuestionType, QuizConfig, TranscriptionConfig};
    use notegen_db::InMemoryStore;
    use notegen_inference::mock::{
        MockGenerationBackend, MockSpeechBackend, MockTranscriptionBackend,
    };

    fn pipeline(store: &InMemoryStore, generation: MockGenerationBackend) -> Pipeline {
        let collaborators = Collaborators::in_memory(
            store,
            Arc::new(generation),
            Arc::new(MockSpeechBackend::new()),
            Some(Arc::new(MockTranscriptionBackend::new())),
        );
        Pipeline::new(&collaborators, RetryInvoker::default())
    }

    #[tokio::test]
    async fn test_run_quiz_to_processed() {
        let store = InMemoryStore::new();
        let owner = Uuid::new_v4();
        let note = store
            .add_note(owner, Some("Cells"), "Mitochondria produce ATP.")
            .unwrap();
        let reply = r#"{"questions":[{"id":"q1","type":"FLASHCARD","question":"What produces ATP?","answer":"Mitochondria"}]}"#;
        let pipeline = pipeline(&store, MockGenerationBackend::new().with_reply(reply));

        let job = GenerationJob::new(
            owner,
            note,
            JobConfig::Quiz(QuizConfig {
                question_count: 1,
                question_type: QuestionType::Flashcard,
                difficulty: Default::default(),
                language: None,
            }),
        );
        store.insert(&job).await.unwrap();

        let mut events = pipeline.events();
        let outcome = pipeline.run(job.id).await.unwrap();
        assert_eq!(outcome.status, JobStatus::Processed);
        assert!(outcome.follow_ups.is_empty());

        assert_eq!(
            events.recv().await.unwrap(),
            WorkerEvent::JobStarted {
                job_id: job.id,
                kind: JobKind::Quiz
            }
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            WorkerEvent::StageCompleted { stage: "quiz", .. }
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            WorkerEvent::JobCompleted { .. }
        ));
    }

    #[tokio::test]
    async fn test_run_terminal_job_is_skipped() {
        let store = InMemoryStore::new();
        let pipeline = pipeline(&store, MockGenerationBackend::new());
        let mut job = GenerationJob::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            JobConfig::Transcription(TranscriptionConfig::default()),
        );
        job.fail("gone").unwrap();
        store.insert(&job).await.unwrap();

        let outcome = pipeline.run(job.id).await.unwrap();
        assert_eq!(outcome.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_unknown_job_errors() {
        let store = InMemoryStore::new();
        let pipeline = pipeline(&store, MockGenerationBackend::new());
        assert!(matches!(
            pipeline.run(Uuid::new_v4()).await,
            Err(Error::JobNotFound(_))
        ));
    }
}
