//! Parametric job state machine.
//!
//! Every job kind is described by an ordered list of [`StageDescriptor`]s.
//! A stage owns one waiting status and one processing status; the legal
//! transitions for any kind are derived from that list:
//!
//! - `waiting(i) -> processing(i)`
//! - `processing(i) -> waiting(i + 1)`, or `PROCESSED` after the last stage
//! - any non-terminal status `-> FAILED`
//!
//! `PROCESSED` and `FAILED` are terminal.

use chrono::Utc;

use crate::error::{Error, Result};
use crate::models::{
    ErrorMessage, GenerationJob, JobKind, JobOutput, JobStatus, NarrationScript, StageArtifact,
};

/// One stage of a job kind's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageDescriptor {
    /// Stable stage name used in logs and worker events.
    pub name: &'static str,
    /// Status a job sits in while the stage is queued.
    pub waiting: JobStatus,
    /// Status a job holds while a worker runs the stage.
    pub processing: JobStatus,
}

const QUIZ_STAGES: &[StageDescriptor] = &[StageDescriptor {
    name: "quiz",
    waiting: JobStatus::Pending,
    processing: JobStatus::Processing,
}];

const TRANSCRIPTION_STAGES: &[StageDescriptor] = &[StageDescriptor {
    name: "transcription",
    waiting: JobStatus::Pending,
    processing: JobStatus::Processing,
}];

const NARRATION_STAGES: &[StageDescriptor] = &[
    StageDescriptor {
        name: "script",
        waiting: JobStatus::WaitingForScript,
        processing: JobStatus::ProcessingScript,
    },
    StageDescriptor {
        name: "speech",
        waiting: JobStatus::WaitingForSpeech,
        processing: JobStatus::ProcessingSpeech,
    },
];

impl JobKind {
    /// Ordered stage sequence for this kind.
    pub fn stages(&self) -> &'static [StageDescriptor] {
        match self {
            JobKind::Quiz => QUIZ_STAGES,
            JobKind::Narration => NARRATION_STAGES,
            JobKind::Transcription => TRANSCRIPTION_STAGES,
        }
    }

    /// Every waiting status of this kind, in stage order.
    pub fn waiting_statuses(&self) -> Vec<JobStatus> {
        self.stages().iter().map(|s| s.waiting).collect()
    }
}

/// Status a freshly created job of `kind` starts in.
pub fn initial_status(kind: JobKind) -> JobStatus {
    kind.stages()[0].waiting
}

/// Position of `status` within `kind`'s stages: `(stage index, is_processing)`.
pub fn locate(kind: JobKind, status: JobStatus) -> Option<(usize, bool)> {
    kind.stages().iter().enumerate().find_map(|(i, stage)| {
        if stage.waiting == status {
            Some((i, false))
        } else if stage.processing == status {
            Some((i, true))
        } else {
            None
        }
    })
}

/// Status reached once stage `index` of `kind` completes successfully.
pub fn status_after(kind: JobKind, index: usize) -> JobStatus {
    kind.stages()
        .get(index + 1)
        .map(|next| next.waiting)
        .unwrap_or(JobStatus::Processed)
}

/// Whether `from -> to` is a legal transition for `kind`.
pub fn is_valid_transition(kind: JobKind, from: JobStatus, to: JobStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    if to == JobStatus::Failed {
        return true;
    }
    match locate(kind, from) {
        Some((i, false)) => kind.stages()[i].processing == to,
        Some((i, true)) => status_after(kind, i) == to,
        None => false,
    }
}

/// Output of a successfully completed stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    /// Handed to the next stage through `GenerationJob::intermediate`.
    Intermediate(StageArtifact),
    /// Written as the job result by the final stage.
    Final(JobOutput),
}

impl GenerationJob {
    fn transition(&mut self, to: JobStatus) -> Result<()> {
        if !is_valid_transition(self.kind, self.status, to) {
            return Err(Error::InvalidTransition {
                job_id: self.id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Stage the job is waiting for or currently running, if any.
    pub fn current_stage(&self) -> Option<(usize, &'static StageDescriptor)> {
        locate(self.kind, self.status).map(|(i, _)| (i, &self.kind.stages()[i]))
    }

    /// Whether the job sits in one of its kind's waiting statuses.
    pub fn is_waiting(&self) -> bool {
        matches!(locate(self.kind, self.status), Some((_, false)))
    }

    /// Narration script produced by the script stage, if present.
    pub fn script(&self) -> Option<&NarrationScript> {
        match &self.intermediate {
            Some(StageArtifact::Script(script)) => Some(script),
            None => None,
        }
    }

    /// Move from a stage's waiting status to its processing status.
    ///
    /// Any stage after the first requires the previous stage's artifact.
    pub fn begin_stage(&mut self) -> Result<&'static StageDescriptor> {
        let (index, stage) = match locate(self.kind, self.status) {
            Some((i, false)) => (i, &self.kind.stages()[i]),
            _ => {
                return Err(Error::InvalidTransition {
                    job_id: self.id,
                    from: self.status,
                    to: JobStatus::Processing,
                })
            }
        };
        if index > 0 && self.intermediate.is_none() {
            return Err(Error::Internal(format!(
                "job {} entering stage '{}' without the previous stage's output",
                self.id, stage.name
            )));
        }
        self.transition(stage.processing)?;
        Ok(stage)
    }

    /// Record a successful stage and advance the status.
    ///
    /// A non-final stage must yield an intermediate artifact; the final stage
    /// must yield a result of the job's own kind.
    pub fn complete_stage(&mut self, output: StageOutput) -> Result<JobStatus> {
        let index = match locate(self.kind, self.status) {
            Some((i, true)) => i,
            _ => {
                return Err(Error::InvalidTransition {
                    job_id: self.id,
                    from: self.status,
                    to: JobStatus::Processed,
                })
            }
        };
        let next = status_after(self.kind, index);
        match (next, output) {
            (JobStatus::Processed, StageOutput::Final(result)) => {
                if result.kind() != self.kind {
                    return Err(Error::Internal(format!(
                        "{} result written to {} job {}",
                        result.kind(),
                        self.kind,
                        self.id
                    )));
                }
                self.transition(next)?;
                self.result = Some(result);
            }
            (JobStatus::Processed, StageOutput::Intermediate(_)) => {
                return Err(Error::Internal(format!(
                    "final stage of job {} produced an intermediate artifact",
                    self.id
                )));
            }
            (_, StageOutput::Intermediate(artifact)) => {
                self.transition(next)?;
                self.intermediate = Some(artifact);
            }
            (_, StageOutput::Final(_)) => {
                return Err(Error::Internal(format!(
                    "non-final stage of job {} produced a result",
                    self.id
                )));
            }
        }
        Ok(next)
    }

    /// Mark the job FAILED with a capped error message.
    pub fn fail(&mut self, message: impl Into<ErrorMessage>) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        JobConfig, NarrationConfig, NarrationOutput, QuizConfig, QuizOutput, QuestionType,
        TranscriptionConfig, TranscriptionOutput,
    };
    use uuid::Uuid;

    fn quiz_job() -> GenerationJob {
        GenerationJob::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            JobConfig::Quiz(QuizConfig {
                question_count: 2,
                question_type: QuestionType::Flashcard,
                difficulty: Default::default(),
                language: None,
            }),
        )
    }

    fn narration_job() -> GenerationJob {
        GenerationJob::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            JobConfig::Narration(NarrationConfig::default()),
        )
    }

    fn script() -> NarrationScript {
        NarrationScript {
            title: Some("Title".into()),
            transcript: "Words.".into(),
            word_count: 1,
            sentence_count: 1,
            estimated_duration: "1 min".into(),
            tag_ids: vec![],
        }
    }

    fn quiz_output() -> JobOutput {
        JobOutput::Quiz(QuizOutput {
            questions: vec![],
            tag_ids: vec![],
        })
    }

    #[test]
    fn test_initial_statuses() {
        assert_eq!(initial_status(JobKind::Quiz), JobStatus::Pending);
        assert_eq!(initial_status(JobKind::Transcription), JobStatus::Pending);
        assert_eq!(initial_status(JobKind::Narration), JobStatus::WaitingForScript);
    }

    #[test]
    fn test_narration_transitions() {
        let k = JobKind::Narration;
        assert!(is_valid_transition(k, JobStatus::WaitingForScript, JobStatus::ProcessingScript));
        assert!(is_valid_transition(k, JobStatus::ProcessingScript, JobStatus::WaitingForSpeech));
        assert!(is_valid_transition(k, JobStatus::WaitingForSpeech, JobStatus::ProcessingSpeech));
        assert!(is_valid_transition(k, JobStatus::ProcessingSpeech, JobStatus::Processed));
        assert!(!is_valid_transition(k, JobStatus::ProcessingScript, JobStatus::Processed));
        assert!(!is_valid_transition(k, JobStatus::WaitingForSpeech, JobStatus::WaitingForScript));
        assert!(!is_valid_transition(k, JobStatus::Pending, JobStatus::Processing));
    }

    #[test]
    fn test_single_stage_transitions() {
        for k in [JobKind::Quiz, JobKind::Transcription] {
            assert!(is_valid_transition(k, JobStatus::Pending, JobStatus::Processing));
            assert!(is_valid_transition(k, JobStatus::Processing, JobStatus::Processed));
            assert!(!is_valid_transition(k, JobStatus::Pending, JobStatus::Processed));
            assert!(!is_valid_transition(k, JobStatus::Processing, JobStatus::Pending));
        }
    }

    #[test]
    fn test_any_non_terminal_can_fail() {
        for status in [
            JobStatus::WaitingForScript,
            JobStatus::ProcessingScript,
            JobStatus::WaitingForSpeech,
            JobStatus::ProcessingSpeech,
        ] {
            assert!(is_valid_transition(JobKind::Narration, status, JobStatus::Failed));
        }
    }

    #[test]
    fn test_terminal_statuses_admit_nothing() {
        for to in [JobStatus::Processing, JobStatus::Failed, JobStatus::Processed] {
            assert!(!is_valid_transition(JobKind::Quiz, JobStatus::Processed, to));
            assert!(!is_valid_transition(JobKind::Quiz, JobStatus::Failed, to));
        }
    }

    #[test]
    fn test_quiz_happy_path() {
        let mut job = quiz_job();
        let stage = job.begin_stage().unwrap();
        assert_eq!(stage.name, "quiz");
        assert_eq!(job.status, JobStatus::Processing);

        let next = job.complete_stage(StageOutput::Final(quiz_output())).unwrap();
        assert_eq!(next, JobStatus::Processed);
        assert!(job.result.is_some());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_narration_happy_path_keeps_script() {
        let mut job = narration_job();
        job.begin_stage().unwrap();
        let next = job
            .complete_stage(StageOutput::Intermediate(StageArtifact::Script(script())))
            .unwrap();
        assert_eq!(next, JobStatus::WaitingForSpeech);
        assert!(job.result.is_none());
        assert_eq!(job.script().map(|s| s.word_count), Some(1));

        let stage = job.begin_stage().unwrap();
        assert_eq!(stage.name, "speech");
        job.complete_stage(StageOutput::Final(JobOutput::Narration(NarrationOutput {
            script: script(),
            audio_id: Uuid::new_v4(),
            audio_format: Default::default(),
            audio_bytes: 42,
        })))
        .unwrap();
        assert_eq!(job.status, JobStatus::Processed);
    }

    #[test]
    fn test_speech_stage_requires_script() {
        let mut job = narration_job();
        job.status = JobStatus::WaitingForSpeech;
        assert!(matches!(job.begin_stage(), Err(Error::Internal(_))));
        assert_eq!(job.status, JobStatus::WaitingForSpeech);
    }

    #[test]
    fn test_complete_rejects_mismatched_result_kind() {
        let mut job = GenerationJob::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            JobConfig::Transcription(TranscriptionConfig::default()),
        );
        job.begin_stage().unwrap();
        assert!(job.complete_stage(StageOutput::Final(quiz_output())).is_err());
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.result.is_none());

        job.complete_stage(StageOutput::Final(JobOutput::Transcription(
            TranscriptionOutput {
                text: "hi".into(),
                language_detected: None,
                duration_secs: None,
                segments: vec![],
                words: vec![],
            },
        )))
        .unwrap();
        assert_eq!(job.status, JobStatus::Processed);
    }

    #[test]
    fn test_complete_requires_processing() {
        let mut job = quiz_job();
        let err = job.complete_stage(StageOutput::Final(quiz_output())).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_fail_sets_error_and_is_terminal() {
        let mut job = narration_job();
        job.begin_stage().unwrap();
        job.fail("Validation failed: too short").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error_message.as_ref().map(|m| m.as_str()),
            Some("Validation failed: too short")
        );
        assert!(job.result.is_none());

        assert!(job.fail("again").is_err());
        assert!(job.begin_stage().is_err());
        assert_eq!(
            job.error_message.as_ref().map(|m| m.as_str()),
            Some("Validation failed: too short")
        );
    }

    #[test]
    fn test_processed_job_cannot_fail() {
        let mut job = quiz_job();
        job.begin_stage().unwrap();
        job.complete_stage(StageOutput::Final(quiz_output())).unwrap();
        assert!(job.fail("late failure").is_err());
        assert!(job.error_message.is_none());
    }

    #[test]
    fn test_current_stage_and_waiting() {
        let mut job = narration_job();
        assert!(job.is_waiting());
        assert_eq!(job.current_stage().map(|(i, s)| (i, s.name)), Some((0, "script")));
        job.begin_stage().unwrap();
        assert!(!job.is_waiting());
        job.fail("x").unwrap();
        assert!(job.current_stage().is_none());
    }

    #[test]
    fn test_waiting_statuses() {
        assert_eq!(
            JobKind::Narration.waiting_statuses(),
            vec![JobStatus::WaitingForScript, JobStatus::WaitingForSpeech]
        );
        assert_eq!(JobKind::Quiz.waiting_statuses(), vec![JobStatus::Pending]);
    }
}
