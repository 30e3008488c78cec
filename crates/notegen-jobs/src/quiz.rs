//! Quiz generation: note -> validated question batch (single stage).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use notegen_core::state::StageOutput;
use notegen_core::{
    GenerationBackend, GenerationJob, JobConfig, JobKind, JobOutput, NoteSource, QuizOutput,
    TagRepository,
};

use crate::prompts::quiz_prompt;
use crate::retry::RetryInvoker;
use crate::stage::{Stage, StageError};
use crate::tags::filter_tags;
use crate::validation::{validate_response, QuizValidator};

/// The single stage of a QUIZ job.
pub struct QuizStage {
    notes: Arc<dyn NoteSource>,
    tags: Arc<dyn TagRepository>,
    generation: Arc<dyn GenerationBackend>,
}

impl QuizStage {
    pub fn new(
        notes: Arc<dyn NoteSource>,
        tags: Arc<dyn TagRepository>,
        generation: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            notes,
            tags,
            generation,
        }
    }
}

#[async_trait]
impl Stage for QuizStage {
    fn kind(&self) -> JobKind {
        JobKind::Quiz
    }

    fn name(&self) -> &'static str {
        "quiz"
    }

    async fn run(
        &self,
        job: &GenerationJob,
        retry: &RetryInvoker,
    ) -> Result<StageOutput, StageError> {
        let JobConfig::Quiz(config) = &job.config else {
            return Err(StageError::Unexpected(format!(
                "job {} has no quiz configuration",
                job.id
            )));
        };

        let note = self
            .notes
            .get_note(job.owner_id, job.source_reference_id)
            .await?
            .ok_or_else(|| {
                StageError::Business(format!("Note {} not found", job.source_reference_id))
            })?;
        if note.content.trim().is_empty() {
            return Err(StageError::Business("Note has no content to quiz on".into()));
        }

        let owner_tags = self.tags.list_for_owner(job.owner_id).await?;
        let tag_names: Vec<String> = owner_tags.iter().map(|t| t.name.clone()).collect();
        let prompt = quiz_prompt(config, note.title.as_deref(), &note.content, &tag_names);

        debug!(
            subsystem = "jobs",
            component = "quiz",
            job_id = %job.id,
            model = self.generation.model_name(),
            prompt_len = prompt.user.len(),
            "Requesting quiz"
        );

        let raw = retry
            .call("quiz.generate", || {
                self.generation
                    .generate_json(&prompt.system, &prompt.user, &prompt.schema)
            })
            .await?;

        let quiz = validate_response(&QuizValidator::new(config), &raw)?;
        let tag_ids = filter_tags(&quiz.tag_names, &owner_tags);

        Ok(StageOutput::Final(JobOutput::Quiz(QuizOutput {
            questions: quiz.questions,
            tag_ids,
        })))
    }
}
