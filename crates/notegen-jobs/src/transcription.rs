//! Audio transcription: uploaded audio -> transcript (single stage).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use notegen_core::state::StageOutput;
use notegen_core::{
    AudioStore, GenerationJob, JobConfig, JobKind, JobOutput, TranscriptionBackend,
};

use crate::retry::RetryInvoker;
use crate::stage::{Stage, StageError};

/// The single stage of a TRANSCRIPTION job.
pub struct TranscriptionStage {
    audio: Arc<dyn AudioStore>,
    transcription: Option<Arc<dyn TranscriptionBackend>>,
}

impl TranscriptionStage {
    pub fn new(
        audio: Arc<dyn AudioStore>,
        transcription: Option<Arc<dyn TranscriptionBackend>>,
    ) -> Self {
        Self {
            audio,
            transcription,
        }
    }
}

#[async_trait]
impl Stage for TranscriptionStage {
    fn kind(&self) -> JobKind {
        JobKind::Transcription
    }

    fn name(&self) -> &'static str {
        "transcription"
    }

    async fn run(
        &self,
        job: &GenerationJob,
        retry: &RetryInvoker,
    ) -> Result<StageOutput, StageError> {
        let JobConfig::Transcription(config) = &job.config else {
            return Err(StageError::Unexpected(format!(
                "job {} has no transcription configuration",
                job.id
            )));
        };
        let Some(backend) = &self.transcription else {
            return Err(StageError::Business(
                "Transcription service is not configured".to_string(),
            ));
        };

        let blob = self
            .audio
            .load_audio(job.owner_id, job.source_reference_id)
            .await?
            .ok_or_else(|| {
                StageError::Business(format!("Audio {} not found", job.source_reference_id))
            })?;
        if blob.data.is_empty() {
            return Err(StageError::Business("Audio file is empty".to_string()));
        }

        debug!(
            subsystem = "jobs",
            component = "transcription",
            job_id = %job.id,
            model = backend.model_name(),
            audio_bytes = blob.data.len(),
            language = ?config.language,
            "Requesting transcription"
        );

        let output = retry
            .call("transcription.transcribe", || {
                backend.transcribe(
                    blob.data.clone(),
                    &blob.filename,
                    &blob.content_type,
                    config.language.as_deref(),
                )
            })
            .await?;

        if output.text.trim().is_empty() {
            return Err(StageError::Business(
                "Transcription produced no text".to_string(),
            ));
        }

        Ok(StageOutput::Final(JobOutput::Transcription(output)))
    }
}
