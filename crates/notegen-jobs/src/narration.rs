//! Audio narration: source text -> script -> synthesized speech (two stages).
//!
//! The script stage writes the validated [`NarrationScript`] as the job's
//! intermediate artifact; the speech stage reads it back, synthesizes the
//! transcript, stores the audio, and writes the final result.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use notegen_core::state::StageOutput;
use notegen_core::{
    defaults, AudioFormat, AudioStore, GenerationBackend, GenerationJob, JobConfig, JobKind,
    JobOutput, JobRepository, JobStatus, NarrationConfig, NarrationOutput, NarrationScript,
    NarrationSource, NoteSource, SpeechBackend, StageArtifact, TagRepository,
};

use crate::prompts::narration_prompt;
use crate::retry::RetryInvoker;
use crate::stage::{Stage, StageError};
use crate::tags::filter_tags;
use crate::validation::{validate_response, NarrationValidator};
use crate::wav;

fn narration_config(job: &GenerationJob) -> Result<&NarrationConfig, StageError> {
    match &job.config {
        JobConfig::Narration(config) => Ok(config),
        _ => Err(StageError::Unexpected(format!(
            "job {} has no narration configuration",
            job.id
        ))),
    }
}

// =============================================================================
// SCRIPT STAGE
// =============================================================================

/// First NARRATION stage: generate and validate the script.
pub struct NarrationScriptStage {
    jobs: Arc<dyn JobRepository>,
    notes: Arc<dyn NoteSource>,
    tags: Arc<dyn TagRepository>,
    generation: Arc<dyn GenerationBackend>,
}

impl NarrationScriptStage {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        notes: Arc<dyn NoteSource>,
        tags: Arc<dyn TagRepository>,
        generation: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            jobs,
            notes,
            tags,
            generation,
        }
    }

    /// Title and text the script is written from.
    async fn source_text(
        &self,
        job: &GenerationJob,
        config: &NarrationConfig,
    ) -> Result<(Option<String>, String), StageError> {
        let (title, text) = match config.source {
            NarrationSource::Note => {
                let note = self
                    .notes
                    .get_note(job.owner_id, job.source_reference_id)
                    .await?
                    .ok_or_else(|| {
                        StageError::Business(format!("Note {} not found", job.source_reference_id))
                    })?;
                (note.title, note.content)
            }
            NarrationSource::Transcription => {
                let source = self
                    .jobs
                    .get(job.source_reference_id)
                    .await?
                    .filter(|s| s.owner_id == job.owner_id && s.kind == JobKind::Transcription)
                    .ok_or_else(|| {
                        StageError::Business(format!(
                            "Transcription {} not found",
                            job.source_reference_id
                        ))
                    })?;
                match (&source.status, &source.result) {
                    (JobStatus::Processed, Some(JobOutput::Transcription(output))) => {
                        (None, output.text.clone())
                    }
                    _ => {
                        return Err(StageError::Business(format!(
                            "Transcription {} is not processed (status {})",
                            source.id, source.status
                        )))
                    }
                }
            }
        };
        if text.trim().is_empty() {
            return Err(StageError::Business(
                "Source has no text to narrate".to_string(),
            ));
        }
        Ok((title, text))
    }
}

#[async_trait]
impl Stage for NarrationScriptStage {
    fn kind(&self) -> JobKind {
        JobKind::Narration
    }

    fn name(&self) -> &'static str {
        "script"
    }

    async fn run(
        &self,
        job: &GenerationJob,
        retry: &RetryInvoker,
    ) -> Result<StageOutput, StageError> {
        let config = narration_config(job)?;
        let (title, text) = self.source_text(job, config).await?;

        let owner_tags = self.tags.list_for_owner(job.owner_id).await?;
        let tag_names: Vec<String> = owner_tags.iter().map(|t| t.name.clone()).collect();
        let prompt = narration_prompt(config, title.as_deref(), &text, &tag_names);

        debug!(
            subsystem = "jobs",
            component = "narration",
            job_id = %job.id,
            size = %config.size,
            model = self.generation.model_name(),
            prompt_len = prompt.user.len(),
            "Requesting narration script"
        );

        let raw = retry
            .call("narration.script", || {
                self.generation
                    .generate_json(&prompt.system, &prompt.user, &prompt.schema)
            })
            .await?;

        let validated = validate_response(&NarrationValidator::new(config.size), &raw)?;
        let mut script = validated.script;
        if script.title.is_none() {
            script.title = title;
        }
        script.tag_ids = filter_tags(&validated.tag_names, &owner_tags);

        Ok(StageOutput::Intermediate(StageArtifact::Script(script)))
    }
}

// =============================================================================
// SPEECH STAGE
// =============================================================================

/// Second NARRATION stage: synthesize the script and store the audio.
pub struct NarrationSpeechStage {
    audio: Arc<dyn AudioStore>,
    speech: Arc<dyn SpeechBackend>,
    max_input_chars: usize,
}

impl NarrationSpeechStage {
    pub fn new(audio: Arc<dyn AudioStore>, speech: Arc<dyn SpeechBackend>) -> Self {
        Self {
            audio,
            speech,
            max_input_chars: defaults::TTS_MAX_INPUT_CHARS,
        }
    }

    /// Override the per-request input limit.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars.max(1);
        self
    }

    async fn synthesize(
        &self,
        job_id: Uuid,
        script: &NarrationScript,
        config: &NarrationConfig,
        retry: &RetryInvoker,
    ) -> Result<Vec<u8>, StageError> {
        let chunks = split_for_speech(&script.transcript, self.max_input_chars);

        let mut parts = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(
                subsystem = "jobs",
                component = "narration",
                job_id = %job_id,
                chunk = i + 1,
                chunks = chunks.len(),
                chars = chunk.chars().count(),
                "Synthesizing speech"
            );
            let bytes = retry
                .call("narration.speech", || {
                    self.speech
                        .synthesize(chunk, &config.voice, config.audio_format)
                })
                .await?;
            parts.push(bytes);
        }

        match config.audio_format {
            // Chained MP3 frames and Ogg streams play back as one file.
            AudioFormat::Mp3 | AudioFormat::Opus => Ok(parts.concat()),
            AudioFormat::Wav => wav::merge(&parts).map_err(|e| {
                StageError::Unexpected(format!("speech synthesis returned unusable WAV: {}", e))
            }),
        }
    }
}

#[async_trait]
impl Stage for NarrationSpeechStage {
    fn kind(&self) -> JobKind {
        JobKind::Narration
    }

    fn name(&self) -> &'static str {
        "speech"
    }

    async fn run(
        &self,
        job: &GenerationJob,
        retry: &RetryInvoker,
    ) -> Result<StageOutput, StageError> {
        let config = narration_config(job)?;
        let script = job.script().ok_or_else(|| {
            StageError::Unexpected(format!("job {} has no script to synthesize", job.id))
        })?;

        let audio = self.synthesize(job.id, script, config, retry).await?;
        if audio.is_empty() {
            return Err(StageError::Unexpected(
                "speech synthesis returned no audio".to_string(),
            ));
        }

        let audio_bytes = audio.len();
        let filename = format!("narration-{}.{}", job.id, config.audio_format.as_str());
        let audio_id = self
            .audio
            .store_audio(
                job.owner_id,
                &filename,
                config.audio_format.content_type(),
                audio,
            )
            .await?;

        Ok(StageOutput::Final(JobOutput::Narration(NarrationOutput {
            script: script.clone(),
            audio_id,
            audio_format: config.audio_format,
            audio_bytes,
        })))
    }
}

/// Split `text` into pieces of at most `max_chars` characters, preferring
/// sentence boundaries and falling back to word boundaries.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences(text) {
        for piece in split_long(sentence, max_chars) {
            let needed = if current.is_empty() {
                piece.chars().count()
            } else {
                current.chars().count() + 1 + piece.chars().count()
            };
            if needed > max_chars && !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&piece);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Sentences including their terminator, trimmed.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

/// Break a sentence longer than `max_chars` on whitespace. A single word
/// longer than `max_chars` is kept whole.
fn split_long(sentence: &str, max_chars: usize) -> Vec<String> {
    if sentence.chars().count() <= max_chars {
        return vec![sentence.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
