//! Domain models for notegen generation jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// JOB KIND AND STATUS
// =============================================================================

/// Family of generation work a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    /// Note -> quiz questions (single stage).
    Quiz,
    /// Note or transcript -> narration script -> synthesized speech.
    Narration,
    /// Uploaded audio -> transcript (single stage).
    Transcription,
}

impl JobKind {
    /// All job kinds, in a stable order.
    pub const ALL: [JobKind; 3] = [JobKind::Quiz, JobKind::Narration, JobKind::Transcription];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Quiz => "QUIZ",
            JobKind::Narration => "NARRATION",
            JobKind::Transcription => "TRANSCRIPTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "QUIZ" => Some(JobKind::Quiz),
            "NARRATION" => Some(JobKind::Narration),
            "TRANSCRIPTION" => Some(JobKind::Transcription),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted pipeline status of a generation job.
///
/// Which statuses a job passes through depends on its kind; see
/// [`crate::state`] for the per-kind stage sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Processing,
    WaitingForScript,
    ProcessingScript,
    WaitingForSpeech,
    ProcessingSpeech,
    Processed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::WaitingForScript => "WAITING_FOR_SCRIPT",
            JobStatus::ProcessingScript => "PROCESSING_SCRIPT",
            JobStatus::WaitingForSpeech => "WAITING_FOR_SPEECH",
            JobStatus::ProcessingSpeech => "PROCESSING_SPEECH",
            JobStatus::Processed => "PROCESSED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "PROCESSING" => Some(JobStatus::Processing),
            "WAITING_FOR_SCRIPT" => Some(JobStatus::WaitingForScript),
            "PROCESSING_SCRIPT" => Some(JobStatus::ProcessingScript),
            "WAITING_FOR_SPEECH" => Some(JobStatus::WaitingForSpeech),
            "PROCESSING_SPEECH" => Some(JobStatus::ProcessingSpeech),
            "PROCESSED" => Some(JobStatus::Processed),
            "FAILED" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// PROCESSED and FAILED admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Processed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// JOB CONFIGURATION
// =============================================================================

/// Question format requested for a quiz batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Flashcard,
    MultipleChoice,
    TrueFalse,
    OpenQuestion,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Flashcard => "FLASHCARD",
            QuestionType::MultipleChoice => "MULTIPLE_CHOICE",
            QuestionType::TrueFalse => "TRUE_FALSE",
            QuestionType::OpenQuestion => "OPEN_QUESTION",
        }
    }

    /// Case-insensitive parse of the wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FLASHCARD" => Some(QuestionType::Flashcard),
            "MULTIPLE_CHOICE" => Some(QuestionType::MultipleChoice),
            "TRUE_FALSE" => Some(QuestionType::TrueFalse),
            "OPEN_QUESTION" => Some(QuestionType::OpenQuestion),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "EASY",
            Difficulty::Medium => "MEDIUM",
            Difficulty::Hard => "HARD",
        }
    }
}

/// Parameters of a quiz generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizConfig {
    pub question_count: u32,
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub language: Option<String>,
}

impl QuizConfig {
    pub fn validate(&self) -> Result<()> {
        if self.question_count == 0 || self.question_count > defaults::QUIZ_MAX_QUESTIONS {
            return Err(Error::InvalidInput(format!(
                "question_count must be between 1 and {}, got {}",
                defaults::QUIZ_MAX_QUESTIONS,
                self.question_count
            )));
        }
        Ok(())
    }
}

/// Target length tier of a narration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NarrationSize {
    Short,
    #[default]
    Medium,
    Long,
}

impl NarrationSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrationSize::Short => "SHORT",
            NarrationSize::Medium => "MEDIUM",
            NarrationSize::Long => "LONG",
        }
    }

    /// Inclusive `(min, max)` word count of a transcript in this tier.
    pub fn word_range(&self) -> (usize, usize) {
        match self {
            NarrationSize::Short => (400, 700),
            NarrationSize::Medium => (800, 1200),
            NarrationSize::Long => (1500, 2200),
        }
    }

    /// Inclusive `(min, max)` sentence count of a transcript in this tier.
    pub fn sentence_range(&self) -> (usize, usize) {
        match self {
            NarrationSize::Short => (15, 60),
            NarrationSize::Medium => (30, 110),
            NarrationSize::Long => (60, 200),
        }
    }
}

impl std::fmt::Display for NarrationSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NarrationStyle {
    #[default]
    Conversational,
    Lecture,
    Storytelling,
}

impl NarrationStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrationStyle::Conversational => "CONVERSATIONAL",
            NarrationStyle::Lecture => "LECTURE",
            NarrationStyle::Storytelling => "STORYTELLING",
        }
    }
}

/// Encoding of synthesized narration audio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Opus,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
            AudioFormat::Opus => "opus",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Opus => "audio/ogg",
        }
    }
}

/// Where a narration job reads its source text from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NarrationSource {
    /// `source_reference_id` is a note.
    #[default]
    Note,
    /// `source_reference_id` is a processed transcription job.
    Transcription,
}

fn default_voice() -> String {
    defaults::TTS_VOICE.to_string()
}

/// Parameters of an audio narration job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationConfig {
    #[serde(default)]
    pub size: NarrationSize,
    #[serde(default)]
    pub style: NarrationStyle,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default)]
    pub audio_format: AudioFormat,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub source: NarrationSource,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            size: NarrationSize::default(),
            style: NarrationStyle::default(),
            voice: default_voice(),
            audio_format: AudioFormat::default(),
            language: None,
            source: NarrationSource::default(),
        }
    }
}

impl NarrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.voice.trim().is_empty() {
            return Err(Error::InvalidInput("voice must not be empty".into()));
        }
        Ok(())
    }
}

/// Parameters of an audio transcription job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// ISO 639-1 language hint; auto-detect when absent.
    #[serde(default)]
    pub language: Option<String>,
    /// When set, a processed transcription spawns a narration job over the transcript.
    #[serde(default)]
    pub narration: Option<NarrationConfig>,
}

/// Kind-specific generation parameters, immutable after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobConfig {
    Quiz(QuizConfig),
    Narration(NarrationConfig),
    Transcription(TranscriptionConfig),
}

impl JobConfig {
    pub fn kind(&self) -> JobKind {
        match self {
            JobConfig::Quiz(_) => JobKind::Quiz,
            JobConfig::Narration(_) => JobKind::Narration,
            JobConfig::Transcription(_) => JobKind::Transcription,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            JobConfig::Quiz(c) => c.validate(),
            JobConfig::Narration(c) => c.validate(),
            JobConfig::Transcription(c) => match &c.narration {
                Some(n) => n.validate(),
                None => Ok(()),
            },
        }
    }
}

// =============================================================================
// JOB OUTPUTS
// =============================================================================

/// A validated quiz question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub question_type: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOutput {
    pub questions: Vec<Question>,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

/// A validated, spoken-word-safe narration script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationScript {
    #[serde(default)]
    pub title: Option<String>,
    pub transcript: String,
    /// Counted (not reported) word count.
    pub word_count: usize,
    pub sentence_count: usize,
    pub estimated_duration: String,
    #[serde(default)]
    pub tag_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationOutput {
    pub script: NarrationScript,
    /// Reference to the stored audio blob.
    pub audio_id: Uuid,
    pub audio_format: AudioFormat,
    pub audio_bytes: usize,
}

/// A segment of transcribed audio with timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// A single word of transcribed audio with timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub word: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Result of audio transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionOutput {
    pub text: String,
    /// Detected language (ISO 639-1 code).
    #[serde(default)]
    pub language_detected: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<f64>,
    #[serde(default)]
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub words: Vec<TranscriptWord>,
}

/// Kind-specific payload written by a job's final stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutput {
    Quiz(QuizOutput),
    Narration(NarrationOutput),
    Transcription(TranscriptionOutput),
}

impl JobOutput {
    pub fn kind(&self) -> JobKind {
        match self {
            JobOutput::Quiz(_) => JobKind::Quiz,
            JobOutput::Narration(_) => JobKind::Narration,
            JobOutput::Transcription(_) => JobKind::Transcription,
        }
    }
}

/// Persisted output of a completed non-final stage, consumed by the next one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageArtifact {
    Script(NarrationScript),
}

// =============================================================================
// ERROR MESSAGE
// =============================================================================

/// Human-readable failure summary, bounded to
/// [`defaults::ERROR_MESSAGE_MAX_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ErrorMessage(String);

impl ErrorMessage {
    pub const MAX_CHARS: usize = defaults::ERROR_MESSAGE_MAX_CHARS;

    /// Build a message, truncating on a character boundary if needed.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        match message.char_indices().nth(Self::MAX_CHARS) {
            Some((byte_idx, _)) => Self(message[..byte_idx].to_string()),
            None => Self(message),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ErrorMessage {
    fn from(s: String) -> Self {
        ErrorMessage::new(s)
    }
}

impl From<&str> for ErrorMessage {
    fn from(s: &str) -> Self {
        ErrorMessage::new(s)
    }
}

impl From<ErrorMessage> for String {
    fn from(m: ErrorMessage) -> Self {
        m.0
    }
}

impl std::fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// GENERATION JOB
// =============================================================================

/// One unit of AI generation work tracked through a persisted status.
///
/// Status, intermediate artifact, result, and error message only change
/// through the state machine methods in [`crate::state`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: JobKind,
    pub source_reference_id: Uuid,
    pub config: JobConfig,
    pub status: JobStatus,
    #[serde(default)]
    pub intermediate: Option<StageArtifact>,
    #[serde(default)]
    pub result: Option<JobOutput>,
    #[serde(default)]
    pub error_message: Option<ErrorMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a job in its kind's initial waiting status.
    pub fn new(owner_id: Uuid, source_reference_id: Uuid, config: JobConfig) -> Self {
        let kind = config.kind();
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id,
            kind,
            source_reference_id,
            config,
            status: crate::state::initial_status(kind),
            intermediate: None,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// COLLABORATOR ENTITIES
// =============================================================================

/// Source note content, as exposed by the note collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub content: String,
}

/// A tag owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
}

/// Stored audio (uploaded source or synthesized narration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioBlob {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}
