//! Generation job endpoints: create quiz, narration, and transcription jobs,
//! and poll their status.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use notegen_core::{
    defaults, AudioFormat, Difficulty, GenerationJob, JobConfig, JobKind, JobOutput, JobStatus,
    NarrationConfig, NarrationSize, NarrationSource, NarrationStyle, QuestionType, QuizConfig,
    TranscriptionConfig,
};

use crate::error::ApiError;
use crate::AppState;

/// Header carrying the requesting owner's ID.
pub const OWNER_HEADER: &str = "x-owner-id";

/// The requesting owner, taken from the `X-Owner-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct Owner(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(OWNER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing X-Owner-Id header".to_string()))?;
        value
            .to_str()
            .ok()
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(Owner)
            .ok_or_else(|| ApiError::Unauthorized("Invalid X-Owner-Id header".to_string()))
    }
}

// =============================================================================
// REQUEST / RESPONSE TYPES
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateQuizRequest {
    pub note_id: Uuid,
    pub question_count: u32,
    pub question_type: QuestionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub language: Option<String>,
}

/// Narration over a note, or over a processed transcription when
/// `transcription_id` is given instead of `note_id`.
#[derive(Debug, Deserialize)]
pub struct CreateNarrationRequest {
    #[serde(default)]
    pub note_id: Option<Uuid>,
    #[serde(default)]
    pub transcription_id: Option<Uuid>,
    #[serde(default)]
    pub size: NarrationSize,
    #[serde(default)]
    pub style: NarrationStyle,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub audio_format: Option<AudioFormat>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTranscriptionRequest {
    pub audio_id: Uuid,
    #[serde(default)]
    pub language: Option<String>,
    /// Narrate the transcript once transcription succeeds.
    #[serde(default)]
    pub narration: Option<NarrationConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
}

/// Public view of a job; the intermediate stage artifact stays internal.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub kind: JobKind,
    pub status: JobStatus,
    pub source_reference_id: Uuid,
    pub config: JobConfig,
    pub result: Option<JobOutput>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GenerationJob> for JobResponse {
    fn from(job: GenerationJob) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            status: job.status,
            source_reference_id: job.source_reference_id,
            config: job.config,
            result: job.result,
            error_message: job.error_message.map(String::from),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

fn accepted(job: GenerationJob) -> impl IntoResponse {
    (StatusCode::ACCEPTED, Json(JobResponse::from(job)))
}

// =============================================================================
// HANDLERS
// =============================================================================

pub async fn create_quiz(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(body): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = QuizConfig {
        question_count: body.question_count,
        question_type: body.question_type,
        difficulty: body.difficulty,
        language: body.language,
    };
    let job = state
        .jobs
        .create_quiz_job(owner, body.note_id, config)
        .await?;
    Ok(accepted(job))
}

pub async fn create_narration(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(body): Json<CreateNarrationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (source, source_id) = match (body.note_id, body.transcription_id) {
        (Some(note_id), None) => (NarrationSource::Note, note_id),
        (None, Some(transcription_id)) => (NarrationSource::Transcription, transcription_id),
        _ => {
            return Err(ApiError::BadRequest(
                "Exactly one of note_id or transcription_id is required".to_string(),
            ))
        }
    };
    let config = NarrationConfig {
        size: body.size,
        style: body.style,
        voice: body
            .voice
            .unwrap_or_else(|| defaults::TTS_VOICE.to_string()),
        audio_format: body.audio_format.unwrap_or_default(),
        language: body.language,
        source,
    };
    let job = state
        .jobs
        .create_narration_job(owner, source_id, config)
        .await?;
    Ok(accepted(job))
}

pub async fn create_transcription(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(body): Json<CreateTranscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let config = TranscriptionConfig {
        language: body.language,
        narration: body.narration,
    };
    let job = state
        .jobs
        .create_transcription_job(owner, body.audio_id, config)
        .await?;
    Ok(accepted(job))
}

pub async fn get_job(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.jobs.get_job(owner, id).await?;
    Ok(Json(JobResponse::from(job)))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(query): Query<ListJobsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let jobs: Vec<JobResponse> = state
        .jobs
        .list_jobs(owner, query.limit)
        .await?
        .into_iter()
        .map(JobResponse::from)
        .collect();
    Ok(Json(jobs))
}
