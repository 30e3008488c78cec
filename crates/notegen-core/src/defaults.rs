//! Centralized default constants for notegen.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// JOB MODEL
// =============================================================================

/// Maximum stored length (in characters) of a failed job's error message.
pub const ERROR_MESSAGE_MAX_CHARS: usize = 1000;

/// Maximum number of questions a single quiz job may request.
pub const QUIZ_MAX_QUESTIONS: u32 = 20;

// =============================================================================
// RETRY POLICY
// =============================================================================

/// Attempts per external call before the stage gives up.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 2_000;

// =============================================================================
// VALIDATION
// =============================================================================

/// Minimum characters of a flashcard answer.
pub const FLASHCARD_MIN_ANSWER_CHARS: usize = 3;

/// Minimum characters of a multiple-choice or true/false explanation.
pub const MIN_EXPLANATION_CHARS: usize = 20;

/// Minimum characters of an open question's model answer.
pub const OPEN_QUESTION_MIN_ANSWER_CHARS: usize = 30;

/// Options every multiple-choice question must carry.
pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;

/// Minimum characters of a narration transcript.
pub const NARRATION_MIN_TRANSCRIPT_CHARS: usize = 200;

/// Allowed difference between reported and counted narration words.
pub const NARRATION_WORD_COUNT_TOLERANCE: usize = 10;

/// Characters of a raw model reply kept in logs for diagnostics.
pub const RAW_RESPONSE_LOG_CHARS: usize = 500;

// =============================================================================
// WORKER POOLS
// =============================================================================

/// Default worker count per job family.
pub const POOL_WORKERS: usize = 2;

/// Default dispatch queue capacity per job family.
pub const POOL_QUEUE_CAPACITY: usize = 64;

/// Worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default OpenAI-compatible API endpoint.
pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default generation model.
pub const GEN_MODEL: &str = "gpt-4o-mini";

/// Default speech synthesis model.
pub const TTS_MODEL: &str = "tts-1";

/// Default narration voice.
pub const TTS_VOICE: &str = "alloy";

/// Longest text sent in one speech synthesis request, in characters.
pub const TTS_MAX_INPUT_CHARS: usize = 4096;

/// Timeout for generation and speech requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 300;

/// Default Whisper-compatible transcription endpoint.
pub const WHISPER_URL: &str = "http://localhost:8000";

/// Default Whisper model.
pub const WHISPER_MODEL: &str = "whisper-1";

/// Timeout for transcription requests in seconds.
pub const WHISPER_TIMEOUT_SECS: u64 = 300;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default page size for job listings.
pub const PAGE_LIMIT: i64 = 50;
