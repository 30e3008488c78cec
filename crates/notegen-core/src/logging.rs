//! Structured logging field name constants for notegen.
//!
//! All crates use these names for structured `tracing` fields so log
//! aggregation can query across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Job failed terminally, dispatch rejected, retry budget exhausted |
//! | WARN  | Retry scheduled, validation failure, skipped duplicate event |
//! | INFO  | Lifecycle events (pool start/stop), job and stage completions |
//! | DEBUG | Prompt sizes, claim decisions, tag filtering |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "dispatcher", "executor", "retry", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Generation job UUID.
pub const JOB_ID: &str = "job_id";

/// Job kind (QUIZ, NARRATION, TRANSCRIPTION).
pub const JOB_KIND: &str = "job_kind";

/// Pipeline stage name.
pub const STAGE: &str = "stage";

/// Owner UUID.
pub const OWNER_ID: &str = "owner_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Attempt number of a retried call (1-based).
pub const ATTEMPT: &str = "attempt";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Number of validation errors found in a reply.
pub const ERROR_COUNT: &str = "error_count";
