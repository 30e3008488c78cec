//! Stage execution.
//!
//! A [`Stage`] is one external-service call plus validation for one step of
//! a job kind's pipeline. The [`StageExecutor`] wraps every stage the same
//! way:
//!
//! 1. Claim the job by atomically moving it from the stage's waiting status
//!    to its processing status. A failed claim means another worker owns the
//!    job (duplicate or stale event) and the stage is skipped.
//! 2. Run the stage, catching panics.
//! 3. Record the output (advancing the status) or the failure (FAILED with a
//!    capped message), and persist status and payload in one write.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use notegen_core::state::StageOutput;
use notegen_core::{Error, GenerationJob, JobKind, JobRepository, JobStatus, Result};

use crate::retry::{RetryExhausted, RetryInvoker};
use crate::validation::ValidationFailure;

// =============================================================================
// STAGE ERRORS
// =============================================================================

/// Why a stage failed. Every variant is terminal for the job.
#[derive(Debug, Error)]
pub enum StageError {
    /// The reply broke content rules, was not JSON, or was cut off.
    #[error("{0}")]
    Validation(#[from] ValidationFailure),

    /// The external call failed on every permitted attempt.
    #[error(transparent)]
    Technical(#[from] RetryExhausted),

    /// A precondition unrelated to the AI call does not hold.
    #[error("{0}")]
    Business(String),

    /// Anything else, including a panicking stage.
    #[error("{0}")]
    Unexpected(String),
}

impl StageError {
    /// Stable failure class for logs and worker events.
    pub fn class(&self) -> &'static str {
        match self {
            StageError::Validation(f) if f.is_truncated() => "truncated",
            StageError::Validation(_) => "validation",
            StageError::Technical(_) => "technical",
            StageError::Business(_) => "business",
            StageError::Unexpected(_) => "unexpected",
        }
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, StageError::Validation(f) if f.is_truncated())
    }
}

impl From<Error> for StageError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(_)
            | Error::JobNotFound(_)
            | Error::NoteNotFound(_)
            | Error::AudioNotFound(_)
            | Error::InvalidInput(_) => StageError::Business(err.to_string()),
            other => StageError::Unexpected(other.to_string()),
        }
    }
}

// =============================================================================
// STAGE CAPABILITY
// =============================================================================

/// One step of a job kind's pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Job kind this stage belongs to.
    fn kind(&self) -> JobKind;

    /// Stage name; must match the kind's stage descriptor.
    fn name(&self) -> &'static str;

    /// Produce the stage output for `job`, which is in the stage's
    /// processing status. External calls go through `retry`.
    async fn run(
        &self,
        job: &GenerationJob,
        retry: &RetryInvoker,
    ) -> std::result::Result<StageOutput, StageError>;
}

// =============================================================================
// EXECUTOR
// =============================================================================

/// Result of executing one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// Stage succeeded; the job now sits in `status`.
    Advanced { status: JobStatus },
    /// Stage failed; the job is FAILED with `error`.
    Failed { error: String, class: &'static str },
    /// Another worker owns the job, or it is not waiting for this stage.
    Skipped { reason: &'static str },
}

/// Claims, runs, and records one stage at a time.
#[derive(Clone)]
pub struct StageExecutor {
    jobs: Arc<dyn JobRepository>,
    retry: RetryInvoker,
}

impl StageExecutor {
    pub fn new(jobs: Arc<dyn JobRepository>, retry: RetryInvoker) -> Self {
        Self { jobs, retry }
    }

    pub fn retry(&self) -> &RetryInvoker {
        &self.retry
    }

    /// Execute `stage` for `job_id`.
    ///
    /// Returns `Err` only when persistence itself fails; stage failures are
    /// recorded on the job and reported as [`StageOutcome::Failed`].
    pub async fn execute(&self, job_id: Uuid, stage: &dyn Stage) -> Result<StageOutcome> {
        let mut job = self.jobs.load(job_id).await?;

        let Some((_, descriptor)) = job.current_stage() else {
            debug!(
                subsystem = "jobs",
                component = "executor",
                job_id = %job_id,
                status = %job.status,
                "Job is terminal, skipping"
            );
            return Ok(StageOutcome::Skipped { reason: "terminal" });
        };
        if job.kind != stage.kind() || descriptor.name != stage.name() {
            return Err(Error::Internal(format!(
                "stage {}/{} cannot run {} job {} at stage '{}'",
                stage.kind(),
                stage.name(),
                job.kind,
                job_id,
                descriptor.name
            )));
        }
        if !job.is_waiting() {
            return Ok(StageOutcome::Skipped {
                reason: "already processing",
            });
        }

        let claimed = self
            .jobs
            .compare_and_set_status(job_id, descriptor.waiting, descriptor.processing)
            .await?;
        if !claimed {
            warn!(
                subsystem = "jobs",
                component = "executor",
                job_id = %job_id,
                stage = descriptor.name,
                "Job already claimed by another worker, skipping"
            );
            return Ok(StageOutcome::Skipped {
                reason: "claimed elsewhere",
            });
        }

        // Mirror the claim locally; this also checks the stage's inputs.
        if let Err(e) = job.begin_stage() {
            return self
                .record_failure(job, StageError::Unexpected(e.to_string()))
                .await;
        }

        debug!(
            subsystem = "jobs",
            component = "executor",
            job_id = %job_id,
            job_kind = %job.kind,
            stage = descriptor.name,
            "Stage claimed"
        );

        let start = Instant::now();
        let result = AssertUnwindSafe(stage.run(&job, &self.retry))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(StageError::Unexpected(panic_message(panic.as_ref()))));
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => match job.complete_stage(output) {
                Ok(status) => {
                    self.jobs.save(&job).await?;
                    info!(
                        subsystem = "jobs",
                        component = "executor",
                        job_id = %job_id,
                        job_kind = %job.kind,
                        stage = descriptor.name,
                        status = %status,
                        duration_ms,
                        "Stage completed"
                    );
                    Ok(StageOutcome::Advanced { status })
                }
                Err(e) => {
                    self.record_failure(job, StageError::Unexpected(e.to_string()))
                        .await
                }
            },
            Err(stage_error) => {
                debug!(
                    subsystem = "jobs",
                    component = "executor",
                    job_id = %job_id,
                    stage = descriptor.name,
                    duration_ms,
                    "Stage returned an error"
                );
                self.record_failure(job, stage_error).await
            }
        }
    }

    async fn record_failure(
        &self,
        mut job: GenerationJob,
        stage_error: StageError,
    ) -> Result<StageOutcome> {
        let class = stage_error.class();
        if let StageError::Validation(failure) = &stage_error {
            debug!(
                subsystem = "jobs",
                component = "executor",
                job_id = %job.id,
                raw_len = failure.raw_response.len(),
                errors = ?failure.errors,
                "Rejected model response"
            );
        }
        job.fail(stage_error.to_string())?;
        self.jobs.save(&job).await?;

        let message = job
            .error_message
            .as_ref()
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        error!(
            subsystem = "jobs",
            component = "executor",
            job_id = %job.id,
            job_kind = %job.kind,
            class,
            error = %message,
            "Job failed"
        );
        Ok(StageOutcome::Failed {
            error: message,
            class,
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Stage panicked: {}", detail)
}
