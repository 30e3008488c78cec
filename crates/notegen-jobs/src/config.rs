//! Pipeline configuration.

use std::time::Duration;

use notegen_core::{defaults, JobKind};

use crate::retry::RetryPolicy;

/// Configuration for the retry policy and the worker pools.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Whether the worker pools process events at all.
    pub enabled: bool,
    /// Retry policy handed to the stage executor.
    pub retry: RetryPolicy,
    /// Queue capacity of each worker pool.
    pub queue_capacity: usize,
    /// Workers in the quiz pool.
    pub quiz_workers: usize,
    /// Workers in the narration pool.
    pub narration_workers: usize,
    /// Workers in the transcription pool.
    pub transcription_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            retry: RetryPolicy::default(),
            queue_capacity: defaults::POOL_QUEUE_CAPACITY,
            quiz_workers: defaults::POOL_WORKERS,
            narration_workers: defaults::POOL_WORKERS,
            transcription_workers: defaults::POOL_WORKERS,
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "false" | "0" | "no" | "off" => false,
            "true" | "1" | "yes" | "on" => true,
            _ => default,
        })
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `PIPELINE_ENABLED` | `true` | Enable/disable the worker pools |
    /// | `PIPELINE_RETRY_MAX_ATTEMPTS` | `3` | Attempts per external call |
    /// | `PIPELINE_RETRY_DELAY_MS` | `2000` | Fixed delay between attempts |
    /// | `PIPELINE_RETRY_ALL_ERRORS` | `false` | Retry non-retryable provider errors too |
    /// | `PIPELINE_QUEUE_CAPACITY` | `64` | Queue capacity of each pool |
    /// | `QUIZ_WORKERS` | `2` | Quiz pool width |
    /// | `NARRATION_WORKERS` | `2` | Narration pool width |
    /// | `TRANSCRIPTION_WORKERS` | `2` | Transcription pool width |
    pub fn from_env() -> Self {
        let max_attempts = env_usize(
            "PIPELINE_RETRY_MAX_ATTEMPTS",
            defaults::RETRY_MAX_ATTEMPTS as usize,
        )
        .max(1) as u32;
        let delay_ms = std::env::var("PIPELINE_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::RETRY_DELAY_MS);
        let retry = RetryPolicy::fixed(max_attempts, Duration::from_millis(delay_ms))
            .with_retry_all(env_flag("PIPELINE_RETRY_ALL_ERRORS", false));

        Self {
            enabled: env_flag("PIPELINE_ENABLED", true),
            retry,
            queue_capacity: env_usize("PIPELINE_QUEUE_CAPACITY", defaults::POOL_QUEUE_CAPACITY)
                .max(1),
            quiz_workers: env_usize("QUIZ_WORKERS", defaults::POOL_WORKERS).max(1),
            narration_workers: env_usize("NARRATION_WORKERS", defaults::POOL_WORKERS).max(1),
            transcription_workers: env_usize("TRANSCRIPTION_WORKERS", defaults::POOL_WORKERS)
                .max(1),
        }
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the queue capacity of each pool.
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the width of `kind`'s pool.
    pub fn with_workers(mut self, kind: JobKind, workers: usize) -> Self {
        let workers = workers.max(1);
        match kind {
            JobKind::Quiz => self.quiz_workers = workers,
            JobKind::Narration => self.narration_workers = workers,
            JobKind::Transcription => self.transcription_workers = workers,
        }
        self
    }

    /// Enable or disable the worker pools.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Width of `kind`'s pool.
    pub fn workers(&self, kind: JobKind) -> usize {
        match kind {
            JobKind::Quiz => self.quiz_workers,
            JobKind::Narration => self.narration_workers,
            JobKind::Transcription => self.transcription_workers,
        }
    }
}
