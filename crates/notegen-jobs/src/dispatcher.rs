//! Fire-and-forget hand-off of job events to the per-family worker pools.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error};
use uuid::Uuid;

use notegen_core::JobKind;

/// A job that is ready for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// A job was inserted in its initial status.
    JobCreated { job_id: Uuid, kind: JobKind },
    /// A job found waiting for a stage, e.g. after a restart.
    StageReady { job_id: Uuid, kind: JobKind },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobEvent::JobCreated { job_id, .. } | JobEvent::StageReady { job_id, .. } => *job_id,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobEvent::JobCreated { kind, .. } | JobEvent::StageReady { kind, .. } => *kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::JobCreated { .. } => "job_created",
            JobEvent::StageReady { .. } => "stage_ready",
        }
    }
}

/// Routes job events to the queue of their family's worker pool.
///
/// Callers dispatch only after the job row they refer to is committed.
/// Dispatch never blocks and never retries: a full or closed queue drops
/// the event with an error log, leaving the job in its waiting status for
/// [`crate::JobService::recover_waiting_jobs`].
#[derive(Clone, Default)]
pub struct EventDispatcher {
    queues: Arc<HashMap<JobKind, mpsc::Sender<JobEvent>>>,
}

impl EventDispatcher {
    pub fn new(queues: HashMap<JobKind, mpsc::Sender<JobEvent>>) -> Self {
        Self {
            queues: Arc::new(queues),
        }
    }

    /// Hand `event` to its pool. Returns whether the pool accepted it.
    pub fn dispatch(&self, event: JobEvent) -> bool {
        let kind = event.kind();
        let Some(queue) = self.queues.get(&kind) else {
            error!(
                subsystem = "jobs",
                component = "dispatcher",
                job_id = %event.job_id(),
                job_kind = %kind,
                "No worker pool for job kind, event dropped"
            );
            return false;
        };

        match queue.try_send(event) {
            Ok(()) => {
                debug!(
                    subsystem = "jobs",
                    component = "dispatcher",
                    job_id = %event.job_id(),
                    job_kind = %kind,
                    event = event.name(),
                    "Event dispatched"
                );
                true
            }
            Err(TrySendError::Full(_)) => {
                error!(
                    subsystem = "jobs",
                    component = "dispatcher",
                    job_id = %event.job_id(),
                    job_kind = %kind,
                    "Worker pool queue is full, event dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                error!(
                    subsystem = "jobs",
                    component = "dispatcher",
                    job_id = %event.job_id(),
                    job_kind = %kind,
                    "Worker pool is not running, event dropped"
                );
                false
            }
        }
    }
}
