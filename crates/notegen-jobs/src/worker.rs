//! Per-family worker pools that consume dispatched job events.
//!
//! Each job family (quiz, narration, transcription) gets its own bounded
//! queue and a fixed number of workers sharing it. A worker takes one event
//! and runs the job's remaining stages end-to-end before taking the next.
//! Every run happens in its own task so a panicking job is logged and the
//! worker keeps going.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use notegen_core::{Error, JobKind, Result};

use crate::config::PipelineConfig;
use crate::dispatcher::{EventDispatcher, JobEvent};
use crate::pipeline::{Pipeline, WorkerEvent};

/// Handle for controlling running worker pools.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
    supervisor: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal the pools to stop and wait for in-flight jobs to finish.
    ///
    /// Queued events that no worker has taken yet are dropped; their jobs
    /// stay waiting and are picked up by the next recovery pass.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        self.supervisor
            .await
            .map_err(|e| Error::Internal(format!("Worker supervisor failed: {}", e)))
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// The worker pools of every job family, not yet started.
pub struct JobWorker {
    pipeline: Arc<Pipeline>,
    config: PipelineConfig,
    dispatcher: EventDispatcher,
    queues: Vec<(JobKind, mpsc::Receiver<JobEvent>)>,
}

impl JobWorker {
    /// Create one bounded queue per job family.
    pub fn new(pipeline: Pipeline, config: PipelineConfig) -> Self {
        let mut senders = HashMap::new();
        let mut queues = Vec::new();
        for kind in JobKind::ALL {
            let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
            senders.insert(kind, tx);
            queues.push((kind, rx));
        }
        Self {
            pipeline: Arc::new(pipeline),
            config,
            dispatcher: EventDispatcher::new(senders),
            queues,
        }
    }

    /// Dispatcher feeding these pools.
    pub fn dispatcher(&self) -> EventDispatcher {
        self.dispatcher.clone()
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.pipeline.events()
    }

    /// Spawn the workers and return a handle for control.
    ///
    /// When the pipeline is disabled no worker starts and every dispatch is
    /// rejected as closed.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let event_rx = self.pipeline.events();

        let mut workers = JoinSet::new();
        let mut kinds = Vec::new();
        if self.config.enabled {
            for (kind, queue) in self.queues {
                let width = self.config.workers(kind);
                let queue = Arc::new(Mutex::new(queue));
                for index in 0..width {
                    workers.spawn(run_worker(
                        kind,
                        index,
                        self.pipeline.clone(),
                        queue.clone(),
                        self.dispatcher.clone(),
                        stop_rx.clone(),
                    ));
                }
                info!(
                    subsystem = "jobs",
                    component = "pool",
                    job_kind = %kind,
                    workers = width,
                    queue_capacity = self.config.queue_capacity,
                    "Worker pool started"
                );
                self.pipeline
                    .emit(WorkerEvent::WorkerStarted { kind, workers: width });
                kinds.push(kind);
            }
        } else {
            info!(
                subsystem = "jobs",
                component = "pool",
                "Pipeline is disabled, not starting worker pools"
            );
            drop(self.queues);
        }

        let pipeline = self.pipeline;
        let supervisor = tokio::spawn(async move {
            let _ = shutdown_rx.recv().await;
            info!(
                subsystem = "jobs",
                component = "pool",
                "Worker pools received shutdown signal"
            );
            let _ = stop_tx.send(true);
            while let Some(result) = workers.join_next().await {
                if let Err(e) = result {
                    error!(error = ?e, "Worker task panicked");
                }
            }
            for kind in kinds {
                pipeline.emit(WorkerEvent::WorkerStopped { kind });
            }
            info!(subsystem = "jobs", component = "pool", "Worker pools stopped");
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
            supervisor,
        }
    }
}

async fn run_worker(
    kind: JobKind,
    index: usize,
    pipeline: Arc<Pipeline>,
    queue: Arc<Mutex<mpsc::Receiver<JobEvent>>>,
    dispatcher: EventDispatcher,
    mut stop: watch::Receiver<bool>,
) {
    debug!(
        subsystem = "jobs",
        component = "pool",
        job_kind = %kind,
        worker = index,
        "Worker started"
    );

    loop {
        if *stop.borrow() {
            break;
        }
        let event = tokio::select! {
            _ = stop.changed() => break,
            event = async { queue.lock().await.recv().await } => match event {
                Some(event) => event,
                None => break,
            },
        };

        let job_id = event.job_id();
        debug!(
            subsystem = "jobs",
            component = "pool",
            job_kind = %kind,
            worker = index,
            job_id = %job_id,
            event = event.name(),
            "Processing job"
        );

        let run = pipeline.clone();
        let task = tokio::spawn(async move { run.run(job_id).await });
        match task.await {
            Ok(Ok(outcome)) => {
                for follow_up in outcome.follow_ups {
                    dispatcher.dispatch(follow_up);
                }
            }
            Ok(Err(e)) => {
                error!(
                    subsystem = "jobs",
                    component = "pool",
                    job_id = %job_id,
                    error = %e,
                    "Pipeline run failed"
                );
            }
            Err(e) => {
                error!(error = ?e, job_id = %job_id, "Job task panicked");
            }
        }
    }

    debug!(
        subsystem = "jobs",
        component = "pool",
        job_kind = %kind,
        worker = index,
        "Worker stopped"
    );
}
