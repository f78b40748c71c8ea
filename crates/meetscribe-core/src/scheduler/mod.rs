//! Transcription Scheduler: the bounded worker pool. Accepts job requests,
//! enforces concurrency `W` via a semaphore, dispatches to the external
//! `Transcriber` collaborator, supports cooperative cancellation, persists
//! results, and emits status through the Hub.

mod worker;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, Notify, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::domain::{FileId, FileState, Language};
use crate::error::{CoreError, CoreResult};
use crate::history::HistoryStore;
use crate::hub::Hub;
use crate::ports::{DocRenderer, Normalizer, Transcriber};
use crate::registry::Registry;

pub use worker::{ActiveJob, JobResult, LeaseId, Outcome};
use worker::{Job, JobDeps};

/// Request to enqueue one file for transcription.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub file_id: FileId,
    pub hotword: String,
    pub language: Language,
}

/// Opaque handle returned by `submit`; `cancel()` is idempotent.
#[derive(Clone)]
pub struct JobHandle {
    file_id: FileId,
    cancel: CancellationToken,
}

impl JobHandle {
    #[must_use]
    pub const fn file_id(&self) -> FileId {
        self.file_id
    }

    /// Idempotent: a second call after the job already reached a terminal
    /// state, or after a prior cancel, is a harmless no-op (testable
    /// property 6).
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Partition of a batch submission's outcomes.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub completed: Vec<FileId>,
    pub failed: Vec<FileId>,
    pub pending: Vec<FileId>,
}

pub struct Scheduler {
    registry: Arc<Registry>,
    hub: Arc<Hub>,
    history: Arc<HistoryStore>,
    transcriber: Arc<dyn Transcriber>,
    normalizer: Arc<dyn Normalizer>,
    renderer: Arc<dyn DocRenderer>,
    transcripts_dir: std::path::PathBuf,
    semaphore: Arc<Semaphore>,
    queue: Arc<Mutex<VecDeque<Job>>>,
    notify: Arc<Notify>,
    active: Arc<Mutex<HashMap<FileId, ActiveJob>>>,
    outcomes: broadcast::Sender<JobResult>,
    /// Live `JobHandle`s keyed by file id, so `cancel_job` can find the
    /// token for a job that is still queued or running.
    handles: Arc<Mutex<HashMap<FileId, CancellationToken>>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        hub: Arc<Hub>,
        history: Arc<HistoryStore>,
        transcriber: Arc<dyn Transcriber>,
        normalizer: Arc<dyn Normalizer>,
        renderer: Arc<dyn DocRenderer>,
        transcripts_dir: impl Into<std::path::PathBuf>,
        worker_pool_size: usize,
    ) -> Arc<Self> {
        let (outcomes, _rx) = broadcast::channel(1024);
        let scheduler = Arc::new(Self {
            registry,
            hub,
            history,
            transcriber,
            normalizer,
            renderer,
            transcripts_dir: transcripts_dir.into(),
            semaphore: Arc::new(Semaphore::new(worker_pool_size.max(1))),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            active: Arc::new(Mutex::new(HashMap::new())),
            outcomes,
            handles: Arc::new(Mutex::new(HashMap::new())),
        });
        tokio::spawn(dispatch_loop(scheduler.clone()));
        scheduler
    }

    /// Enqueue a single job. The record becomes externally `Processing`
    /// (progress 0) the instant this call returns, even though the job may
    /// still be waiting in the FIFO queue for a free worker slot — "Pending"
    /// is an internal queue state, never observed outside the scheduler.
    pub fn submit_one(&self, req: SubmitRequest) -> CoreResult<JobHandle> {
        if self.registry.is_processing(req.file_id) {
            return Err(CoreError::conflict(format!(
                "{} is already being processed",
                req.file_id
            )));
        }

        self.registry.update(req.file_id, |r| {
            r.state = FileState::Processing;
            r.progress = 0;
            r.cancelled = false;
            r.error_message.clear();
        })?;
        self.hub.publish(crate::domain::ProgressEvent {
            file_id: req.file_id,
            state: FileState::Processing,
            progress: 0,
            message: "queued".into(),
        });

        let cancel = CancellationToken::new();
        let job = Job {
            file_id: req.file_id,
            hotword: req.hotword,
            language: req.language,
            cancel: cancel.clone(),
            lease: LeaseId::next(),
        };

        self.handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(req.file_id, cancel.clone());
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).push_back(job);
        self.notify.notify_one();

        Ok(JobHandle {
            file_id: req.file_id,
            cancel,
        })
    }

    /// Submit every request in `requests`. If `wait` is `false`, returns
    /// immediately with every file pending. If `wait` is `true`, blocks
    /// until every job reaches a terminal state or `timeout` elapses,
    /// whichever comes first, then partitions the batch.
    pub async fn submit_batch(
        &self,
        requests: Vec<SubmitRequest>,
        wait: bool,
        timeout: Duration,
    ) -> BatchResult {
        let mut pending: Vec<FileId> = Vec::with_capacity(requests.len());
        let mut rejected: Vec<FileId> = Vec::new();
        let mut rx = self.outcomes.subscribe();

        for req in requests {
            let file_id = req.file_id;
            match self.submit_one(req) {
                Ok(_) => pending.push(file_id),
                Err(_) => rejected.push(file_id),
            }
        }

        if !wait {
            let mut result = BatchResult {
                pending,
                ..Default::default()
            };
            result.failed.extend(rejected);
            return result;
        }

        let mut completed = Vec::new();
        let mut failed = rejected;
        let deadline = tokio::time::Instant::now() + timeout;

        while !pending.is_empty() {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, rx.recv()).await {
                Ok(Ok(result)) => {
                    if let Some(pos) = pending.iter().position(|id| *id == result.file_id) {
                        pending.remove(pos);
                        match result.outcome {
                            Outcome::Completed => completed.push(result.file_id),
                            // A cancelled job did not complete; for the batch
                            // response's three-way partition it is reported
                            // alongside `failed` rather than silently dropped,
                            // even though cancellation is not an error from
                            // the single-job error taxonomy's point of view
                            // (see DESIGN.md).
                            Outcome::Error
                            | Outcome::CancelledBeforeStart
                            | Outcome::CancelledDuring => failed.push(result.file_id),
                        }
                    }
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => break,
            }
        }

        BatchResult {
            completed,
            failed,
            pending,
        }
    }

    /// Cancel a job by file id, whether queued or running. Idempotent.
    pub fn cancel_job(&self, file_id: FileId) {
        let token = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&file_id)
            .cloned();
        if let Some(token) = token {
            token.cancel();
        }
        let _ = self.registry.update(file_id, |r| {
            r.cancelled = true;
        });
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

async fn dispatch_loop(scheduler: Arc<Scheduler>) {
    loop {
        let job = scheduler
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        let Some(job) = job else {
            scheduler.notify.notified().await;
            continue;
        };

        let Ok(permit) = scheduler.semaphore.clone().acquire_owned().await else {
            return;
        };

        let deps = JobDeps {
            registry: scheduler.registry.clone(),
            hub: scheduler.hub.clone(),
            history: scheduler.history.clone(),
            transcriber: scheduler.transcriber.clone(),
            normalizer: scheduler.normalizer.clone(),
            renderer: scheduler.renderer.clone(),
            transcripts_dir: scheduler.transcripts_dir.clone(),
            active: scheduler.active.clone(),
        };
        let outcomes = scheduler.outcomes.clone();
        let handles = scheduler.handles.clone();

        tokio::spawn(async move {
            let file_id = job.file_id;
            let result = worker::run_job(job, deps).await;
            handles.lock().unwrap_or_else(|e| e.into_inner()).remove(&file_id);
            let _ = outcomes.send(result);
            drop(permit);
        });
    }
}
