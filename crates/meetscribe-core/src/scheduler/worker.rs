//! Scheduler worker pipeline: the per-job algorithm, isolated from the
//! dispatch loop in `mod.rs`. The worker operates on value types and
//! cloned `Arc` dependencies with no access to the dispatcher's queue
//! lock.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::domain::{FileId, FileState, Language, ProgressEvent};
use crate::history::HistoryStore;
use crate::hub::{EventSink, Hub};
use crate::ports::{DocRenderer, Normalizer, RunnerError, Transcriber};
use crate::registry::Registry;
use crate::tracker::Tracker;

/// Mirrors every `ProgressEvent` the Tracker emits onto the `FileRecord`'s
/// `progress`/`state` fields before forwarding to the Hub, so polling
/// endpoints (`GET /status`, `GET /files`) see the same live progress that
/// subscribed WS sessions do — without this, `FileRecord::progress` would
/// only ever be 0 or the terminal value, since the worker itself only
/// touches the Registry at job start and at the very end.
///
/// Only mutates while the record is still `Processing`: the worker commits
/// the authoritative `Completed` transition itself (it also attaches
/// `segments`/`transcript_doc_path`, which this sink has no access to), and
/// a record that already reached a terminal state must not be re-opened by
/// a late, racing tick from the tracker's drain phase.
struct RegistrySink {
    registry: Arc<Registry>,
    hub: Arc<Hub>,
}

impl EventSink for RegistrySink {
    fn publish(&self, event: ProgressEvent) {
        let _ = self.registry.update(event.file_id, |r| {
            if r.state != FileState::Processing {
                return;
            }
            match event.state {
                FileState::Processing => {
                    if event.progress > r.progress {
                        r.progress = event.progress;
                    }
                }
                FileState::Uploaded => {
                    r.state = FileState::Uploaded;
                    r.progress = 0;
                    r.cancelled = false;
                    r.error_message.clear();
                }
                FileState::Error => {
                    r.state = FileState::Error;
                    r.error_message = event.message.clone();
                }
                // The worker commits Completed itself, with segments attached.
                FileState::Completed => {}
            }
        });
        self.hub.publish(event);
    }
}

/// Monotonic generation id minted per dequeue, verified before a job's
/// result is committed to the Registry. Prevents a superseded attempt
/// (cancel-then-retranscribe) from clobbering a newer one's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseId(u64);

static NEXT_LEASE: AtomicU64 = AtomicU64::new(1);

impl LeaseId {
    pub fn next() -> Self {
        Self(NEXT_LEASE.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct ActiveJob {
    pub cancel: CancellationToken,
    pub lease: LeaseId,
}

/// A queued transcription job. Created by `Scheduler::submit`, consumed by
/// the dispatch loop in `mod.rs`.
pub struct Job {
    pub file_id: FileId,
    pub hotword: String,
    pub language: Language,
    pub cancel: CancellationToken,
    pub lease: LeaseId,
}

/// Dependencies cloned into every spawned job task.
#[derive(Clone)]
pub struct JobDeps {
    pub registry: Arc<Registry>,
    pub hub: Arc<Hub>,
    pub history: Arc<HistoryStore>,
    pub transcriber: Arc<dyn Transcriber>,
    pub normalizer: Arc<dyn Normalizer>,
    pub renderer: Arc<dyn DocRenderer>,
    pub transcripts_dir: PathBuf,
    pub active: Arc<Mutex<std::collections::HashMap<FileId, ActiveJob>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Error,
    CancelledBeforeStart,
    CancelledDuring,
}

#[derive(Debug, Clone, Copy)]
pub struct JobResult {
    pub file_id: FileId,
    pub outcome: Outcome,
}

/// Run one job to a terminal state. Never panics on collaborator failure;
/// every path ends in a `JobResult`.
pub async fn run_job(job: Job, deps: JobDeps) -> JobResult {
    let Job {
        file_id,
        hotword,
        language,
        cancel,
        lease,
    } = job;

    // Step 1: a cancel requested before the worker pool picked this job up.
    if cancel.is_cancelled() || is_cancel_flagged(&deps, file_id) {
        cancel_before_start(&deps, file_id);
        return JobResult {
            file_id,
            outcome: Outcome::CancelledBeforeStart,
        };
    }

    deps.active.lock().unwrap_or_else(|e| e.into_inner()).insert(
        file_id,
        ActiveJob {
            cancel: cancel.clone(),
            lease,
        },
    );

    let sink: Arc<dyn EventSink> = Arc::new(RegistrySink {
        registry: deps.registry.clone(),
        hub: deps.hub.clone(),
    });
    let tracker = Tracker::spawn(file_id, sink);

    let stored_path = match deps.registry.get(file_id) {
        Ok(rec) => rec.stored_path.clone(),
        Err(_) => {
            finish(&deps, file_id, lease);
            return JobResult {
                file_id,
                outcome: Outcome::Error,
            };
        }
    };

    // Pre-processing: normalize to 16 kHz mono WAV (a no-op for adapters
    // whose transcriber already handles arbitrary input). Runs before the
    // transcriber ever sees the file, and its failure is a job error like
    // any other collaborator failure.
    let stored_path = match deps.normalizer.normalize(&stored_path).await {
        Ok(path) => path,
        Err(err) => {
            let message = err.to_string();
            tracker.failed(message.clone());
            mark_error(&deps, file_id, message);
            finish(&deps, file_id, lease);
            return JobResult {
                file_id,
                outcome: Outcome::Error,
            };
        }
    };

    let cancel_check_token = cancel.clone();
    let cancel_check_registry = deps.registry.clone();
    let cancel_check = move || {
        cancel_check_token.is_cancelled() || is_cancel_flagged_ref(&cancel_check_registry, file_id)
    };

    let tracker_for_cb = tracker.clone();
    let mut progress_cb = move |_stage: &str, progress: u8, message: &str| {
        tracker_for_cb.set_target(progress, message, None);
    };

    let transcribe_fut = deps.transcriber.transcribe(
        &stored_path,
        &hotword,
        language,
        &cancel_check,
        &mut progress_cb,
    );

    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RunnerError::Cancelled),
        r = transcribe_fut => r,
    };

    let outcome = match result {
        Err(RunnerError::Cancelled) => {
            tracker.cancelled();
            reset_to_uploaded(&deps, file_id);
            Outcome::CancelledDuring
        }
        Err(RunnerError::Other(message)) if cancel.is_cancelled() => {
            // The runner raced past the cancellation without observing it;
            // discard the failure and honour the cancel.
            let _ = message;
            tracker.cancelled();
            reset_to_uploaded(&deps, file_id);
            Outcome::CancelledDuring
        }
        Err(RunnerError::Other(message)) => {
            tracker.failed(message.clone());
            mark_error(&deps, file_id, message);
            Outcome::Error
        }
        Ok((_segments, _meta)) if cancel.is_cancelled() => {
            tracker.cancelled();
            reset_to_uploaded(&deps, file_id);
            Outcome::CancelledDuring
        }
        Ok((segments, meta)) => {
            let out_path = transcript_doc_path(&deps.transcripts_dir, file_id);
            match deps
                .renderer
                .render_transcript_doc(&segments, &meta, &out_path)
                .await
            {
                Ok(path) => {
                    let completed_at = Utc::now();
                    let _ = deps.registry.update(file_id, |r| {
                        r.segments = Some(segments.clone());
                        r.transcript_doc_path = Some(path.clone());
                        r.state = FileState::Completed;
                        r.progress = 100;
                        r.complete_time = Some(completed_at);
                        r.error_message.clear();
                    });
                    tracker.complete();
                    // The Tracker's drain task races its own teardown against
                    // this function returning (and dropping every Tracker
                    // sender, which closes its watch channel and can cut the
                    // drain off before it reaches 100). Publish the terminal
                    // event ourselves so the Hub always sees exactly one
                    // Completed event for this run, mirroring
                    // `cancel_before_start`'s explicit terminal publish.
                    deps.hub.publish(crate::domain::ProgressEvent {
                        file_id,
                        state: FileState::Completed,
                        progress: 100,
                        message: "completed".into(),
                    });
                    deps.history.save(&deps.registry.completed_snapshot()).ok();
                    Outcome::Completed
                }
                Err(err) => {
                    let message = err.to_string();
                    tracker.failed(message.clone());
                    mark_error(&deps, file_id, message);
                    Outcome::Error
                }
            }
        }
    };

    finish(&deps, file_id, lease);
    JobResult { file_id, outcome }
}

fn transcript_doc_path(dir: &std::path::Path, file_id: FileId) -> PathBuf {
    let ts = Utc::now().format("%Y%m%d_%H%M%S_%6f");
    dir.join(format!("transcript_{ts}_{}.docx", file_id.short()))
}

fn is_cancel_flagged(deps: &JobDeps, file_id: FileId) -> bool {
    deps.registry.get(file_id).map(|r| r.cancelled).unwrap_or(true)
}

fn is_cancel_flagged_ref(registry: &Registry, file_id: FileId) -> bool {
    registry.get(file_id).map(|r| r.cancelled).unwrap_or(true)
}

fn cancel_before_start(deps: &JobDeps, file_id: FileId) {
    let _ = deps.registry.update(file_id, |r| {
        r.state = FileState::Uploaded;
        r.progress = 0;
        r.cancelled = false;
        r.error_message.clear();
    });
    deps.hub.publish(crate::domain::ProgressEvent {
        file_id,
        state: FileState::Uploaded,
        progress: 0,
        message: "cancelled before start".into(),
    });
}

fn reset_to_uploaded(deps: &JobDeps, file_id: FileId) {
    let _ = deps.registry.update(file_id, |r| {
        r.state = FileState::Uploaded;
        r.progress = 0;
        r.cancelled = false;
        r.error_message.clear();
    });
}

fn mark_error(deps: &JobDeps, file_id: FileId, message: String) {
    let _ = deps.registry.update(file_id, |r| {
        r.state = FileState::Error;
        r.error_message = message.clone();
    });
}

/// Remove this job from the active map, but only if `lease` still matches —
/// a stale task whose job was superseded must not evict the newer entry.
fn finish(deps: &JobDeps, file_id: FileId, lease: LeaseId) {
    let mut active = deps.active.lock().unwrap_or_else(|e| e.into_inner());
    if active.get(&file_id).map(|a| a.lease) == Some(lease) {
        active.remove(&file_id);
    }
}
