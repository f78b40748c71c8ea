//! Smart Progress Tracker: turns sparse, bursty worker progress updates into
//! a smooth, monotone, dense `ProgressEvent` stream published through the
//! Hub, without ever blocking the worker that calls `set_target`.
//!
//! One Tracker instance per job: `spawn` starts a background interpolation
//! task over a `watch` channel (latest-wins) and hands back a cheap handle.
//! The task tears itself down when the handle is dropped (the channel
//! closes) or when a terminal signal is set, whichever comes first — it
//! never outlives its job.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::domain::{FileId, FileState};
use crate::hub::EventSink;

const MIN_STEP_MILLIS: u64 = 50;
const MAX_STEP_MILLIS: u64 = 500;
const DRAIN_STEP_MILLIS: u64 = 2;

#[derive(Debug, Clone)]
enum Mode {
    /// Interpolate `current` toward `target` in 1% steps.
    Interpolate { target: u8, eta_millis: Option<u64> },
    /// Fast-drain toward 100 then emit `Completed`.
    Drain,
    /// Emit one terminal event immediately and stop. `progress: None` means
    /// "use whatever `current` has reached" (the Error case, which does not
    /// reset progress).
    Terminal {
        progress: Option<u8>,
        state: FileState,
    },
}

#[derive(Debug, Clone)]
struct Shared {
    mode: Mode,
    message: String,
}

/// A cheap, cloneable handle a worker holds to drive its job's Tracker.
/// `set_target`/`complete`/`cancel`/`fail` never block.
#[derive(Clone)]
pub struct Tracker {
    tx: watch::Sender<Shared>,
}

impl Tracker {
    /// Spawn the background interpolation task for `file_id`, publishing
    /// through `sink`. Returns the handle; dropping every clone of the
    /// handle tears the task down.
    pub fn spawn(file_id: FileId, sink: Arc<dyn EventSink>) -> Self {
        let (tx, rx) = watch::channel(Shared {
            mode: Mode::Interpolate {
                target: 0,
                eta_millis: None,
            },
            message: String::new(),
        });
        tokio::spawn(run(file_id, sink, rx));
        Self { tx }
    }

    /// Declare a new target; called by the worker on each raw progress
    /// callback from the runner.
    pub fn set_target(
        &self,
        target: u8,
        message: impl Into<String>,
        eta_millis: Option<u64>,
    ) {
        self.tx.send_modify(|s| {
            s.mode = Mode::Interpolate {
                target: target.min(100),
                eta_millis,
            };
            s.message = message.into();
        });
    }

    /// The job succeeded: fast-drain any remaining percentage then emit
    /// exactly one `Completed` event at 100.
    pub fn complete(&self) {
        let _ = self.tx.send(Shared {
            mode: Mode::Drain,
            message: String::new(),
        });
    }

    /// The job was cancelled: emit one terminal `Uploaded` event at
    /// progress 0 and stop.
    pub fn cancelled(&self) {
        let _ = self.tx.send(Shared {
            mode: Mode::Terminal {
                progress: Some(0),
                state: FileState::Uploaded,
            },
            message: "cancelled".into(),
        });
    }

    /// The job failed for a non-cancellation reason: emit one terminal
    /// `Error` event at the current progress and stop.
    pub fn failed(&self, message: impl Into<String>) {
        let _ = self.tx.send(Shared {
            mode: Mode::Terminal {
                progress: None,
                state: FileState::Error,
            },
            message: message.into(),
        });
    }
}

async fn run(file_id: FileId, sink: Arc<dyn EventSink>, mut rx: watch::Receiver<Shared>) {
    let mut current: u8 = 0;
    let mut last_emitted: Option<(u8, FileState)> = None;

    let mut emit = |progress: u8, state: FileState, message: &str| {
        if last_emitted != Some((progress, state)) {
            sink.publish(crate::domain::ProgressEvent {
                file_id,
                state,
                progress,
                message: message.to_string(),
            });
            last_emitted = Some((progress, state));
        }
    };

    loop {
        let shared = rx.borrow_and_update().clone();
        match shared.mode {
            Mode::Terminal { progress, state } => {
                emit(progress.unwrap_or(current), state, &shared.message);
                return;
            }
            Mode::Drain => {
                if current < 100 {
                    current += 1;
                    emit(current, FileState::Processing, &shared.message);
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_millis(DRAIN_STEP_MILLIS)) => {}
                        changed = rx.changed() => { if changed.is_err() { return; } }
                    }
                } else {
                    emit(100, FileState::Completed, &shared.message);
                    return;
                }
            }
            Mode::Interpolate { target, eta_millis } => {
                if current < target {
                    current += 1;
                    emit(current, FileState::Processing, &shared.message);
                    let remaining = u64::from(target - current).max(1);
                    let step_millis = eta_millis
                        .map_or(MIN_STEP_MILLIS, |eta| eta / remaining)
                        .clamp(MIN_STEP_MILLIS, MAX_STEP_MILLIS);
                    tokio::select! {
                        () = tokio::time::sleep(Duration::from_millis(step_millis)) => {}
                        changed = rx.changed() => { if changed.is_err() { return; } }
                    }
                } else if rx.changed().await.is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProgressEvent;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl EventSink for RecordingSink {
        fn publish(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interpolates_monotonically_toward_target() {
        let sink = Arc::new(RecordingSink::default());
        let file_id = FileId::new();
        let tracker = Tracker::spawn(file_id, sink.clone());

        tracker.set_target(10, "working", Some(100));
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let events = sink.events.lock().unwrap();
        let progresses: Vec<u8> = events.iter().map(|e| e.progress).collect();
        assert!(progresses.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progresses.last().copied(), Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn flapping_targets_never_regress_the_emitted_sequence() {
        let sink = Arc::new(RecordingSink::default());
        let file_id = FileId::new();
        let tracker = Tracker::spawn(file_id, sink.clone());

        // Simulates S3: runner emits 5, 40, 30, 70, 100. The 30 must not
        // cause a visible regression since the Tracker only steps upward.
        for raw in [5, 40, 30, 70] {
            tracker.set_target(raw, "stage", Some(50));
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        tracker.complete();
        tokio::time::sleep(Duration::from_millis(500)).await;

        let events = sink.events.lock().unwrap();
        let progresses: Vec<u8> = events.iter().map(|e| e.progress).collect();
        assert!(progresses.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progresses.last().copied(), Some(100));
        assert_eq!(events.last().unwrap().state, FileState::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_emits_single_terminal_event() {
        let sink = Arc::new(RecordingSink::default());
        let file_id = FileId::new();
        let tracker = Tracker::spawn(file_id, sink.clone());
        tracker.set_target(40, "working", Some(200));
        tokio::time::sleep(Duration::from_millis(200)).await;
        tracker.cancelled();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = sink.events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.state, FileState::Uploaded);
        assert_eq!(last.progress, 0);
    }
}
