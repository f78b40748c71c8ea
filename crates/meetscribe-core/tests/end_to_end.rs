//! End-to-end scenarios against the core engine (Registry + Hub + History +
//! Scheduler wired together), exercised through fake collaborator ports
//! rather than a real ASR runner or renderer.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use meetscribe_core::{
    CancelCheck, DocRenderer, FileId, FileRecord, FileState, HistoryStore, Hub, Language,
    Normalizer, ProgressCb, Registry, RunnerError, Scheduler, Segment, SubmitRequest,
    TranscribeMeta, Transcriber,
};

struct ScriptedTranscriber {
    delay: Duration,
    fail_always: bool,
    fail_once: Option<Arc<AtomicBool>>,
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        _path: &Path,
        _hotword: &str,
        _language: Language,
        cancel: &(dyn CancelCheck),
        progress: &mut (dyn ProgressCb),
    ) -> Result<(Vec<Segment>, TranscribeMeta), RunnerError> {
        progress("decode", 5, "starting");
        tokio::time::sleep(self.delay).await;
        if cancel() {
            return Err(RunnerError::Cancelled);
        }
        if self.fail_always {
            return Err(RunnerError::other("runner crashed"));
        }
        if let Some(flag) = &self.fail_once {
            if !flag.swap(true, Ordering::SeqCst) {
                return Err(RunnerError::other("transient failure"));
            }
        }
        progress("transcribe", 100, "done");
        Ok((
            vec![Segment {
                speaker: "S1".into(),
                text: "hello team".into(),
                start_time: 0.0,
                end_time: 1.5,
                words: None,
            }],
            TranscribeMeta::default(),
        ))
    }
}

struct NoopRenderer;

#[async_trait]
impl DocRenderer for NoopRenderer {
    async fn render_transcript_doc(
        &self,
        _segments: &[Segment],
        _meta: &TranscribeMeta,
        out_path: &Path,
    ) -> Result<std::path::PathBuf, RunnerError> {
        Ok(out_path.to_path_buf())
    }

    async fn render_summary_doc(
        &self,
        _segments: &[Segment],
        _summary_text: &str,
        out_path: &Path,
    ) -> Result<std::path::PathBuf, RunnerError> {
        Ok(out_path.to_path_buf())
    }
}

struct NoopNormalizer;

#[async_trait]
impl Normalizer for NoopNormalizer {
    async fn normalize(&self, path: &Path) -> Result<std::path::PathBuf, RunnerError> {
        Ok(path.to_path_buf())
    }
}

struct Harness {
    scheduler: Arc<Scheduler>,
    registry: Arc<Registry>,
    history: Arc<HistoryStore>,
    hub: Arc<Hub>,
    _dir: tempfile::TempDir,
}

fn harness(transcriber: Arc<dyn Transcriber>, worker_pool_size: usize) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(Registry::new());
    let hub = Arc::new(Hub::new());
    let history = Arc::new(HistoryStore::new(dir.path().join("history.json")));
    let scheduler = Scheduler::new(
        registry.clone(),
        hub.clone(),
        history.clone(),
        transcriber,
        Arc::new(NoopNormalizer),
        Arc::new(NoopRenderer),
        dir.path().to_path_buf(),
        worker_pool_size,
    );
    Harness {
        scheduler,
        registry,
        history,
        hub,
        _dir: dir,
    }
}

fn upload(registry: &Registry, dir: &Path, name: &str) -> FileId {
    let rec = FileRecord::new_uploaded(
        name.to_string(),
        format!("{name}_stored"),
        dir.join(name),
        2048,
        Language::Zh,
    );
    registry.add(rec).unwrap()
}

/// S1 — single-file happy path: upload, transcribe with `wait:true`, expect
/// a completed record with exactly one non-empty segment list.
#[tokio::test]
async fn s1_single_file_happy_path() {
    let h = harness(
        Arc::new(ScriptedTranscriber {
            delay: Duration::from_millis(5),
            fail_always: false,
            fail_once: None,
        }),
        2,
    );
    let dir = h._dir.path().to_path_buf();
    let id = upload(&h.registry, &dir, "meeting.mp3");

    let result = h
        .scheduler
        .submit_batch(
            vec![SubmitRequest {
                file_id: id,
                hotword: String::new(),
                language: Language::Zh,
            }],
            true,
            Duration::from_secs(5),
        )
        .await;

    assert_eq!(result.completed, vec![id]);
    assert!(result.failed.is_empty() && result.pending.is_empty());

    let record = h.registry.get(id).unwrap();
    assert_eq!(record.state, FileState::Completed);
    let segments = record.segments.expect("completed record carries segments");
    assert!(!segments.is_empty());
    assert_eq!(segments[0].speaker, "S1");
}

/// Testable property 2: a session subscribed before the run starts must
/// observe a terminal `Completed` event as the last event for that file —
/// not just a Registry snapshot left behind by the worker.
#[tokio::test]
async fn s1_hub_observes_terminal_completed_event() {
    let h = harness(
        Arc::new(ScriptedTranscriber {
            delay: Duration::from_millis(5),
            fail_always: false,
            fail_once: None,
        }),
        2,
    );
    let dir = h._dir.path().to_path_buf();
    let id = upload(&h.registry, &dir, "meeting.mp3");
    let (_session, mut events) = h.hub.attach();

    h.scheduler
        .submit_batch(
            vec![SubmitRequest {
                file_id: id,
                hotword: String::new(),
                language: Language::Zh,
            }],
            true,
            Duration::from_secs(5),
        )
        .await;

    let mut last = None;
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(1), events.recv()).await
    {
        last = Some(event);
    }
    let last = last.expect("at least one event delivered for this run");
    assert_eq!(last.file_id, id);
    assert_eq!(last.state, FileState::Completed);
    assert_eq!(last.progress, 100);
}

/// S2 (simplified, no HTTP layer) — batch submit of three jobs, cancel the
/// middle one immediately; the other two complete and the cancelled one
/// returns to `Uploaded` with `progress == 0`.
#[tokio::test]
async fn s2_batch_with_cancellation() {
    let h = harness(
        Arc::new(ScriptedTranscriber {
            delay: Duration::from_millis(150),
            fail_always: false,
            fail_once: None,
        }),
        3,
    );
    let dir = h._dir.path().to_path_buf();
    let id1 = upload(&h.registry, &dir, "a.wav");
    let id2 = upload(&h.registry, &dir, "b.wav");
    let id3 = upload(&h.registry, &dir, "c.wav");

    let handle1 = h
        .scheduler
        .submit_one(SubmitRequest {
            file_id: id1,
            hotword: String::new(),
            language: Language::Zh,
        })
        .unwrap();
    let handle2 = h
        .scheduler
        .submit_one(SubmitRequest {
            file_id: id2,
            hotword: String::new(),
            language: Language::Zh,
        })
        .unwrap();
    let handle3 = h
        .scheduler
        .submit_one(SubmitRequest {
            file_id: id3,
            hotword: String::new(),
            language: Language::Zh,
        })
        .unwrap();

    handle2.cancel();

    tokio::time::sleep(Duration::from_millis(350)).await;

    assert_eq!(h.registry.get(id1).unwrap().state, FileState::Completed);
    let rec2 = h.registry.get(id2).unwrap();
    assert_eq!(rec2.state, FileState::Uploaded);
    assert_eq!(rec2.progress, 0);
    assert_eq!(h.registry.get(id3).unwrap().state, FileState::Completed);

    handle1.cancel();
    handle3.cancel();
}

/// S4 — retranscribe after a failure clears the error and completes.
#[tokio::test]
async fn s4_retranscribe_after_error_clears_message() {
    let fail_once = Arc::new(AtomicBool::new(false));
    let h = harness(
        Arc::new(ScriptedTranscriber {
            delay: Duration::from_millis(5),
            fail_always: false,
            fail_once: Some(fail_once),
        }),
        2,
    );
    let dir = h._dir.path().to_path_buf();
    let id = upload(&h.registry, &dir, "meeting.mp3");

    let first = h
        .scheduler
        .submit_batch(
            vec![SubmitRequest {
                file_id: id,
                hotword: String::new(),
                language: Language::Zh,
            }],
            true,
            Duration::from_secs(5),
        )
        .await;
    assert_eq!(first.failed, vec![id]);
    let errored = h.registry.get(id).unwrap();
    assert_eq!(errored.state, FileState::Error);
    assert!(!errored.error_message.is_empty());

    let retry = h
        .scheduler
        .submit_batch(
            vec![SubmitRequest {
                file_id: id,
                hotword: String::new(),
                language: Language::Zh,
            }],
            true,
            Duration::from_secs(5),
        )
        .await;
    assert_eq!(retry.completed, vec![id]);
    let completed = h.registry.get(id).unwrap();
    assert_eq!(completed.state, FileState::Completed);
    assert!(completed.error_message.is_empty());
}

/// S5 — history round-trip: completed jobs persist and reload as a fresh
/// `Registry`'s merged history, simulating a process restart.
#[tokio::test]
async fn s5_history_round_trips_across_restart() {
    let h = harness(
        Arc::new(ScriptedTranscriber {
            delay: Duration::from_millis(5),
            fail_always: false,
            fail_once: None,
        }),
        2,
    );
    let dir = h._dir.path().to_path_buf();
    let id1 = upload(&h.registry, &dir, "one.mp3");
    let id2 = upload(&h.registry, &dir, "two.mp3");

    let result = h
        .scheduler
        .submit_batch(
            vec![
                SubmitRequest {
                    file_id: id1,
                    hotword: String::new(),
                    language: Language::Zh,
                },
                SubmitRequest {
                    file_id: id2,
                    hotword: String::new(),
                    language: Language::Zh,
                },
            ],
            true,
            Duration::from_secs(5),
        )
        .await;
    assert_eq!(result.completed.len(), 2);

    h.history.save(&h.registry.completed_snapshot()).unwrap();

    // Simulate a restart: a brand-new Registry merging the reloaded history.
    let restarted = Registry::new();
    restarted.merge_history(h.history.load());

    let reloaded1 = restarted.get(id1).unwrap();
    let reloaded2 = restarted.get(id2).unwrap();
    assert_eq!(reloaded1.state, FileState::Completed);
    assert_eq!(reloaded2.state, FileState::Completed);
    assert!(reloaded1.segments.is_some());
    assert!(reloaded2.segments.is_some());
}
