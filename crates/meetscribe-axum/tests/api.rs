//! HTTP-level integration tests against the Request Surface, wired to fake
//! collaborator ports instead of a real transcriber/LLM process (the same
//! fake-port idea as `meetscribe-core`'s `tests/end_to_end.rs`, exercised
//! through the full router).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use meetscribe_axum::bootstrap::{AxumContext, CorsConfig};
use meetscribe_axum::routes::create_router;
use meetscribe_core::{
    CancelCheck, Config, DocRenderer, FileId, FileRecord, FileState, HistoryStore, Hub, Language,
    ProgressCb, Registry, RunnerError, Scheduler, Segment, SummaryOrchestrator, TranscribeMeta,
    Transcriber,
};

struct SlowTranscriber {
    delay: Duration,
}

#[async_trait]
impl Transcriber for SlowTranscriber {
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
        Ok((
            vec![Segment {
                speaker: "S1".into(),
                text: "hi".into(),
                start_time: 0.0,
                end_time: 1.0,
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

struct TestContext {
    ctx: AxumContext,
    registry: Arc<Registry>,
    dir: tempfile::TempDir,
}

fn test_context(delay: Duration) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_defaults(dir.path());
    config.ensure_dirs().unwrap();

    let registry = Arc::new(Registry::new());
    let hub = Arc::new(Hub::new());
    let history = Arc::new(HistoryStore::new(config.history_path.clone()));
    let renderer: Arc<dyn DocRenderer> = Arc::new(NoopRenderer);
    let normalizer = Arc::new(meetscribe_axum::adapters::PassthroughNormalizer);
    let scheduler = Scheduler::new(
        registry.clone(),
        hub.clone(),
        history.clone(),
        Arc::new(SlowTranscriber { delay }),
        normalizer,
        renderer.clone(),
        config.transcripts_dir.clone(),
        4,
    );
    let llm = Arc::new(meetscribe_axum::adapters::HttpLlm::new(Default::default()));
    let summary = Arc::new(SummaryOrchestrator::new(registry.clone(), llm));

    let ctx = AxumContext {
        registry: registry.clone(),
        hub,
        history,
        scheduler,
        summary,
        renderer,
        config,
    };

    TestContext { ctx, registry, dir }
}

fn upload_record(registry: &Registry, dir: &Path, name: &str) -> FileId {
    let rec = FileRecord::new_uploaded(
        name.to_string(),
        format!("{name}_stored"),
        dir.join(name),
        4096,
        Language::Zh,
    );
    registry.add(rec).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// S6 — delete guard: a file mid-processing (not cancelled) is rejected with
/// a 4xx; after `/stop`, the same delete succeeds.
#[tokio::test]
async fn s6_delete_guard_then_succeeds_after_stop() {
    let t = test_context(Duration::from_millis(300));
    let id = upload_record(&t.registry, t.dir.path(), "meeting.mp3");
    let registry = t.registry.clone();
    let app = create_router(t.ctx, &CorsConfig::AllowAll);

    // Start processing directly through the transcribe handler.
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/voice/transcribe")
                .header("content-type", "application/json")
                .body(Body::from(format!(
                    r#"{{"file_ids":["{id}"],"language":"zh","wait":false}}"#
                )))
                .unwrap(),
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(registry.get(id).unwrap().state, FileState::Processing);

    let delete_while_processing = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/voice/files/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(delete_while_processing.status().is_client_error());

    let stop = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/voice/stop/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(stop.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let delete_after_stop = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/voice/files/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete_after_stop.status(), StatusCode::OK);
}

/// A basic list/health smoke test: `/healthz` and an empty file list respond
/// successfully with the expected JSON shape.
#[tokio::test]
async fn health_and_empty_list_respond() {
    let t = test_context(Duration::from_millis(10));
    let app = create_router(t.ctx, &CorsConfig::AllowAll);

    let health = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let list = app
        .oneshot(
            Request::builder()
                .uri("/api/voice/files")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(list.status(), StatusCode::OK);
    let json = body_json(list).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["files"].as_array().unwrap().len(), 0);
}

/// Deleting a record also removes its on-disk artifact, not just the
/// Registry entry (spec requires both).
#[tokio::test]
async fn delete_removes_stored_artifact_from_disk() {
    let t = test_context(Duration::from_millis(10));
    let stored_path = t.dir.path().join("meeting.mp3");
    std::fs::write(&stored_path, b"not-really-audio-bytes").unwrap();
    let id = upload_record(&t.registry, t.dir.path(), "meeting.mp3");
    let app = create_router(t.ctx, &CorsConfig::AllowAll);

    assert!(stored_path.exists());

    let delete = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/voice/files/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(delete.status(), StatusCode::OK);
    assert!(!stored_path.exists());
}

/// Upload via multipart, then fetch it back through `/files/{id}`.
#[tokio::test]
async fn upload_then_fetch_detail() {
    let t = test_context(Duration::from_millis(10));
    let app = create_router(t.ctx, &CorsConfig::AllowAll);

    let boundary = "test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"audio_file\"; filename=\"meeting.mp3\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: audio/mpeg\r\n\r\n");
    body.extend_from_slice(b"not-really-audio-bytes");
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let upload = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/voice/upload")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);
    let upload_json = body_json(upload).await;
    assert_eq!(upload_json["success"], true);
    let file_id = upload_json["file_id"].as_str().unwrap().to_string();

    let detail = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/voice/files/{file_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(detail.status(), StatusCode::OK);
    let detail_json = body_json(detail).await;
    assert_eq!(detail_json["status"], "uploaded");
}
