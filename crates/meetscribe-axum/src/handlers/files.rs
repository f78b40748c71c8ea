//! `GET /api/voice/files`, `/files/{file_id}`, `PATCH`/`DELETE` on a file,
//! and the legacy `generate_summary` alias.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;

use meetscribe_core::{FileId, FileState, Summary, SubmitRequest};

use crate::dto::{
    download_urls_for, FileDetailQuery, FileDetailResponse, FileListEntry, FileListResponse,
    GenerateSummaryResponse, ListFilesQuery, PaginationDto, PatchAction, PatchFileRequest,
    SegmentDto, SimpleOk, StatisticsDto,
};
use crate::error::HttpError;
use crate::state::AppState;
use meetscribe_core::ListFilter;

/// `GET /api/voice/files` — paginated catalogue with live statistics.
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileListResponse>, HttpError> {
    if query.include_history {
        state.registry.merge_history(state.history.load());
    }

    let filter_state = match &query.status {
        Some(s) => Some(
            s.parse::<FileState>()
                .map_err(|()| HttpError::BadRequest(format!("unknown status '{s}'")))?,
        ),
        None => None,
    };

    let filter = ListFilter {
        state: filter_state,
        limit: query.limit,
        offset: query.offset,
    };
    let result = state.registry.list(&filter);
    let files: Vec<FileListEntry> = result.items.iter().map(FileListEntry::from_record).collect();

    Ok(Json(FileListResponse {
        success: true,
        files,
        statistics: StatisticsDto {
            uploaded: result.statistics.uploaded,
            processing: result.statistics.processing,
            completed: result.statistics.completed,
            error: result.statistics.error,
            total: result.statistics.total(),
        },
        pagination: PaginationDto {
            total_matching: result.total_matching,
            limit: query.limit,
            offset: query.offset,
        },
    }))
}

/// `GET /api/voice/files/{file_id}` — full detail, transcript/summary opt-in.
pub async fn get_file(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
    Query(query): Query<FileDetailQuery>,
) -> Result<Json<FileDetailResponse>, HttpError> {
    let record = state.registry.get(file_id)?;

    let transcript = if query.include_transcript {
        record
            .segments
            .as_ref()
            .map(|segs| segs.iter().map(SegmentDto::from).collect())
    } else {
        None
    };
    let summary = if query.include_summary {
        record.summary.clone()
    } else {
        None
    };

    Ok(Json(FileDetailResponse {
        success: true,
        file_id: record.id,
        original_name: record.original_name,
        size_bytes: record.size_bytes,
        status: record.state.as_str(),
        progress: record.progress,
        language: record.language.as_str(),
        error_message: record.error_message,
        download_urls: download_urls_for(&record),
        transcript,
        summary,
    }))
}

/// `PATCH /api/voice/files/{file_id}` — `retranscribe` or `generate_summary`.
pub async fn patch_file(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
    Json(req): Json<PatchFileRequest>,
) -> Result<Response, HttpError> {
    match req.action {
        PatchAction::Retranscribe => {
            let record = state.registry.get(file_id)?;
            let language = req.language.unwrap_or(record.language);
            let hotword = req.hotword.unwrap_or_default();
            state
                .scheduler
                .submit_one(SubmitRequest {
                    file_id,
                    hotword,
                    language,
                })?;
            Ok(Json(SimpleOk::message("retranscription queued")).into_response())
        }
        PatchAction::GenerateSummary => {
            let summary =
                run_generate_summary(&state, file_id, req.prompt.as_deref(), req.model.as_deref())
                    .await?;
            Ok(Json(GenerateSummaryResponse {
                success: true,
                summary,
            })
            .into_response())
        }
    }
}

/// `POST /api/voice/generate_summary/{file_id}` — legacy alias for the
/// `PATCH .../generate_summary` action, with no prompt/model override.
pub async fn generate_summary_legacy(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<GenerateSummaryResponse>, HttpError> {
    let summary = run_generate_summary(&state, file_id, None, None).await?;
    Ok(Json(GenerateSummaryResponse {
        success: true,
        summary,
    }))
}

/// Run the Summary Orchestrator, then best-effort render a summary document
/// alongside the transcript's. A rendering failure does not fail the
/// request: the summary text itself was already generated and persisted.
async fn run_generate_summary(
    state: &AppState,
    file_id: FileId,
    prompt: Option<&str>,
    model: Option<&str>,
) -> Result<Summary, HttpError> {
    let summary = state.summary.generate(file_id, prompt, model).await?;

    let record = state.registry.get(file_id)?;
    if let Some(segments) = record.segments.as_ref() {
        let out_path = summary_doc_path(&state.config.summaries_dir, file_id);
        if let Ok(path) = state
            .renderer
            .render_summary_doc(segments, &summary.raw_text, &out_path)
            .await
        {
            let _ = state.registry.update(file_id, |r| {
                r.summary_doc_path = Some(path.clone());
            });
        }
    }

    Ok(summary)
}

fn summary_doc_path(dir: &std::path::Path, file_id: FileId) -> std::path::PathBuf {
    let ts = Utc::now().format("%Y%m%d_%H%M%S_%6f");
    dir.join(format!("summary_{ts}_{}.docx", file_id.short()))
}

/// `DELETE /api/voice/files/{file_id}` — the special id `_clear_all` removes
/// every non-processing record instead of a single one.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<SimpleOk>, HttpError> {
    if raw_id == "_clear_all" {
        let removed = state.registry.clear_all_non_processing();
        let count = removed.len();
        for record in &removed {
            remove_artifacts(record).await;
        }
        state.history.clear()?;
        return Ok(Json(SimpleOk::message(format!(
            "cleared {count} file(s)"
        ))));
    }

    let file_id: FileId = raw_id
        .parse()
        .map_err(|_| HttpError::BadRequest(format!("invalid file id '{raw_id}'")))?;
    let record = state.registry.remove(file_id)?;
    remove_artifacts(&record).await;
    Ok(Json(SimpleOk::ok()))
}

/// Best-effort removal of a deleted record's on-disk artifacts (audio,
/// transcript doc, summary doc). A missing file is not an error; a deletion
/// that fails for another reason is logged but never fails the request —
/// the record is already gone from the Registry by the time this runs.
async fn remove_artifacts(record: &meetscribe_core::FileRecord) {
    for path in [
        Some(&record.stored_path),
        record.transcript_doc_path.as_ref(),
        record.summary_doc_path.as_ref(),
    ]
    .into_iter()
    .flatten()
    {
        if let Err(err) = tokio::fs::remove_file(path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(
                    target: "meetscribe.files",
                    path = %path.display(),
                    error = %err,
                    "failed to remove artifact on delete"
                );
            }
        }
    }
}
