//! `POST /api/voice/transcribe`, `/stop/{file_id}`, and the legacy
//! `status`/`result` endpoints.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::Json;

use meetscribe_core::{FileId, SubmitRequest};

use crate::dto::{
    LegacyResultResponse, LegacyStatusResponse, SegmentDto, SimpleOk, TranscribeRequest,
    TranscribeResponse,
};
use crate::error::HttpError;
use crate::state::AppState;

/// `POST /api/voice/transcribe` — enqueue one or many files for
/// transcription, with the batch & wait semantics of `submit_batch`.
pub async fn transcribe(
    State(state): State<AppState>,
    Json(req): Json<TranscribeRequest>,
) -> Result<Json<TranscribeResponse>, HttpError> {
    let ids = normalize_file_ids(&req)?;
    let language = req.language.unwrap_or(state.config.default_language);
    let hotword = req.hotword.clone().unwrap_or_default();

    let requests: Vec<SubmitRequest> = ids
        .iter()
        .map(|&file_id| SubmitRequest {
            file_id,
            hotword: hotword.clone(),
            language,
        })
        .collect();

    let result = state
        .scheduler
        .submit_batch(requests, req.wait, Duration::from_secs(req.timeout))
        .await;

    // The single-file convenience path: when exactly one file was requested
    // and it reached Completed, inline its segments.
    let transcript = if ids.len() == 1 && result.completed.contains(&ids[0]) {
        state
            .registry
            .get(ids[0])
            .ok()
            .and_then(|rec| rec.segments)
            .map(|segs| segs.iter().map(SegmentDto::from).collect())
    } else {
        None
    };

    let status = if !req.wait {
        "processing"
    } else if result.pending.is_empty() {
        "completed"
    } else {
        "processing"
    };

    Ok(Json(TranscribeResponse {
        success: true,
        status: status.to_string(),
        completed: result.completed,
        failed: result.failed,
        pending: result.pending,
        transcript,
    }))
}

/// Merge the legacy-tolerant `file_id`/`file_ids` pair into an ordered,
/// de-duplicated list.
fn normalize_file_ids(req: &TranscribeRequest) -> Result<Vec<FileId>, HttpError> {
    let mut ids: Vec<FileId> = req.file_ids.clone().unwrap_or_default();
    if let Some(single) = req.file_id {
        if !ids.contains(&single) {
            ids.push(single);
        }
    }
    if ids.is_empty() {
        return Err(HttpError::BadRequest(
            "request must include file_id or file_ids".into(),
        ));
    }
    Ok(ids)
}

/// `POST /api/voice/stop/{file_id}` — set the cancellation flag.
pub async fn stop(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<SimpleOk>, HttpError> {
    state.registry.get(file_id)?;
    state.scheduler.cancel_job(file_id);
    Ok(Json(SimpleOk::ok()))
}

/// `GET /api/voice/status/{file_id}` — legacy status endpoint.
pub async fn legacy_status(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<LegacyStatusResponse>, HttpError> {
    let record = state.registry.get(file_id)?;
    Ok(Json(LegacyStatusResponse {
        success: true,
        status: record.state.as_str(),
        progress: record.progress,
        error_message: record.error_message,
    }))
}

/// `GET /api/voice/result/{file_id}` — legacy result endpoint, including
/// per-word alignment (unlike the transcribe/status responses).
pub async fn legacy_result(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Json<LegacyResultResponse>, HttpError> {
    let record = state.registry.get(file_id)?;
    let transcript = record
        .segments
        .ok_or_else(|| HttpError::BadRequest("no transcript available yet".into()))?;
    Ok(Json(LegacyResultResponse {
        success: true,
        transcript,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetscribe_core::Language;

    fn req_with(file_id: Option<FileId>, file_ids: Option<Vec<FileId>>) -> TranscribeRequest {
        TranscribeRequest {
            file_id,
            file_ids,
            language: Some(Language::Zh),
            hotword: None,
            wait: true,
            timeout: 60,
        }
    }

    #[test]
    fn normalize_rejects_empty_request() {
        let req = req_with(None, None);
        assert!(normalize_file_ids(&req).is_err());
    }

    #[test]
    fn normalize_deduplicates_file_id_against_file_ids() {
        let id = FileId::new();
        let req = req_with(Some(id), Some(vec![id]));
        assert_eq!(normalize_file_ids(&req).unwrap(), vec![id]);
    }

    #[test]
    fn normalize_appends_single_file_id_after_batch() {
        let a = FileId::new();
        let b = FileId::new();
        let req = req_with(Some(b), Some(vec![a]));
        assert_eq!(normalize_file_ids(&req).unwrap(), vec![a, b]);
    }
}
