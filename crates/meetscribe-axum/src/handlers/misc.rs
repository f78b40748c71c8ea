//! `GET /api/voice/languages`, `GET /api/voice/history`, `GET /healthz`.

use axum::extract::State;
use axum::Json;

use meetscribe_core::{FileState, Language};

use crate::dto::{FileListEntry, HealthResponse, HistoryResponse, LanguagesResponse};
use crate::error::HttpError;
use crate::state::AppState;

/// `GET /api/voice/languages` — the closed set accepted by `language`
/// fields across the surface.
pub async fn languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        success: true,
        languages: Language::all().iter().map(|l| l.as_str()).collect(),
    })
}

/// `GET /healthz` — liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// `GET /api/voice/history` — the persisted completed-file record, as
/// written by `HistoryStore::save` rather than the live Registry.
pub async fn history(State(state): State<AppState>) -> Result<Json<HistoryResponse>, HttpError> {
    let files = state
        .history
        .load()
        .iter()
        .filter(|r| r.state == FileState::Completed)
        .map(FileListEntry::from_record)
        .collect();

    Ok(Json(HistoryResponse {
        success: true,
        files,
    }))
}
