//! `GET /api/voice/audio/{file_id}`, `/download_transcript/{file_id}`, and
//! `/download_summary/{file_id}` — stream artifacts off disk.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use meetscribe_core::FileId;

use crate::error::HttpError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct DownloadQuery {
    /// Tolerates `?download=1` as well as `?download=true`, mirroring
    /// `file_ids`' own loosely-typed tolerance.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub download: bool,
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Str(String),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Str(s) => matches!(s.as_str(), "1" | "true" | "yes"),
    })
}

/// `GET /api/voice/audio/{file_id}` — serve the original upload in place.
pub async fn download_audio(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, HttpError> {
    let record = state.registry.get(file_id)?;
    serve_file(&record.stored_path, &record.original_name, query.download).await
}

/// `GET /api/voice/download_transcript/{file_id}`.
pub async fn download_transcript(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Response, HttpError> {
    let record = state.registry.get(file_id)?;
    let path = record
        .transcript_doc_path
        .ok_or_else(|| HttpError::NotFound("transcript document not generated yet".into()))?;
    let name = format!("transcript_{}.docx", file_id.short());
    serve_file(&path, &name, true).await
}

/// `GET /api/voice/download_summary/{file_id}`.
pub async fn download_summary(
    State(state): State<AppState>,
    Path(file_id): Path<FileId>,
) -> Result<Response, HttpError> {
    let record = state.registry.get(file_id)?;
    let path = record
        .summary_doc_path
        .ok_or_else(|| HttpError::NotFound("summary document not generated yet".into()))?;
    let name = format!("summary_{}.docx", file_id.short());
    serve_file(&path, &name, true).await
}

async fn serve_file(
    path: &std::path::Path,
    download_name: &str,
    force_download: bool,
) -> Result<Response, HttpError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|_| HttpError::NotFound(format!("file missing on disk: {}", path.display())))?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::builder().status(StatusCode::OK);
    if let Some(headers) = response.headers_mut() {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        if force_download {
            let value = format!("attachment; filename=\"{download_name}\"");
            headers.insert(
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&value)
                    .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
            );
        }
    }

    response
        .body(body)
        .map_err(|e| HttpError::Internal(e.to_string()))
}
