//! `POST /api/voice/upload` — accept one or more `audio_file` multipart
//! parts, validate their extensions, write them to `uploads_dir`, and
//! register a `FileRecord` per file.

use axum::extract::{Multipart, State};
use axum::Json;
use chrono::Utc;

use meetscribe_core::{FileId, FileRecord, ALLOWED_EXTENSIONS};

use crate::dto::{UploadResponse, UploadedFile};
use crate::error::HttpError;
use crate::state::AppState;

const FORM_FIELD_NAME: &str = "audio_file";

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HttpError> {
    let mut uploaded = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some(FORM_FIELD_NAME) {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| HttpError::BadRequest("audio_file part is missing a filename".into()))?;

        let extension = extension_of(&original_name).ok_or_else(|| {
            HttpError::BadRequest(format!("'{original_name}' has no file extension"))
        })?;
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(HttpError::BadRequest(format!(
                "unsupported file extension '.{extension}'; allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| HttpError::BadRequest(format!("reading upload body: {e}")))?;
        let size_bytes = bytes.len() as u64;

        let mut record = FileRecord::new_uploaded(
            original_name.clone(),
            String::new(),
            std::path::PathBuf::new(),
            size_bytes,
            state.config.default_language,
        );
        // The stored name embeds a microsecond timestamp plus the record's
        // own short id suffix so two uploads in the same microsecond never
        // collide.
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let stem = sanitize_stem(&original_name);
        let stored_name = format!("{stem}_{timestamp}_{}.{extension}", record.id.short());
        let stored_path = state.config.uploads_dir.join(&stored_name);

        tokio::fs::write(&stored_path, &bytes)
            .await
            .map_err(|e| HttpError::Internal(format!("writing upload to disk: {e}")))?;

        record.stored_name = stored_name;
        record.stored_path = stored_path;

        let file_id = record.id;
        state.registry.add(record)?;
        uploaded.push(UploadedFile {
            file_id,
            original_name,
            size_bytes,
        });
    }

    if uploaded.is_empty() {
        return Err(HttpError::BadRequest(format!(
            "no '{FORM_FIELD_NAME}' parts found in the upload"
        )));
    }

    let file_ids: Vec<FileId> = uploaded.iter().map(|f| f.file_id).collect();
    let (file, file_id) = if uploaded.len() == 1 {
        (
            Some(UploadedFile {
                file_id: uploaded[0].file_id,
                original_name: uploaded[0].original_name.clone(),
                size_bytes: uploaded[0].size_bytes,
            }),
            Some(uploaded[0].file_id),
        )
    } else {
        (None, None)
    };

    Ok(Json(UploadResponse {
        success: true,
        files: uploaded,
        file_ids,
        file,
        file_id,
    }))
}

fn extension_of(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(str::to_lowercase)
}

/// Keep alphanumerics, `-`, and `_`; collapse everything else (including
/// path separators) so a malicious or accented filename can never escape
/// `uploads_dir` or collide on the filesystem.
fn sanitize_stem(original_name: &str) -> String {
    let stem = std::path::Path::new(original_name)
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("upload");
    let sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.chars().take(80).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_of_is_case_insensitive() {
        assert_eq!(extension_of("Meeting.MP3"), Some("mp3".to_string()));
        assert_eq!(extension_of("noext"), None);
    }

    #[test]
    fn sanitize_stem_strips_unsafe_characters() {
        assert_eq!(sanitize_stem("../../etc/passwd.mp3"), "passwd");
        assert_eq!(sanitize_stem("会议记录 2024.wav"), "2024");
        assert_eq!(sanitize_stem("normal-name_1.flac"), "normal-name_1");
    }
}
