//! Wire-format request/response bodies for the Request Surface. These types
//! exist only to serialise; the domain types in `meetscribe_core` remain the
//! source of truth.

use serde::{Deserialize, Serialize};

use meetscribe_core::{FileId, FileRecord, FileState, Language, Segment, Summary};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub files: Vec<UploadedFile>,
    pub file_ids: Vec<FileId>,
    /// Present only when exactly one file was uploaded (backward compatibility).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<UploadedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFile {
    pub file_id: FileId,
    pub original_name: String,
    pub size_bytes: u64,
}

fn deserialize_file_ids<'de, D>(deserializer: D) -> Result<Vec<FileId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        List(Vec<FileId>),
        CsvString(String),
    }

    match Flexible::deserialize(deserializer)? {
        Flexible::List(ids) => Ok(ids),
        Flexible::CsvString(raw) => {
            // Tolerate both a JSON-encoded list-as-string and a literal
            // comma-separated list for `file_ids`.
            if let Ok(ids) = serde_json::from_str::<Vec<FileId>>(&raw) {
                return Ok(ids);
            }
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<FileId>().map_err(serde::de::Error::custom))
                .collect()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TranscribeRequest {
    pub file_id: Option<FileId>,
    #[serde(default, deserialize_with = "deserialize_optional_file_ids")]
    pub file_ids: Option<Vec<FileId>>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub hotword: Option<String>,
    #[serde(default = "default_true")]
    pub wait: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout: u64,
}

fn deserialize_optional_file_ids<'de, D>(
    deserializer: D,
) -> Result<Option<Vec<FileId>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Maybe {
        Some(#[serde(deserialize_with = "deserialize_via_flexible")] Vec<FileId>),
        None,
    }

    fn deserialize_via_flexible<'d, D2>(d: D2) -> Result<Vec<FileId>, D2::Error>
    where
        D2: serde::Deserializer<'d>,
    {
        deserialize_file_ids(d)
    }

    Ok(match Maybe::deserialize(deserializer)? {
        Maybe::Some(v) => Some(v),
        Maybe::None => None,
    })
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub success: bool,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub completed: Vec<FileId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FileId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<FileId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<SegmentDto>>,
}

#[derive(Debug, Serialize)]
pub struct SegmentDto {
    pub speaker: String,
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

impl From<&Segment> for SegmentDto {
    fn from(s: &Segment) -> Self {
        Self {
            speaker: s.speaker.clone(),
            text: s.text.clone(),
            start_time: s.start_time,
            end_time: s.end_time,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LegacyStatusResponse {
    pub success: bool,
    pub status: &'static str,
    pub progress: u8,
    pub error_message: String,
}

#[derive(Debug, Serialize)]
pub struct LegacyResultResponse {
    pub success: bool,
    pub transcript: Vec<Segment>,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrls {
    pub audio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileListEntry {
    pub file_id: FileId,
    pub original_name: String,
    pub size_bytes: u64,
    pub upload_time: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_time: Option<chrono::DateTime<chrono::Utc>>,
    pub status: &'static str,
    pub progress: u8,
    pub language: &'static str,
    pub download_urls: DownloadUrls,
}

impl FileListEntry {
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            file_id: record.id,
            original_name: record.original_name.clone(),
            size_bytes: record.size_bytes,
            upload_time: record.upload_time,
            complete_time: record.complete_time,
            status: record.state.as_str(),
            progress: record.progress,
            language: record.language.as_str(),
            download_urls: download_urls_for(record),
        }
    }
}

/// Build client-usable URLs only; raw server paths must never be exposed.
#[must_use]
pub fn download_urls_for(record: &FileRecord) -> DownloadUrls {
    DownloadUrls {
        audio: format!("/api/voice/audio/{}", record.id),
        transcript: record
            .transcript_doc_path
            .as_ref()
            .map(|_| format!("/api/voice/download_transcript/{}", record.id)),
        summary: record
            .summary_doc_path
            .as_ref()
            .map(|_| format!("/api/voice/download_summary/{}", record.id)),
    }
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileListEntry>,
    pub statistics: StatisticsDto,
    pub pagination: PaginationDto,
}

#[derive(Debug, Serialize)]
pub struct StatisticsDto {
    pub uploaded: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct PaginationDto {
    pub total_matching: usize,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListFilesQuery {
    pub status: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub include_history: bool,
}

#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    pub success: bool,
    pub file_id: FileId,
    pub original_name: String,
    pub size_bytes: u64,
    pub status: &'static str,
    pub progress: u8,
    pub language: &'static str,
    pub error_message: String,
    pub download_urls: DownloadUrls,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<SegmentDto>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

#[derive(Debug, Deserialize, Default)]
pub struct FileDetailQuery {
    #[serde(default)]
    pub include_transcript: bool,
    #[serde(default)]
    pub include_summary: bool,
}

#[derive(Debug, Deserialize)]
pub struct PatchFileRequest {
    pub action: PatchAction,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub hotword: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchAction {
    Retranscribe,
    GenerateSummary,
}

#[derive(Debug, Serialize)]
pub struct SimpleOk {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SimpleOk {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    #[must_use]
    pub fn message(msg: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(msg.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateSummaryResponse {
    pub success: bool,
    pub summary: Summary,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub files: Vec<FileListEntry>,
}

#[derive(Debug, Serialize)]
pub struct LanguagesResponse {
    pub success: bool,
    pub languages: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct WsConnectedMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsClientMessage {
    Subscribe { file_id: FileId },
    Unsubscribe { file_id: FileId },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerMessage {
    Connected,
    Subscribed {
        file_id: FileId,
    },
    Unsubscribed {
        file_id: FileId,
    },
    FileStatus {
        file_id: FileId,
        status: FileState,
        progress: u8,
        message: String,
    },
}
