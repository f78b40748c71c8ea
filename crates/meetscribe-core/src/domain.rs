//! Domain types shared by every component: the unit of work (`FileRecord`),
//! its sub-parts (`Segment`, `Word`, `Summary`), and the wire-shaped
//! `ProgressEvent` the Tracker hands to the Hub.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque 128-bit identifier, unique for the process lifetime plus history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 hex characters, used as the uniqueness suffix in artifact
    /// filenames.
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Recognition language, a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Language {
    Zh,
    ZhEn,
    ZhDialect,
    En,
}

impl Language {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::ZhEn => "zh-en",
            Self::ZhDialect => "zh-dialect",
            Self::En => "en",
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Zh, Self::ZhDialect, Self::ZhEn, Self::En]
    }
}

impl std::str::FromStr for Language {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zh" => Ok(Self::Zh),
            "zh-en" => Ok(Self::ZhEn),
            "zh-dialect" => Ok(Self::ZhDialect),
            "en" => Ok(Self::En),
            _ => Err(()),
        }
    }
}

/// Lifecycle state of a `FileRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Uploaded,
    Processing,
    Completed,
    Error,
}

impl FileState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Sort priority used by `GET /files`: `processing > uploaded > completed > error`.
    #[must_use]
    pub const fn list_priority(self) -> u8 {
        match self {
            Self::Processing => 0,
            Self::Uploaded => 1,
            Self::Completed => 2,
            Self::Error => 3,
        }
    }
}

impl std::str::FromStr for FileState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

/// A sub-segment carrying per-word alignment, covering part of a `Segment`'s text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A speaker-attributed, timestamped utterance produced by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub speaker: String,
    pub text: String,
    #[serde(rename = "start_time")]
    pub start_time: f64,
    #[serde(rename = "end_time")]
    pub end_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
}

/// One of the three configured LLM backends, or the deterministic fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKey {
    Deepseek,
    Qwen,
    Glm,
}

impl ModelKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deepseek => "deepseek",
            Self::Qwen => "qwen",
            Self::Glm => "glm",
        }
    }
}

impl std::str::FromStr for ModelKey {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deepseek" => Ok(Self::Deepseek),
            "qwen" => Ok(Self::Qwen),
            "glm" => Ok(Self::Glm),
            _ => Err(()),
        }
    }
}

/// Result of the Summary Orchestrator's LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub raw_text: String,
    pub generated_at: DateTime<Utc>,
    /// `"deepseek"`, `"qwen"`, `"glm"`, or `"default_template"` when no API
    /// key is configured.
    pub model_key: String,
    pub status: SummaryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Success,
    Error,
}

/// The unit of work and of retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub size_bytes: u64,
    pub upload_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complete_time: Option<DateTime<Utc>>,
    pub state: FileState,
    /// 0..=100, monotone non-decreasing while `state != Error`.
    pub progress: u8,
    pub language: Language,
    #[serde(default)]
    pub error_message: String,
    /// Set by stop requests; read cooperatively by the running worker.
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<Segment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_doc_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_doc_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
}

impl FileRecord {
    /// Build a freshly-uploaded record. `stored_name` must already embed the
    /// microsecond timestamp plus the `id`'s short suffix so it never
    /// collides with another upload.
    #[must_use]
    pub fn new_uploaded(
        original_name: String,
        stored_name: String,
        stored_path: PathBuf,
        size_bytes: u64,
        language: Language,
    ) -> Self {
        Self {
            id: FileId::new(),
            original_name,
            stored_name,
            stored_path,
            size_bytes,
            upload_time: Utc::now(),
            complete_time: None,
            state: FileState::Uploaded,
            progress: 0,
            language,
            error_message: String::new(),
            cancelled: false,
            segments: None,
            transcript_doc_path: None,
            summary_doc_path: None,
            summary: None,
        }
    }
}

/// Emitted by the Tracker, consumed by the Hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub file_id: FileId,
    pub state: FileState,
    pub progress: u8,
    pub message: String,
}
