//! Core engine configuration. Uses a `with_defaults()` / `with_*` builder
//! pattern; environment overrides are applied by the caller (the
//! composition root), not read here.

use std::path::PathBuf;

/// File extensions the upload endpoint accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "flac", "aac", "ogg", "wma"];

#[derive(Debug, Clone)]
pub struct Config {
    /// Bounded worker pool size, default 12.
    pub worker_pool_size: usize,
    pub uploads_dir: PathBuf,
    pub transcripts_dir: PathBuf,
    pub summaries_dir: PathBuf,
    pub history_path: PathBuf,
    pub default_language: crate::domain::Language,
}

impl Config {
    /// Default configuration rooted at `data_dir` (e.g. `./data`).
    #[must_use]
    pub fn with_defaults(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            worker_pool_size: 12,
            uploads_dir: data_dir.join("uploads"),
            transcripts_dir: data_dir.join("transcripts"),
            summaries_dir: data_dir.join("meeting_summaries"),
            history_path: data_dir.join("transcripts").join("history_records.json"),
            default_language: crate::domain::Language::Zh,
        }
    }

    #[must_use]
    pub const fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Create the directories this config references, if absent.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.uploads_dir)?;
        std::fs::create_dir_all(&self.transcripts_dir)?;
        std::fs::create_dir_all(&self.summaries_dir)?;
        Ok(())
    }
}
