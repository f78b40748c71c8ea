//! Port definitions (trait abstractions) for external collaborators treated
//! as opaque: the ASR runner, the audio normalizer, the document renderer,
//! and the LLM. No concrete implementation lives in this crate — only the
//! interfaces the Scheduler and Summary Orchestrator call through.
//!
//! # Design rules
//!
//! - No process/filesystem implementation details leak into signatures.
//! - Every port is a minimal, intent-based `#[async_trait]`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Language, Segment};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("cancelled")]
    Cancelled,
    #[error("runner failed: {0}")]
    Other(String),
}

impl RunnerError {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Checked by the runner at each stage boundary; `true` means the caller
/// wants the job cancelled.
pub trait CancelCheck: Fn() -> bool + Send + Sync {}
impl<F: Fn() -> bool + Send + Sync> CancelCheck for F {}

/// Called by the runner to report progress; forwarded to `Tracker::set_target`.
pub trait ProgressCb: FnMut(&str, u8, &str) + Send {}
impl<F: FnMut(&str, u8, &str) + Send> ProgressCb for F {}

/// Metadata returned alongside segments, used by the document renderer.
#[derive(Debug, Clone, Default)]
pub struct TranscribeMeta {
    pub duration_secs: f64,
    pub detected_language: Option<String>,
}

/// The ASR/diarization/VAD/punctuation model runner. Opaque by design;
/// invoked as a plain blocking call from a worker task.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        path: &Path,
        hotword: &str,
        language: Language,
        cancel: &(dyn CancelCheck),
        progress: &mut (dyn ProgressCb),
    ) -> Result<(Vec<Segment>, TranscribeMeta), RunnerError>;
}

/// Audio pre-processing to 16 kHz mono WAV; may no-op if already conformant.
#[async_trait]
pub trait Normalizer: Send + Sync {
    async fn normalize(&self, path: &Path) -> Result<PathBuf, RunnerError>;
}

/// Word-document rendering for transcripts and summaries.
#[async_trait]
pub trait DocRenderer: Send + Sync {
    async fn render_transcript_doc(
        &self,
        segments: &[Segment],
        meta: &TranscribeMeta,
        out_path: &Path,
    ) -> Result<PathBuf, RunnerError>;

    async fn render_summary_doc(
        &self,
        segments: &[Segment],
        summary_text: &str,
        out_path: &Path,
    ) -> Result<PathBuf, RunnerError>;
}

/// The external LLM used for meeting summaries.
#[async_trait]
pub trait Llm: Send + Sync {
    async fn chat(
        &self,
        system_msg: &str,
        user_msg: &str,
        model_key: &str,
    ) -> Result<String, RunnerError>;

    /// `true` if an API key is configured for at least one model; when
    /// `false` the Summary Orchestrator falls back to a deterministic
    /// default summary.
    fn has_api_key(&self) -> bool;

    /// Resolve a requested `model_key` to one this adapter can actually
    /// serve: pass an unset or unrecognised/unconfigured key through to a
    /// platform default instead of letting `chat` fail on it. The default
    /// implementation passes `requested` through unchanged (or `"deepseek"`
    /// when unset); adapters backed by a fixed set of configured endpoints
    /// should override this to redirect to one of them.
    fn resolve_model_key(&self, requested: Option<&str>) -> String {
        requested.unwrap_or("deepseek").to_string()
    }
}
