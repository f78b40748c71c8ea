//! Default `DocRenderer`: writes a plain-text rendering of the transcript
//! or summary to the target path. Word-processor document generation is an
//! external collaborator by design; deployments that need real `.docx`
//! output plug in their own renderer at the composition root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use meetscribe_core::ports::{DocRenderer, TranscribeMeta};
use meetscribe_core::{RunnerError, Segment};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextDocRenderer;

#[async_trait]
impl DocRenderer for PlaintextDocRenderer {
    async fn render_transcript_doc(
        &self,
        segments: &[Segment],
        meta: &TranscribeMeta,
        out_path: &Path,
    ) -> Result<PathBuf, RunnerError> {
        let mut body = format!(
            "Transcript ({:.1}s, detected language: {})\n\n",
            meta.duration_secs,
            meta.detected_language.as_deref().unwrap_or("unknown")
        );
        for segment in segments {
            body.push_str(&format!(
                "[{:>7.2} - {:>7.2}] {}: {}\n",
                segment.start_time, segment.end_time, segment.speaker, segment.text
            ));
        }
        write_doc(out_path, &body).await
    }

    async fn render_summary_doc(
        &self,
        segments: &[Segment],
        summary_text: &str,
        out_path: &Path,
    ) -> Result<PathBuf, RunnerError> {
        let mut body = String::from("Meeting Summary\n\n");
        body.push_str(summary_text);
        body.push_str("\n\n---\nTranscript\n\n");
        for segment in segments {
            body.push_str(&format!("{}: {}\n", segment.speaker, segment.text));
        }
        write_doc(out_path, &body).await
    }
}

async fn write_doc(out_path: &Path, body: &str) -> Result<PathBuf, RunnerError> {
    if let Some(parent) = out_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RunnerError::other(format!("creating output dir: {e}")))?;
    }
    tokio::fs::write(out_path, body)
        .await
        .map_err(|e| RunnerError::other(format!("writing document: {e}")))?;
    Ok(out_path.to_path_buf())
}
