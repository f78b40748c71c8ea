//! Default `Transcriber` adapter: spawns a configured external command and
//! reads its progress/result protocol from stdout, driving the subprocess
//! with `tokio::process::Command` and a buffered line reader.
//!
//! # Protocol
//!
//! The configured command is invoked as:
//! `<cmd> --path <audio_path> --hotword <hotword> --language <lang>`
//!
//! It must write newline-delimited JSON to stdout, each line either:
//! - `{"progress": <0-100>, "message": "<stage>"}`
//! - a final `{"segments": [...], "duration_secs": <f64>, "detected_language": "<lang>"}`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use meetscribe_core::{CancelCheck, Language, ProgressCb, RunnerError, Segment};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use meetscribe_core::ports::{TranscribeMeta, Transcriber};

#[derive(Debug, Clone)]
pub struct ExternalCommandTranscriber {
    command: PathBuf,
}

impl ExternalCommandTranscriber {
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Progress {
        progress: u8,
        #[serde(default)]
        message: String,
    },
    Result {
        segments: Vec<Segment>,
        #[serde(default)]
        duration_secs: f64,
        #[serde(default)]
        detected_language: Option<String>,
    },
}

#[async_trait]
impl Transcriber for ExternalCommandTranscriber {
    async fn transcribe(
        &self,
        path: &Path,
        hotword: &str,
        language: Language,
        cancel: &(dyn CancelCheck),
        progress: &mut (dyn ProgressCb),
    ) -> Result<(Vec<Segment>, TranscribeMeta), RunnerError> {
        let mut child = Command::new(&self.command)
            .arg("--path")
            .arg(path)
            .arg("--hotword")
            .arg(hotword)
            .arg("--language")
            .arg(language.as_str())
            .stdout(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RunnerError::other(format!("failed to spawn transcriber: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::other("transcriber produced no stdout"))?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            if cancel() {
                let _ = child.start_kill();
                return Err(RunnerError::Cancelled);
            }

            let next = tokio::select! {
                biased;
                () = tokio::time::sleep(std::time::Duration::from_millis(100)) => continue,
                line = lines.next_line() => line,
            };

            match next.map_err(|e| RunnerError::other(format!("reading transcriber output: {e}")))?
            {
                None => {
                    let status = child
                        .wait()
                        .await
                        .map_err(|e| RunnerError::other(format!("waiting on transcriber: {e}")))?;
                    return Err(RunnerError::other(format!(
                        "transcriber exited without a result (status {status})"
                    )));
                }
                Some(raw) => match serde_json::from_str::<Line>(&raw) {
                    Ok(Line::Progress { progress: p, message }) => {
                        progress("transcribe", p, &message);
                    }
                    Ok(Line::Result {
                        segments,
                        duration_secs,
                        detected_language,
                    }) => {
                        return Ok((
                            segments,
                            TranscribeMeta {
                                duration_secs,
                                detected_language,
                            },
                        ));
                    }
                    Err(_) => continue,
                },
            }
        }
    }
}
