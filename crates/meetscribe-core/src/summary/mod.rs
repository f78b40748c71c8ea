//! Summary Orchestrator: serialise a completed file's segments into a
//! prompt, call the external LLM, clean the reply, and persist it on the
//! record.

use std::sync::Arc;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

use crate::domain::{FileRecord, Segment, Summary, SummaryStatus};
use crate::error::{CoreError, CoreResult};
use crate::ports::Llm;
use crate::registry::Registry;

const SYSTEM_MESSAGE: &str = "You are a meeting-minutes assistant. Respond with the summary only.";
const HYGIENE_DIRECTIVE: &str =
    "\n\nDo not include confirmations, preambles, or markdown formatting in your reply.";
const TRANSCRIPT_PLACEHOLDER: &str = "{transcript}";
const LEGACY_MARKER: &str = "会议转录内容：";

pub struct SummaryOrchestrator {
    registry: Arc<Registry>,
    llm: Arc<dyn Llm>,
}

impl SummaryOrchestrator {
    #[must_use]
    pub fn new(registry: Arc<Registry>, llm: Arc<dyn Llm>) -> Self {
        Self { registry, llm }
    }

    /// Generate a summary for `file_id`, persisting and returning the
    /// resulting `Summary`.
    pub async fn generate(
        &self,
        file_id: crate::domain::FileId,
        prompt_template: Option<&str>,
        model_key: Option<&str>,
    ) -> CoreResult<Summary> {
        let record = self.registry.get(file_id)?;
        let segments = record
            .segments
            .as_ref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::validation("no segments to summarise"))?;

        let summary = if self.llm.has_api_key() {
            self.call_llm(segments, prompt_template, model_key).await
        } else {
            default_template_summary(segments)
        };

        self.registry.update(file_id, |r| {
            r.summary = Some(summary.clone());
        })?;

        Ok(summary)
    }

    async fn call_llm(
        &self,
        segments: &[Segment],
        prompt_template: Option<&str>,
        model_key: Option<&str>,
    ) -> Summary {
        // An unknown or unconfigured key falls back to a platform default
        // here rather than surfacing as an error — only "no API key
        // configured at all" (handled by the `has_api_key` gate above)
        // should bypass the LLM.
        let model_key = self.llm.resolve_model_key(model_key);
        let user_message = compose_prompt(segments, prompt_template);

        match self.llm.chat(SYSTEM_MESSAGE, &user_message, &model_key).await {
            Ok(raw) => Summary {
                raw_text: clean_summary(&raw),
                generated_at: Utc::now(),
                model_key,
                status: SummaryStatus::Success,
                error: None,
            },
            Err(err) => Summary {
                raw_text: String::new(),
                generated_at: Utc::now(),
                model_key,
                status: SummaryStatus::Error,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Step 3: compose the user message from the joined transcript and an
/// optional template.
fn compose_prompt(segments: &[Segment], prompt_template: Option<&str>) -> String {
    let joined = join_segments(segments);
    let mut message = match prompt_template {
        Some(template) if template.contains(TRANSCRIPT_PLACEHOLDER) => {
            template.replace(TRANSCRIPT_PLACEHOLDER, &joined)
        }
        Some(template) if template.contains(LEGACY_MARKER) => {
            format!("{template}\n{joined}")
        }
        Some(template) => format!("{template}\n\n---\n{joined}"),
        None => joined,
    };
    message.push_str(HYGIENE_DIRECTIVE);
    message
}

fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| format!("{}: {}", s.speaker, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deterministic fallback when no LLM API key is configured. Produces a
/// short statistics-based summary.
fn default_template_summary(segments: &[Segment]) -> Summary {
    let speakers: std::collections::BTreeSet<&str> =
        segments.iter().map(|s| s.speaker.as_str()).collect();
    let total_duration = segments.last().map_or(0.0, |s| s.end_time)
        - segments.first().map_or(0.0, |s| s.start_time);
    let raw_text = format!(
        "Meeting summary (auto-generated): {} segments, {} speaker(s), ~{:.0}s duration.",
        segments.len(),
        speakers.len(),
        total_duration.max(0.0)
    );
    Summary {
        raw_text,
        generated_at: Utc::now(),
        model_key: "default_template".into(),
        status: SummaryStatus::Success,
        error: None,
    }
}

// Compiled once; patterns are heuristic and explicitly tunable.
static CONFIRMATION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(好的|好,|sure,?|certainly,?|here is|here's|以下是)[,:：]?\s*").unwrap()
});
static MARKDOWN_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").unwrap());
static MARKDOWN_BOLD_ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*{1,3}([^*]+)\*{1,3}").unwrap());
static MARKDOWN_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]*)`").unwrap());
static MARKDOWN_LIST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*[-*+]\s+").unwrap());
static MARKDOWN_HR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^-{3,}\s*$").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static STANDALONE_MINUTES_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*会议纪要\s*$\n?").unwrap());

/// Step 5: strip confirmation preambles and markdown noise from the LLM's
/// raw reply.
fn clean_summary(raw: &str) -> String {
    let mut text = CONFIRMATION_PREFIX.replace(raw, "").into_owned();
    text = MARKDOWN_HEADING.replace_all(&text, "").into_owned();
    text = MARKDOWN_BOLD_ITALIC.replace_all(&text, "$1").into_owned();
    text = MARKDOWN_CODE.replace_all(&text, "$1").into_owned();
    text = MARKDOWN_LIST.replace_all(&text, "").into_owned();
    text = MARKDOWN_HR.replace_all(&text, "").into_owned();
    text = STANDALONE_MINUTES_LINE.replace_all(&text, "").into_owned();
    text = BLANK_LINES.replace_all(&text, "\n\n").into_owned();
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileId, FileState, Language};
    use crate::ports::RunnerError;
    use async_trait::async_trait;

    struct FakeLlm {
        has_key: bool,
        reply: String,
    }

    #[async_trait]
    impl Llm for FakeLlm {
        async fn chat(
            &self,
            _system_msg: &str,
            _user_msg: &str,
            _model_key: &str,
        ) -> Result<String, RunnerError> {
            Ok(self.reply.clone())
        }

        fn has_api_key(&self) -> bool {
            self.has_key
        }
    }

    /// Mimics an adapter backed by a fixed set of configured endpoints:
    /// `chat` errors on any key other than `"deepseek"`, and
    /// `resolve_model_key` redirects everything else there.
    struct KeyAwareLlm;

    #[async_trait]
    impl Llm for KeyAwareLlm {
        async fn chat(
            &self,
            _system_msg: &str,
            _user_msg: &str,
            model_key: &str,
        ) -> Result<String, RunnerError> {
            if model_key == "deepseek" {
                Ok("fine".into())
            } else {
                Err(RunnerError::other(format!("no endpoint configured for {model_key}")))
            }
        }

        fn has_api_key(&self) -> bool {
            true
        }

        fn resolve_model_key(&self, requested: Option<&str>) -> String {
            match requested {
                Some("deepseek") => "deepseek".to_string(),
                _ => "deepseek".to_string(),
            }
        }
    }

    fn completed_record_with_segments() -> (Arc<Registry>, FileId) {
        let registry = Arc::new(Registry::new());
        let mut rec = FileRecord::new_uploaded(
            "m.mp3".into(),
            "m_stored.mp3".into(),
            "/tmp/m.mp3".into(),
            10,
            Language::Zh,
        );
        rec.state = FileState::Completed;
        rec.progress = 100;
        rec.segments = Some(vec![
            Segment {
                speaker: "S1".into(),
                text: "let's start".into(),
                start_time: 0.0,
                end_time: 2.0,
                words: None,
            },
            Segment {
                speaker: "S2".into(),
                text: "agreed".into(),
                start_time: 2.0,
                end_time: 4.0,
                words: None,
            },
        ]);
        let id = registry.add(rec).unwrap();
        (registry, id)
    }

    #[tokio::test]
    async fn no_segments_is_a_validation_error() {
        let registry = Arc::new(Registry::new());
        let rec = FileRecord::new_uploaded(
            "m.mp3".into(),
            "m_stored.mp3".into(),
            "/tmp/m.mp3".into(),
            10,
            Language::Zh,
        );
        let id = registry.add(rec).unwrap();
        let orchestrator = SummaryOrchestrator::new(
            registry,
            Arc::new(FakeLlm {
                has_key: true,
                reply: String::new(),
            }),
        );
        let err = orchestrator.generate(id, None, None).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn no_api_key_uses_default_template() {
        let (registry, id) = completed_record_with_segments();
        let orchestrator = SummaryOrchestrator::new(
            registry,
            Arc::new(FakeLlm {
                has_key: false,
                reply: String::new(),
            }),
        );
        let summary = orchestrator.generate(id, None, None).await.unwrap();
        assert_eq!(summary.model_key, "default_template");
        assert_eq!(summary.status, SummaryStatus::Success);
    }

    #[tokio::test]
    async fn unknown_model_key_falls_back_to_platform_default_instead_of_erroring() {
        let (registry, id) = completed_record_with_segments();
        let orchestrator = SummaryOrchestrator::new(registry, Arc::new(KeyAwareLlm));

        let summary = orchestrator
            .generate(id, None, Some("not-a-real-model"))
            .await
            .unwrap();

        assert_eq!(summary.status, SummaryStatus::Success);
        assert_eq!(summary.model_key, "deepseek");
    }

    #[tokio::test]
    async fn cleans_confirmation_preamble_and_markdown() {
        let (registry, id) = completed_record_with_segments();
        let orchestrator = SummaryOrchestrator::new(
            registry,
            Arc::new(FakeLlm {
                has_key: true,
                reply: "好的，以下是纪要：\n# 会议纪要\n**要点**: discussed `budget`\n---\n".into(),
            }),
        );
        let summary = orchestrator.generate(id, None, None).await.unwrap();
        assert!(!summary.raw_text.contains('#'));
        assert!(!summary.raw_text.contains('*'));
        assert!(!summary.raw_text.contains('`'));
        assert!(!summary.raw_text.to_lowercase().starts_with("好的"));
    }

    #[test]
    fn prompt_substitutes_placeholder() {
        let segments = vec![Segment {
            speaker: "S1".into(),
            text: "hi".into(),
            start_time: 0.0,
            end_time: 1.0,
            words: None,
        }];
        let template = "Summarise: {transcript}";
        let prompt = compose_prompt(&segments, Some(template));
        assert!(prompt.contains("S1: hi"));
        assert!(!prompt.contains("{transcript}"));
    }
}
