//! Default `Llm` adapter: a thin OpenAI-chat-compatible HTTP client, one
//! endpoint+key pair per model key (`deepseek`, `qwen`, `glm`).

use std::collections::HashMap;

use async_trait::async_trait;
use meetscribe_core::ports::Llm;
use meetscribe_core::RunnerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct ChatModelEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct HttpLlm {
    client: reqwest::Client,
    endpoints: HashMap<String, ChatModelEndpoint>,
}

impl HttpLlm {
    #[must_use]
    pub fn new(endpoints: HashMap<String, ChatModelEndpoint>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

#[async_trait]
impl Llm for HttpLlm {
    async fn chat(
        &self,
        system_msg: &str,
        user_msg: &str,
        model_key: &str,
    ) -> Result<String, RunnerError> {
        let endpoint = self
            .endpoints
            .get(model_key)
            .ok_or_else(|| RunnerError::other(format!("no endpoint configured for {model_key}")))?;

        let body = ChatRequest {
            model: &endpoint.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_msg,
                },
                ChatMessage {
                    role: "user",
                    content: user_msg,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", endpoint.base_url))
            .bearer_auth(&endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RunnerError::other(format!("LLM request failed: {e}")))?
            .error_for_status()
            .map_err(|e| RunnerError::other(format!("LLM returned an error status: {e}")))?
            .json::<ChatResponse>()
            .await
            .map_err(|e| RunnerError::other(format!("decoding LLM response: {e}")))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RunnerError::other("LLM response had no choices"))
    }

    fn has_api_key(&self) -> bool {
        self.endpoints.values().any(|e| !e.api_key.is_empty())
    }

    /// An unset, unrecognised, or unconfigured key falls back to a
    /// configured default instead of reaching `chat` and erroring there:
    /// `deepseek` first (the platform default), then whichever configured
    /// backend sorts first, so the choice is deterministic.
    fn resolve_model_key(&self, requested: Option<&str>) -> String {
        if let Some(key) = requested {
            if self.endpoints.contains_key(key) {
                return key.to_string();
            }
        }
        const PLATFORM_DEFAULT: &str = "deepseek";
        if self.endpoints.contains_key(PLATFORM_DEFAULT) {
            return PLATFORM_DEFAULT.to_string();
        }
        self.endpoints
            .keys()
            .min()
            .cloned()
            .unwrap_or_else(|| PLATFORM_DEFAULT.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> ChatModelEndpoint {
        ChatModelEndpoint {
            base_url: "https://example.invalid".into(),
            api_key: "key".into(),
            model: "m".into(),
        }
    }

    #[test]
    fn resolve_model_key_passes_through_a_configured_key() {
        let llm = HttpLlm::new(HashMap::from([("qwen".to_string(), endpoint())]));
        assert_eq!(llm.resolve_model_key(Some("qwen")), "qwen");
    }

    #[test]
    fn resolve_model_key_falls_back_to_deepseek_when_configured() {
        let llm = HttpLlm::new(HashMap::from([
            ("deepseek".to_string(), endpoint()),
            ("qwen".to_string(), endpoint()),
        ]));
        assert_eq!(llm.resolve_model_key(Some("unknown-model")), "deepseek");
        assert_eq!(llm.resolve_model_key(None), "deepseek");
    }

    #[test]
    fn resolve_model_key_falls_back_to_any_configured_endpoint() {
        let llm = HttpLlm::new(HashMap::from([("glm".to_string(), endpoint())]));
        assert_eq!(llm.resolve_model_key(Some("unknown-model")), "glm");
    }
}
