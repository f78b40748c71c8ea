//! `meetscribe` CLI entry point — the composition root for the binary.
//!
//! This is the only place environment variables are read and turned into a
//! `ServerConfig`; everything downstream receives already-resolved values.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meetscribe_axum::{start_server, CorsConfig, ServerConfig};
use meetscribe_axum::adapters::ChatModelEndpoint;

/// Meeting transcription and summarisation service.
#[derive(Debug, Parser)]
#[command(name = "meetscribe", about = "Meeting transcription and summarisation service")]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "MEETSCRIBE_PORT", default_value_t = 8787)]
    port: u16,

    /// Root directory for uploads, transcripts, summaries, and history.
    #[arg(long, env = "MEETSCRIBE_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Bounded worker pool size.
    #[arg(long, env = "MEETSCRIBE_WORKER_POOL_SIZE", default_value_t = 12)]
    worker_pool_size: usize,

    /// Executable spawned per transcription job.
    #[arg(
        long,
        env = "MEETSCRIBE_TRANSCRIBE_COMMAND",
        default_value = "meetscribe-transcribe"
    )]
    transcribe_command: PathBuf,

    /// Directory of built frontend assets to serve as a SPA fallback.
    #[arg(long, env = "MEETSCRIBE_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Comma-separated list of allowed CORS origins; omit to allow all.
    #[arg(long, env = "MEETSCRIBE_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,
}

/// One `(base_url_env, api_key_env, model_env, default_model)` tuple per
/// supported LLM backend.
const LLM_BACKENDS: &[(&str, &str, &str, &str, &str)] = &[
    (
        "deepseek",
        "MEETSCRIBE_DEEPSEEK_BASE_URL",
        "MEETSCRIBE_DEEPSEEK_API_KEY",
        "MEETSCRIBE_DEEPSEEK_MODEL",
        "deepseek-chat",
    ),
    (
        "qwen",
        "MEETSCRIBE_QWEN_BASE_URL",
        "MEETSCRIBE_QWEN_API_KEY",
        "MEETSCRIBE_QWEN_MODEL",
        "qwen-plus",
    ),
    (
        "glm",
        "MEETSCRIBE_GLM_BASE_URL",
        "MEETSCRIBE_GLM_API_KEY",
        "MEETSCRIBE_GLM_MODEL",
        "glm-4",
    ),
];

/// Build the LLM endpoint table from environment variables. A backend is
/// only registered once its API key is set; otherwise the Summary
/// Orchestrator falls back to the deterministic default template.
fn resolve_llm_endpoints() -> HashMap<String, ChatModelEndpoint> {
    let mut endpoints = HashMap::new();
    for (key, base_url_env, api_key_env, model_env, default_model) in LLM_BACKENDS {
        let Ok(api_key) = std::env::var(api_key_env) else {
            continue;
        };
        if api_key.is_empty() {
            continue;
        }
        let base_url = std::env::var(base_url_env)
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let model = std::env::var(model_env).unwrap_or_else(|_| (*default_model).to_string());
        endpoints.insert(
            (*key).to_string(),
            ChatModelEndpoint {
                base_url,
                api_key,
                model,
            },
        );
    }
    endpoints
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = ServerConfig::with_defaults(cli.data_dir);
    config.port = cli.port;
    config.worker_pool_size = cli.worker_pool_size;
    config.transcribe_command = cli.transcribe_command;
    config.llm_endpoints = resolve_llm_endpoints();
    config.cors = if cli.cors_origins.is_empty() {
        CorsConfig::AllowAll
    } else {
        CorsConfig::AllowOrigins(cli.cors_origins)
    };
    if let Some(static_dir) = cli.static_dir {
        config = config.with_static_dir(static_dir);
    }

    start_server(config).await
}
