//! Axum server bootstrap — the composition root.
//!
//! This module is the only place where the core engine's components are
//! wired together with concrete collaborator adapters for the Axum web
//! adapter.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use meetscribe_core::{Config, HistoryStore, Hub, Registry, Scheduler, SummaryOrchestrator};

use crate::adapters::{
    ChatModelEndpoint, ExternalCommandTranscriber, HttpLlm, PassthroughNormalizer,
    PlaintextDocRenderer,
};

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    #[default]
    AllowAll,
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub worker_pool_size: usize,
    /// Command spawned per transcription job (see `adapters::transcribe`).
    pub transcribe_command: PathBuf,
    pub llm_endpoints: HashMap<String, ChatModelEndpoint>,
    pub static_dir: Option<PathBuf>,
    pub cors: CorsConfig,
}

impl ServerConfig {
    #[must_use]
    pub fn with_defaults(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: 8787,
            data_dir: data_dir.into(),
            worker_pool_size: 12,
            transcribe_command: PathBuf::from("meetscribe-transcribe"),
            llm_endpoints: HashMap::new(),
            static_dir: None,
            cors: CorsConfig::default(),
        }
    }

    #[must_use]
    pub fn with_static_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.static_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = CorsConfig::AllowOrigins(origins);
        self
    }
}

/// Application context for the Axum adapter: every service a handler might
/// need, already assembled.
pub struct AxumContext {
    pub registry: Arc<Registry>,
    pub hub: Arc<Hub>,
    pub history: Arc<HistoryStore>,
    pub scheduler: Arc<Scheduler>,
    pub summary: Arc<SummaryOrchestrator>,
    /// Shared with the Scheduler's internal worker pipeline; the Request
    /// Surface also calls it directly to render a summary document on
    /// `generate_summary`.
    pub renderer: Arc<dyn meetscribe_core::DocRenderer>,
    pub config: Config,
}

/// Bootstrap the Axum server with all services.
pub async fn bootstrap(server_config: ServerConfig) -> Result<AxumContext> {
    let config = Config::with_defaults(&server_config.data_dir)
        .with_worker_pool_size(server_config.worker_pool_size);
    config.ensure_dirs()?;

    tracing::info!(
        target: "meetscribe.bootstrap",
        data_dir = %server_config.data_dir.display(),
        worker_pool_size = config.worker_pool_size,
        "resolved meetscribe configuration"
    );

    let registry = Arc::new(Registry::new());
    let hub = Arc::new(Hub::new());
    let history = Arc::new(HistoryStore::new(config.history_path.clone()));

    let loaded = history.load();
    if !loaded.is_empty() {
        tracing::info!(
            target: "meetscribe.bootstrap",
            count = loaded.len(),
            "restored history records at startup"
        );
        registry.merge_history(loaded);
    }

    let transcriber = Arc::new(ExternalCommandTranscriber::new(
        server_config.transcribe_command.clone(),
    ));
    let normalizer: Arc<dyn meetscribe_core::Normalizer> = Arc::new(PassthroughNormalizer);
    let renderer: Arc<dyn meetscribe_core::DocRenderer> = Arc::new(PlaintextDocRenderer);
    let llm = Arc::new(HttpLlm::new(server_config.llm_endpoints.clone()));

    let scheduler = Scheduler::new(
        registry.clone(),
        hub.clone(),
        history.clone(),
        transcriber,
        normalizer,
        renderer.clone(),
        config.transcripts_dir.clone(),
        config.worker_pool_size,
    );

    let summary = Arc::new(SummaryOrchestrator::new(registry.clone(), llm));

    Ok(AxumContext {
        registry,
        hub,
        history,
        scheduler,
        summary,
        renderer,
        config,
    })
}

/// Start the web server on the configured port.
pub async fn start_server(server_config: ServerConfig) -> Result<()> {
    use tokio::net::TcpListener;
    use tracing::info;

    let port = server_config.port;
    let static_dir = server_config.static_dir.clone();
    let cors = server_config.cors.clone();
    let ctx = bootstrap(server_config).await?;

    let app = if let Some(ref dir) = static_dir {
        info!(static_dir = %dir.display(), "serving static assets");
        crate::routes::create_spa_router(ctx, dir, &cors)
    } else {
        crate::routes::create_router(ctx, &cors)
    };

    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "meetscribe web server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
