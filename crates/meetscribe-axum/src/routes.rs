//! Route table and router construction.

use std::path::Path;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;
use crate::ws;

fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            use axum::http::HeaderValue;
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// Build the `/voice/*` routes, unprefixed so the caller can `.nest("/api", ...)`.
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/voice/upload", post(handlers::upload::upload))
        .route("/voice/transcribe", post(handlers::transcribe::transcribe))
        .route("/voice/stop/{file_id}", post(handlers::transcribe::stop))
        .route(
            "/voice/status/{file_id}",
            get(handlers::transcribe::legacy_status),
        )
        .route(
            "/voice/result/{file_id}",
            get(handlers::transcribe::legacy_result),
        )
        .route("/voice/files", get(handlers::files::list_files))
        .route(
            "/voice/files/{file_id}",
            get(handlers::files::get_file)
                .patch(handlers::files::patch_file)
                .delete(handlers::files::delete_file),
        )
        .route(
            "/voice/generate_summary/{file_id}",
            post(handlers::files::generate_summary_legacy),
        )
        .route(
            "/voice/audio/{file_id}",
            get(handlers::downloads::download_audio),
        )
        .route(
            "/voice/download_transcript/{file_id}",
            get(handlers::downloads::download_transcript),
        )
        .route(
            "/voice/download_summary/{file_id}",
            get(handlers::downloads::download_summary),
        )
        .route("/voice/languages", get(handlers::misc::languages))
        .route("/voice/history", get(handlers::misc::history))
        .route("/voice/ws", get(ws::upgrade))
}

/// Create the main Axum router with the full API surface plus `/healthz`.
pub fn create_router(ctx: AxumContext, cors_config: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);
    let cors = build_cors_layer(cors_config);

    Router::new()
        .route("/healthz", get(handlers::misc::health))
        .nest("/api", api_routes().with_state(state).layer(cors))
}

/// Create a router with the API surface plus static asset serving and an
/// SPA fallback to `index.html`, for deployments that configure a static
/// asset directory to serve.
pub fn create_spa_router<P: AsRef<Path>>(
    ctx: AxumContext,
    static_dir: P,
    cors_config: &CorsConfig,
) -> Router {
    let static_path = static_dir.as_ref();
    let index_path = static_path.join("index.html");
    let serve_dir = ServeDir::new(static_path).fallback(ServeFile::new(&index_path));

    create_router(ctx, cors_config).fallback_service(serve_dir)
}
