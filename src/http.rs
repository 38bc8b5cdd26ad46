//! Operational HTTP surface: health and queue introspection.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{DateTime, Utc};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use sellsync_bridge::RpcBridge;
use sellsync_core::config::AppConfig;
use sellsync_worker::JobQueue;

/// Shared state for the operational endpoints.
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<RpcBridge>,
    pub queue: Arc<JobQueue>,
    pub started_at: DateTime<Utc>,
}

/// Build the server router: agent WebSocket plus the health endpoints.
pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .with_state(state.clone());

    sellsync_bridge::ws::agent_routes(Arc::clone(&state.bridge))
        .merge(health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config))
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
        "connected_users": state.bridge.user_count(),
        "agent_connections": state.bridge.connection_count(),
        "pending_rpcs": state.bridge.pending_count(),
    }))
}

/// GET /health/ready
///
/// Ready means the queue answers, which exercises the database pool.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    match state.queue.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({ "status": "ready", "queue": stats })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "error": e.to_string() })),
        )
            .into_response(),
    }
}

fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    use axum::http::{HeaderValue, Method};
    use tower_http::cors::Any;

    let allowed = &config.server.cors.allowed_origins;

    let mut cors = CorsLayer::new();
    if allowed.contains(&"*".to_string()) {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = allowed.iter().filter_map(|o| o.parse().ok()).collect();
        cors = cors.allow_origin(origins);
    }

    cors.allow_methods([Method::GET])
}
