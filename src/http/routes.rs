//! HTTP route definitions

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::app::AppState;
use crate::game::path::{InflectionPath, PathError};
use crate::game::types::{Coord, SnakeId};
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/snakes", get(snakes_handler))
        .route("/snakes/:id", get(snake_handler).put(publish_snake_handler))
        .route("/ws", get(ws_handler))
        // Applied innermost-first (compression, trace, cors outermost); each
        // `Router::layer` re-boxes the body so CORS sees a `Default` body.
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.client_origin.as_deref()))
        .with_state(state)
}

/// CORS for the configured origins (comma separated), any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health and stats
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_sessions: state.sessions.active_sessions(),
    })
}

#[derive(Serialize)]
struct StatsResponse {
    snakes: usize,
    snacks: usize,
    path_slots: usize,
    active_sessions: usize,
    sessions_started: u64,
    started_at: String,
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.store.stats();
    Json(StatsResponse {
        snakes: stats.snakes,
        snacks: stats.snacks,
        path_slots: stats.slots,
        active_sessions: state.sessions.active_sessions(),
        sessions_started: state.sessions.total_started(),
        started_at: state.started_at.to_rfc3339(),
    })
}

// ============================================================================
// Snake paths
// ============================================================================

/// Every stored inflection list, keyed by identity
async fn snakes_handler(State(state): State<AppState>) -> Json<BTreeMap<SnakeId, Vec<Coord>>> {
    Json(state.store.paths().into_iter().collect())
}

async fn snake_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Coord>>, AppError> {
    let id = SnakeId::from(id);
    state
        .store
        .path(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("snake {id}")))
}

#[derive(Serialize)]
struct PublishResponse {
    snake_id: SnakeId,
    length: usize,
}

/// Publish a whole inflection list for an external snake, such as a recorded
/// showcase run. An empty list removes the entry.
async fn publish_snake_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(points): Json<Vec<Coord>>,
) -> Result<Json<PublishResponse>, AppError> {
    let id = SnakeId::from(id);
    if state.sessions.get(&id).is_some() {
        return Err(AppError::Conflict(format!("snake {id} belongs to a live session")));
    }

    if points.is_empty() {
        state.store.remove_path(&id);
        info!(snake_id = %id, "External snake removed");
        return Ok(Json(PublishResponse {
            snake_id: id,
            length: 0,
        }));
    }

    let path = InflectionPath::new(points)?;
    let length = path.len();
    state.store.set_path(&id, path.points().to_vec());
    info!(snake_id = %id, length, "External snake published");

    Ok(Json(PublishResponse {
        snake_id: id,
        length,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<PathError> for AppError {
    fn from(e: PathError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
