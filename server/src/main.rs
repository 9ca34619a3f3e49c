mod buffer;

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use buffer::FrameBuffer;
use bytes::Bytes;
use serde_json::json;
use swarm_relay_common::config::Config;
use swarm_relay_common::multipart::{encode_part, STREAM_CONTENT_TYPE};
use swarm_relay_common::telemetry::Telemetry;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

struct AppState {
    buffer: FrameBuffer,
    /// Minimum spacing between parts on the multipart stream.
    stream_period: Duration,
}

// ---------------------------------------------------------------------------
// Swarm mode handlers
// ---------------------------------------------------------------------------

/// POST /swarm/enable — all consumers switch to the shared broadcast frame
async fn enable_swarm(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.buffer.set_mode(true);
    info!("broadcast mode enabled, all feeds synchronized");
    Json(json!({ "enabled": true, "mode": "broadcast" }))
}

/// POST /swarm/disable — back to independent per-agent feeds
async fn disable_swarm(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.buffer.set_mode(false);
    info!("broadcast mode disabled, feeds independent");
    Json(json!({ "enabled": false, "mode": "independent" }))
}

/// GET /swarm/status
async fn swarm_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let enabled = state.buffer.get_mode();
    Json(json!({
        "enabled": enabled,
        "agents_connected": state.buffer.agents_connected(),
        "broadcast_active": state.buffer.broadcast_active(),
        "mode": if enabled { "broadcast" } else { "independent" },
    }))
}

// ---------------------------------------------------------------------------
// Frame handlers
// ---------------------------------------------------------------------------

/// POST /agents/:id/frame — raw image body, any payload accepted
async fn upload_frame(
    State(state): State<Arc<AppState>>,
    AxumPath(agent_id): AxumPath<String>,
    body: Bytes,
) -> impl IntoResponse {
    state.buffer.put_frame(&agent_id, body);
    Json(json!({ "status": "ok", "broadcast": state.buffer.get_mode() }))
}

/// GET /agents/:id/frame/latest — single snapshot, 404 until the first upload
async fn latest_frame(
    State(state): State<Arc<AppState>>,
    AxumPath(agent_id): AxumPath<String>,
) -> impl IntoResponse {
    match state.buffer.get_frame(&agent_id) {
        Some(frame) => {
            ([(header::CONTENT_TYPE, "image/jpeg")], Body::from(frame)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /agents/:id/frame/stream — continuous multipart stream.
///
/// Emits the latest frame once per tick; ticks with no frame yet emit
/// nothing, so a consumer that connects early just waits.
async fn stream_frames(
    State(state): State<Arc<AppState>>,
    AxumPath(agent_id): AxumPath<String>,
) -> impl IntoResponse {
    let ticker = tokio::time::interval(state.stream_period);
    let stream = futures_util::stream::unfold(
        (state, agent_id, ticker),
        |(state, agent_id, mut ticker)| async move {
            let part = loop {
                ticker.tick().await;
                if let Some(frame) = state.buffer.get_frame(&agent_id) {
                    break encode_part(&frame);
                }
            };
            Some((Ok::<_, Infallible>(part), (state, agent_id, ticker)))
        },
    );

    (
        [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
        Body::from_stream(stream),
    )
}

// ---------------------------------------------------------------------------
// Telemetry and roster handlers
// ---------------------------------------------------------------------------

/// POST /agents/:id/telemetry
async fn report_telemetry(
    State(state): State<Arc<AppState>>,
    AxumPath(agent_id): AxumPath<String>,
    Json(telemetry): Json<Telemetry>,
) -> impl IntoResponse {
    state.buffer.put_telemetry(&agent_id, telemetry);
    Json(json!({ "status": "updated" }))
}

/// GET /agents/:id/telemetry
async fn latest_telemetry(
    State(state): State<Arc<AppState>>,
    AxumPath(agent_id): AxumPath<String>,
) -> impl IntoResponse {
    match state.buffer.get_telemetry(&agent_id) {
        Some(telemetry) => Json(telemetry).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /agents — agents that have uploaded at least one frame
async fn list_agents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.buffer.roster())
}

// ---------------------------------------------------------------------------
// Router & main
// ---------------------------------------------------------------------------

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/swarm/enable", post(enable_swarm))
        .route("/swarm/disable", post(disable_swarm))
        .route("/swarm/status", get(swarm_status))
        .route("/agents", get(list_agents))
        .route("/agents/:agent_id/frame", post(upload_frame))
        .route("/agents/:agent_id/frame/latest", get(latest_frame))
        .route("/agents/:agent_id/frame/stream", get(stream_frames))
        .route(
            "/agents/:agent_id/telemetry",
            post(report_telemetry).get(latest_telemetry),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let state = Arc::new(AppState {
        buffer: FrameBuffer::new(),
        stream_period: Duration::from_secs_f64(1.0 / config.server.stream_fps.max(0.1)),
    });

    let addr = format!("0.0.0.0:{}", config.server.port);
    info!(addr, stream_fps = config.server.stream_fps, "swarm-relay server starting");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap_or_else(|e| {
        eprintln!("Failed to bind to {addr}: {e}");
        std::process::exit(1);
    });
    axum::serve(listener, app(state)).await.unwrap();
}
