use crate::config::ServerSettings;
use crate::server::handlers;
use crate::server::state::AppState;
use crate::utils::error::{RelayError, Result};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/invoke-agent", post(handlers::invoke_agent))
        .route("/api/invoke-agent-stream", post(handlers::invoke_agent_stream))
        .route("/api/jobs/submit", post(handlers::submit_job))
        .route("/api/jobs/{job_id}", get(handlers::job_status))
        .route("/api/jobs/{job_id}/result", get(handlers::job_result))
}

/// Routes plus middleware, applied bottom-up: CORS, request id, tracing,
/// request id propagation, timeout, panic recovery.
pub fn build_app_router(state: AppState) -> Result<Router> {
    let cors = build_cors_layer(&state.settings)?;
    let request_id_header = HeaderName::from_static("x-request-id");
    let timeout = state.settings.request_timeout();

    Ok(api_routes()
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state))
}

pub fn build_cors_layer(settings: &ServerSettings) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    if settings.allows_any_origin() {
        return Ok(cors.allow_origin(Any));
    }

    let origins = settings
        .cors_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).map_err(|e| RelayError::InvalidConfigValueError {
                field: "server.cors_origins".to_string(),
                value: origin.clone(),
                reason: e.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(cors.allow_origin(origins))
}
