//! # notegen-api
//!
//! HTTP surface of the notegen generation pipeline. Job creation returns
//! `202 Accepted` with the persisted job; clients poll `GET /api/v1/jobs/:id`
//! until the job reaches `PROCESSED` or `FAILED`.

pub mod error;
pub mod handlers;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use notegen_jobs::JobService;

pub use error::ApiError;

/// Request bodies are small JSON documents; audio is uploaded elsewhere.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobService,
}

impl AppState {
    pub fn new(jobs: JobService) -> Self {
        Self { jobs }
    }
}

/// Request IDs are UUIDv7 so they sort by arrival time in logs.
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Parse `ALLOWED_ORIGINS` (comma separated) into CORS origins.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the application router with its middleware stack.
pub fn router(state: AppState) -> Router {
    use handlers::jobs;

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/quizzes", post(jobs::create_quiz))
        .route("/api/v1/narrations", post(jobs::create_narration))
        .route("/api/v1/transcriptions", post(jobs::create_transcription))
        .route("/api/v1/jobs", get(jobs::list_jobs))
        .route("/api/v1/jobs/:id", get(jobs::get_job))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins()))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(jobs::OWNER_HEADER),
                ])
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
