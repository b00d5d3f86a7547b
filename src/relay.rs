//! HTTP relay between the chat surfaces and the LLM gateway.
//!
//! Each chat function builds its persona's system prompt, forwards the
//! conversation with `stream: true`, and hands the gateway's SSE body back to
//! the browser untouched.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, HeaderValue, Method},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::client::{COACH_FUNCTION, GENIE_FUNCTION};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::prompts::{coach_system_prompt, genie_system_prompt, COACH, GENIE};
use crate::types::{ChatRequest, GenieRequest};
use crate::upstream;

const ALLOWED_ORIGINS: &[&str] = &[
    "https://wellnessgenius.co.uk",
    "https://www.wellnessgenius.co.uk",
    "https://wellnessgenius.lovable.app",
    "http://localhost:5173",
    "http://localhost:8080",
    "http://localhost:3000",
];

const ALLOWED_ORIGIN_SUFFIXES: &[&str] = &[".lovable.app", ".lovableproject.com"];

#[derive(Clone)]
pub struct RelayState {
    pub http: reqwest::Client,
    pub config: Arc<RelayConfig>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }
}

pub fn is_allowed_origin(origin: &str) -> bool {
    ALLOWED_ORIGINS.contains(&origin)
        || ALLOWED_ORIGIN_SUFFIXES
            .iter()
            .any(|suffix| origin.starts_with("https://") && origin.ends_with(suffix))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin.to_str().map(is_allowed_origin).unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

pub fn create_router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(&format!("/functions/v1/{COACH_FUNCTION}"), post(coach_chat))
        .route(&format!("/functions/v1/{GENIE_FUNCTION}"), post(genie_chat))
        .layer(cors_layer())
        .with_state(state)
}

pub async fn run_server(
    state: RelayState,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn coach_chat(
    State(state): State<RelayState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(payload) = payload?;
    let mode = COACH.resolve_mode(payload.mode.as_deref());
    let span = tracing::info_span!("coach_chat", request_id = %Uuid::new_v4().simple(), mode);
    info!(
        parent: &span,
        messages = payload.messages.len(),
        personalised = payload.user_context.is_some(),
        "starting chat request"
    );

    let system_prompt = coach_system_prompt(Some(mode), payload.user_context.as_ref());
    upstream::forward(&state, &COACH, system_prompt, payload.messages)
        .instrument(span)
        .await
}

async fn genie_chat(
    State(state): State<RelayState>,
    payload: Result<Json<GenieRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(payload) = payload?;
    let mode = GENIE.resolve_mode(payload.mode.as_deref());
    let span = tracing::info_span!("genie_chat", request_id = %Uuid::new_v4().simple(), mode);
    info!(
        parent: &span,
        messages = payload.messages.len(),
        "starting chat request"
    );

    let system_prompt = genie_system_prompt(
        Some(mode),
        payload.memory_context.as_deref(),
        payload.document_context.as_deref(),
    );
    upstream::forward(&state, &GENIE, system_prompt, payload.messages)
        .instrument(span)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_allow_list() {
        assert!(is_allowed_origin("https://wellnessgenius.co.uk"));
        assert!(is_allowed_origin("http://localhost:5173"));
        assert!(is_allowed_origin("https://preview-123.lovableproject.com"));
        assert!(is_allowed_origin("https://my-site.lovable.app"));
        assert!(!is_allowed_origin("https://evil.example.com"));
        assert!(!is_allowed_origin("http://localhost:9999"));
    }
}
