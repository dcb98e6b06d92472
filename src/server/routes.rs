//! Route handlers for the relay API.
//!
//! Implements the four proxy flavors plus a health probe:
//! - POST /generate      buffered JSON response
//! - POST /stream        native upstream SSE pass-through
//! - POST /stream-debug  re-framed relay events (see [`crate::sse`])
//! - POST /test-raw      direct upstream call, adapter bypassed
//! - GET  /health

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::response::sse::{KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, GenerationConfig, UpstreamConfig};
use crate::error::RelayError;
use crate::provider::openai::Usage;
use crate::provider::{GenerationParams, ProviderAdapter};
use crate::server::streaming::relay_sse_stream;

/// Application state shared across handlers.
///
/// Everything is constructed once at startup and passed by reference; no
/// process-wide singletons.
pub struct AppState {
    pub adapter: ProviderAdapter,
    pub http: reqwest::Client,
    pub upstream: UpstreamConfig,
    pub api_key: String,
    pub config: Arc<Config>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>, api_key: String) -> Result<Self, RelayError> {
        let adapter = ProviderAdapter::new(&config.upstream, api_key.clone())?;
        let http = reqwest::Client::builder()
            .user_agent(&config.upstream.user_agent)
            .build()
            .map_err(|e| RelayError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            adapter,
            http,
            upstream: config.upstream.clone(),
            api_key,
            config,
            start_time: Instant::now(),
        })
    }
}

/// Build the axum router with all relay routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/generate", post(generate))
        .route("/stream", post(stream))
        .route("/stream-debug", post(stream_debug))
        .route("/test-raw", post(test_raw))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Body accepted by every POST route.
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Buffered generation response.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: Usage,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub upstream: String,
}

/// Check the request and fill defaults from configuration.
///
/// Rejection happens here, before any upstream call.
fn validate(req: GenerateRequest, gen: &GenerationConfig) -> Result<GenerationParams, RelayError> {
    let prompt = req.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(RelayError::InvalidInput("Prompt is required".to_string()));
    }

    let max_tokens = req.max_tokens.unwrap_or(gen.default_max_tokens);
    if max_tokens == 0 {
        return Err(RelayError::InvalidInput(
            "max_tokens must be positive".to_string(),
        ));
    }

    Ok(GenerationParams {
        model: req.model.unwrap_or_else(|| gen.default_model.clone()),
        prompt,
        max_tokens: max_tokens.min(gen.max_tokens_limit),
        temperature: req.temperature,
    })
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, RelayError> {
    let request_id = Uuid::new_v4().to_string();
    let params = validate(req, &state.config.generation)?;

    info!(
        request_id,
        model = params.model,
        max_tokens = params.max_tokens,
        "Generate request"
    );

    let generation = state.adapter.generate(&params).await?;

    Ok(Json(GenerateResponse {
        text: generation.text,
        usage: generation.usage,
        model: params.model,
    }))
}

/// Pass the upstream's native SSE byte stream through unchanged.
async fn stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, RelayError> {
    let request_id = Uuid::new_v4().to_string();
    let params = validate(req, &state.config.generation)?;

    info!(request_id, model = params.model, "Stream request");

    let upstream = state.adapter.stream_raw(&params).await?;
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("text/event-stream"));

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}

/// Re-frame the upstream stream into the relay's own event protocol.
async fn stream_debug(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let request_id = Uuid::new_v4().to_string();
    let params = validate(req, &state.config.generation)?;

    info!(request_id, model = params.model, "Stream-debug request");

    let rx = state.adapter.stream(&params).await?;
    Ok(Sse::new(relay_sse_stream(rx)).keep_alive(KeepAlive::default()))
}

/// Diagnostic: call the upstream directly and relay the unprocessed body.
///
/// Exists to debug adapter-vs-upstream discrepancies, so the request is
/// built by hand here rather than going through the adapter.
async fn test_raw(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateRequest>,
) -> Result<Response, RelayError> {
    let params = validate(req, &state.config.generation)?;

    let body = json!({
        "model": params.model,
        "messages": [{ "role": "user", "content": params.prompt }],
        "stream": true,
        "max_tokens": state.config.generation.probe_max_tokens,
    });

    let upstream = state
        .http
        .post(state.upstream.chat_completions_url())
        .bearer_auth(&state.api_key)
        .json(&body)
        .send()
        .await?;

    let status = upstream.status();
    info!(status = status.as_u16(), "Raw probe upstream status");

    if !status.is_success() {
        let text = upstream.text().await.unwrap_or_default();
        let code = StatusCode::from_u16(status.as_u16())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return Ok((code, format!("API Error: {} - {}", status.as_u16(), text)).into_response());
    }

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response.headers_mut().insert(
        HeaderName::from_static("x-debug"),
        HeaderValue::from_static("raw-upstream-response"),
    );
    Ok(response)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        upstream: state.upstream.base_url.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gen_config() -> GenerationConfig {
        GenerationConfig::default()
    }

    #[test]
    fn test_missing_prompt_is_rejected() {
        let err = validate(GenerateRequest::default(), &gen_config()).unwrap_err();
        assert!(matches!(err, RelayError::InvalidInput(_)));
    }

    #[test]
    fn test_blank_prompt_is_rejected() {
        let req = GenerateRequest {
            prompt: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(validate(req, &gen_config()).is_err());
    }

    #[test]
    fn test_defaults_are_filled() {
        let req = GenerateRequest {
            prompt: Some("hello".to_string()),
            ..Default::default()
        };
        let params = validate(req, &gen_config()).unwrap();
        assert_eq!(params.model, "meta/llama3.3-70b-instruct");
        assert_eq!(params.max_tokens, 1000);
        assert!(params.temperature.is_none());
    }

    #[test]
    fn test_unknown_model_is_forwarded_unchanged() {
        let req = GenerateRequest {
            prompt: Some("hello".to_string()),
            model: Some("acme/not-a-real-model".to_string()),
            ..Default::default()
        };
        let params = validate(req, &gen_config()).unwrap();
        assert_eq!(params.model, "acme/not-a-real-model");
    }

    #[test]
    fn test_max_tokens_is_clamped_and_zero_rejected() {
        let mut req = GenerateRequest {
            prompt: Some("hello".to_string()),
            max_tokens: Some(1_000_000),
            ..Default::default()
        };
        let params = validate(req, &gen_config()).unwrap();
        assert_eq!(params.max_tokens, gen_config().max_tokens_limit);

        req = GenerateRequest {
            prompt: Some("hello".to_string()),
            max_tokens: Some(0),
            ..Default::default()
        };
        assert!(validate(req, &gen_config()).is_err());
    }
}
