//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit)
//! - Bind server to listener with graceful shutdown
//! - Bound how long a caller waits for a dispatch to settle

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{MailgateConfig, SecurityConfig};
use crate::dispatch::{DispatchEngine, DispatchRecord, IdempotencyKey};
use crate::http::request::{request_id, SendEmailRequest};
use crate::http::response::ApiError;
use crate::lifecycle::shutdown;
use crate::resilience::timeouts::with_deadline;
use crate::resilience::CircuitSnapshot;
use crate::security::validate_payload;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: DispatchEngine,
    pub request_timeout: Duration,
    pub limits: Arc<SecurityConfig>,
}

/// HTTP server for the dispatch API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &MailgateConfig, engine: DispatchEngine) -> Self {
        let state = AppState {
            engine,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            limits: Arc::new(config.security.clone()),
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &MailgateConfig, state: AppState) -> Router {
        Router::new()
            .route("/send-email", post(send_email))
            .route("/status/{key}", get(get_status))
            .route("/providers", get(get_providers))
            .route("/health", get(health))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(RequestBodyLimitLayer::new(config.security.max_body_size)),
            )
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn send_email(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request_id = request_id(&headers).to_string();

    let request: SendEmailRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("invalid request body: {e}")))?;
    let (payload, key) = request.into_parts(&headers)?;
    validate_payload(&payload, &state.limits)?;

    tracing::debug!(request_id = %request_id, key = %key, "Send request received");

    match with_deadline(state.request_timeout, state.engine.dispatch(payload, key.clone())).await {
        Ok(Ok(record)) => Ok((StatusCode::OK, Json(record)).into_response()),
        Ok(Err(e)) => {
            tracing::info!(request_id = %request_id, key = %key, error = %e, "Send request rejected");
            Err(e.into())
        }
        Err(elapsed) => {
            tracing::warn!(
                request_id = %request_id,
                key = %key,
                error = %elapsed,
                "Dispatch still running, answering with pending record"
            );
            match state.engine.get_status(&key) {
                Some(record) => Ok((StatusCode::ACCEPTED, Json(record)).into_response()),
                None => Err(ApiError::NotFound(key.to_string())),
            }
        }
    }
}

async fn get_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DispatchRecord>, ApiError> {
    let key = IdempotencyKey::new(key.as_str()).map_err(|_| ApiError::NotFound(key.clone()))?;
    state
        .engine
        .get_status(&key)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(key.to_string()))
}

async fn get_providers(State(state): State<AppState>) -> Json<Vec<CircuitSnapshot>> {
    Json(state.engine.providers())
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
