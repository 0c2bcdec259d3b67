//! HTTP surface of the proxy
//!
//! Chat-completion calls are relayed and captured; token counting and any
//! other path are relayed untouched. A few local routes expose the captured
//! log for viewers.

use axum::{
    Json, Router,
    body::Body,
    extract::{Request, State},
    http::Response,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::{ChatTapError, Result};
use crate::store::{InteractionStore, StoreDocument};

use super::error::ProxyError;
use super::relay::{CapturePolicy, InboundRequest, RelayEngine};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RelayEngine>,
}

impl AppState {
    pub fn new(engine: RelayEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    fn store(&self) -> &InteractionStore {
        self.engine.store()
    }
}

/// The main proxy server
pub struct ProxyServer {
    config: Config,
}

impl ProxyServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Open the store, bind the listener, and serve until shutdown
    pub async fn serve(&self) -> Result<()> {
        let store = Arc::new(InteractionStore::open(self.config.storage.prompts_path())?);
        let engine = RelayEngine::new(&self.config.proxy, store)?;

        let addr: SocketAddr = self
            .config
            .proxy
            .listen_addr
            .parse()
            .map_err(|e| ChatTapError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting proxy server on {addr}");
        tracing::info!("Forwarding to: {}", engine.target().base());
        tracing::info!("Logging to: {}", engine.store().path().display());
        if !self.config.proxy.verify_ssl {
            tracing::warn!("SSL certificate verification is disabled for all upstream calls");
        }

        let app = create_router(AppState::new(engine));

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ChatTapError::Proxy(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ChatTapError::Proxy(format!("Server error: {e}")))?;

        tracing::info!("Proxy server shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/report/data", get(report_data_handler))
        .route("/report/status", get(report_status_handler))
        .route("/v1/messages", post(messages_handler))
        .route("/v1/messages/count_tokens", post(count_tokens_handler))
        .fallback(passthrough_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Chat completion capture proxy is running",
        "target": state.engine.target().base(),
        "report": "/report/data",
    }))
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

async fn report_data_handler(State(state): State<AppState>) -> Json<StoreDocument> {
    let store = state.engine.store().clone();
    let snapshot = tokio::task::spawn_blocking(move || store.read_snapshot())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Snapshot read task failed: {e}");
            StoreDocument::empty()
        });
    Json(snapshot)
}

/// Modification time of the log file, 0 when absent
async fn report_status_handler(State(state): State<AppState>) -> Json<Value> {
    let mtime = state
        .store()
        .modified_time()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    Json(json!({ "mtime": mtime }))
}

async fn messages_handler(State(state): State<AppState>, request: Request) -> Response<Body> {
    relay(&state, request, CapturePolicy::Capture).await
}

async fn count_tokens_handler(State(state): State<AppState>, request: Request) -> Response<Body> {
    relay(&state, request, CapturePolicy::Skip).await
}

async fn passthrough_handler(State(state): State<AppState>, request: Request) -> Response<Body> {
    relay(&state, request, CapturePolicy::Skip).await
}

async fn relay(state: &AppState, request: Request, policy: CapturePolicy) -> Response<Body> {
    match read_inbound(request).await {
        Ok(inbound) => state.engine.relay(inbound, policy).await,
        Err(e) => e.into_response(),
    }
}

async fn read_inbound(request: Request) -> std::result::Result<InboundRequest, ProxyError> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::Request(format!("Failed to read request body: {e}")))?;

    Ok(InboundRequest {
        method: parts.method,
        path_and_query,
        headers: parts.headers,
        body,
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
