//! Request relay and capture
//!
//! Forwards one inbound request to the configured upstream, returns the
//! upstream's response (buffered or streamed), and hands the completed
//! exchange to the [`InteractionStore`] in the background.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Method, Response, StatusCode, header},
};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info, warn};
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::conversation::{ChatRequest, short_id};
use crate::error::{ChatTapError, Result};
use crate::store::{InteractionRecord, InteractionStore, ResponsePayload, capture_timestamp};

use super::error::{ProxyError, handle_capture_error};
use super::network::{TlsPolicy, classify_host};
use super::streaming::{StreamOutcome, TeeResult, error_chunk, tee_stream};
use super::upstream::{UpstreamTarget, forward_request_headers, relay_response_headers};

/// One inbound call, fully read
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path plus `?query`, forwarded unchanged
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Whether a relayed exchange is recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePolicy {
    Capture,
    Skip,
}

/// Request data retained until the response is complete
struct PendingCapture {
    request: ChatRequest,
    body: Value,
    captured_at: String,
}

/// Forwards requests upstream and records the exchanges
pub struct RelayEngine {
    target: UpstreamTarget,
    client: reqwest::Client,
    verify_ssl: bool,
    timeout: Duration,
    store: Arc<InteractionStore>,
}

impl RelayEngine {
    /// Build the engine and its shared pooled client
    pub fn new(config: &ProxyConfig, store: Arc<InteractionStore>) -> Result<Self> {
        let target = UpstreamTarget::parse(&config.target_server)?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| ChatTapError::Proxy(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            target,
            client,
            verify_ssl: config.verify_ssl,
            timeout,
            store,
        })
    }

    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    pub fn store(&self) -> &Arc<InteractionStore> {
        &self.store
    }

    /// Relay one request and produce the caller's response
    pub async fn relay(&self, inbound: InboundRequest, policy: CapturePolicy) -> Response<Body> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "relay",
            %request_id,
            method = %inbound.method,
            path = %inbound.path_and_query,
        );

        match self.forward(inbound, policy).instrument(span).await {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    async fn forward(
        &self,
        inbound: InboundRequest,
        policy: CapturePolicy,
    ) -> std::result::Result<Response<Body>, ProxyError> {
        let url = self.target.url_for(&inbound.path_and_query)?;

        let parsed: Option<Value> = serde_json::from_slice(&inbound.body).ok();
        let is_stream = parsed
            .as_ref()
            .and_then(|v| v.get("stream"))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let pending = match (policy, parsed) {
            (CapturePolicy::Capture, Some(body)) => match ChatRequest::from_value(&body) {
                Ok(request) => Some(PendingCapture {
                    request,
                    body,
                    captured_at: capture_timestamp(),
                }),
                Err(e) => {
                    debug!("Request body does not look like a chat request, not capturing: {e}");
                    None
                }
            },
            (CapturePolicy::Capture, None) => {
                debug!("Request body is not JSON, not capturing");
                None
            }
            (CapturePolicy::Skip, _) => None,
        };

        let headers = forward_request_headers(&inbound.headers, self.target.flavor);

        info!("Forwarding {} {url} (stream={is_stream})", inbound.method);

        let host_class = classify_host(&self.target.host).await;
        let tls = TlsPolicy::select(self.verify_ssl, &host_class);

        let one_off;
        let client = match tls {
            TlsPolicy::Pooled => &self.client,
            TlsPolicy::Unverified => {
                if let Some(ip) = host_class.addr {
                    warn!("Private IP detected ({ip}). Disabling SSL verify.");
                }
                one_off = self.unverified_client()?;
                &one_off
            }
        };

        let request = client
            .request(inbound.method, url)
            .headers(headers)
            .body(inbound.body);

        if is_stream {
            Ok(self.relay_streaming(request, pending).await)
        } else {
            self.relay_buffered(request, pending).await
        }
    }

    /// One-off client for private hosts: no pooling, no certificate checks
    fn unverified_client(&self) -> std::result::Result<reqwest::Client, ProxyError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(true)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ProxyError::Network(format!("Failed to create HTTP client: {e}")))
    }

    async fn relay_buffered(
        &self,
        request: reqwest::RequestBuilder,
        pending: Option<PendingCapture>,
    ) -> std::result::Result<Response<Body>, ProxyError> {
        let response = request.send().await.map_err(ProxyError::from_reqwest)?;

        let status = response.status();
        let headers = relay_response_headers(response.headers());
        let body = response.bytes().await.map_err(|e| {
            ProxyError::Network(format!("Failed to read response body: {e}"))
        })?;

        if let Some(pending) = pending {
            let payload = ResponsePayload::from_body(&body);
            tokio::spawn(capture(Arc::clone(&self.store), pending, payload).in_current_span());
        }

        Ok(build_response(status, headers, Body::from(body)))
    }

    async fn relay_streaming(
        &self,
        request: reqwest::RequestBuilder,
        pending: Option<PendingCapture>,
    ) -> Response<Body> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let e = ProxyError::from_reqwest(e);
                tracing::error!("Streaming error: {e}");
                return build_response(
                    StatusCode::OK,
                    event_stream_headers(HeaderMap::new()),
                    Body::from(error_chunk(&e.to_string())),
                );
            }
        };

        let status = response.status();
        let headers = event_stream_headers(relay_response_headers(response.headers()));

        let TeeResult {
            client_stream,
            buffer_handle,
        } = tee_stream(response.bytes_stream());

        if let Some(pending) = pending {
            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                match buffer_handle.outcome().await {
                    StreamOutcome::Completed(bytes) => {
                        capture(store, pending, ResponsePayload::from_stream(&bytes)).await;
                    }
                    StreamOutcome::Failed(reason) => {
                        debug!("Stream failed, not capturing: {reason}");
                    }
                }
            }
            .in_current_span());
        }

        build_response(status, headers, Body::from_stream(client_stream))
    }
}

/// Persist a completed exchange; errors are logged, never propagated
async fn capture(store: Arc<InteractionStore>, pending: PendingCapture, payload: ResponsePayload) {
    let record = InteractionRecord::new(
        &pending.request,
        pending.body,
        payload,
        pending.captured_at,
    );
    let conv_id = short_id(&record.conv_id).to_string();
    let messages_count = record.messages_count;

    let result = tokio::task::spawn_blocking(move || store.merge_or_append(record))
        .await
        .map_err(|e| ChatTapError::Storage(format!("Capture task failed: {e}")))
        .and_then(|r| r);

    match result {
        Ok(outcome) => debug!(%conv_id, messages_count, ?outcome, "Capture processed"),
        Err(e) => handle_capture_error(&e),
    }
}

fn event_stream_headers(mut headers: HeaderMap) -> HeaderMap {
    if !headers.contains_key(header::CONTENT_TYPE) {
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream"),
        );
    }
    headers
}

fn build_response(status: StatusCode, headers: HeaderMap, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_stream_headers_defaults_content_type() {
        let headers = event_stream_headers(HeaderMap::new());
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    }

    #[test]
    fn test_event_stream_headers_keeps_upstream_content_type() {
        let mut upstream = HeaderMap::new();
        upstream.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/event-stream; charset=utf-8"),
        );
        let headers = event_stream_headers(upstream);
        assert_eq!(
            headers[header::CONTENT_TYPE],
            "text/event-stream; charset=utf-8"
        );
    }

    #[test]
    fn test_engine_rejects_invalid_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InteractionStore::open(temp_dir.path().join("log.json")).unwrap());
        let config = ProxyConfig {
            target_server: "not a url".to_string(),
            ..ProxyConfig::default()
        };

        assert!(RelayEngine::new(&config, store).is_err());
    }
}
