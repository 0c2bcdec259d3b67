//! Fail-open error handling for the relay
//!
//! - Transport errors on buffered calls: returned to the caller as a 500
//! - Transport errors mid-stream: terminal error chunk, no capture
//! - Capture errors: logged and ignored (fire-and-forget)
//!
//! The relay never lets a capture failure change the response already produced.

use axum::{
    body::Body,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use thiserror::Error;
use tracing::{error, warn};

use crate::error::ChatTapError;

/// Errors that can occur while relaying a request
#[derive(Error, Debug, Clone)]
pub enum ProxyError {
    /// Inbound request could not be read or routed
    #[error("Request error: {0}")]
    Request(String),

    /// Network-level error (DNS, connection, TLS, timeout)
    #[error("Network error: {0}")]
    Network(String),
}

impl ProxyError {
    /// Classify a client error the way the caller-facing message should read
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProxyError::Network(format!("Request timed out: {e}"))
        } else if e.is_connect() {
            ProxyError::Network(format!("Failed to connect to upstream: {e}"))
        } else {
            ProxyError::Network(format!("Request failed: {e}"))
        }
    }

    /// Convert to a JSON 500 response
    pub fn into_response(self) -> Response<Body> {
        error!(
            error_type = self.category(),
            error_message = %self,
            "Forwarding error"
        );

        let error_body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "proxy_error",
            }
        });

        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header("content-type", "application/json")
            .body(Body::from(error_body.to_string()))
            .unwrap_or_else(|_| {
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            })
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ProxyError::Request(_) => "request",
            ProxyError::Network(_) => "network",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response<Body> {
        ProxyError::into_response(self)
    }
}

impl From<ChatTapError> for ProxyError {
    fn from(e: ChatTapError) -> Self {
        ProxyError::Request(e.to_string())
    }
}

/// Handle capture errors
///
/// Strategy: log and continue. Capture runs after the response has been
/// produced, so it must never surface to the caller.
pub fn handle_capture_error(error: &ChatTapError) {
    warn!(
        error_type = "capture",
        error_message = %error,
        "Failed to save interaction (fire-and-forget), continuing"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_network_error_is_json_500() {
        let response = ProxyError::Network("Failed to connect to upstream".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["type"], "proxy_error");
        assert!(
            json["error"]["message"]
                .as_str()
                .unwrap()
                .contains("Failed to connect")
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(ProxyError::Request("x".into()).category(), "request");
        assert_eq!(ProxyError::Network("x".into()).category(), "network");
    }

    #[test]
    fn test_from_chattap_error() {
        let err: ProxyError = ChatTapError::Proxy("bad url".into()).into();
        assert!(matches!(err, ProxyError::Request(msg) if msg.contains("bad url")));
    }

    #[test]
    fn test_capture_error_does_not_panic() {
        handle_capture_error(&ChatTapError::Storage("disk full".into()));
    }
}
