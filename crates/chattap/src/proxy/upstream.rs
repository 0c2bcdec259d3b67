//! Configured upstream target and outbound header rewriting
//!
//! Inbound paths and query strings are appended verbatim to the configured
//! base URL, so a base with a path prefix (e.g. `https://host/anthropic`) keeps
//! that prefix.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{ChatTapError, Result};

/// Headers that are never forwarded in either direction
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "proxy-connection",
    "te",
    "upgrade",
];

/// Additional request headers dropped before forwarding.
///
/// `accept-encoding` is dropped so the upstream never compresses a body
/// whose `content-encoding` header would be stripped on the way back.
const REQUEST_STRIPPED: &[&str] = &["content-length", "accept-encoding"];

/// Additional response headers dropped before relaying
const RESPONSE_STRIPPED: &[&str] = &["content-encoding", "content-length"];

/// Compatibility mode derived from the upstream URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFlavor {
    /// Upstream accepts the inbound headers as-is
    Standard,
    /// MiniMax's Anthropic-compatible endpoint, which authenticates via `x-api-key`
    MiniMax,
}

impl UpstreamFlavor {
    pub fn detect(url: &Url) -> Self {
        if url.as_str().to_lowercase().contains("minimax") {
            UpstreamFlavor::MiniMax
        } else {
            UpstreamFlavor::Standard
        }
    }
}

/// The configured upstream chat-completion server
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamTarget {
    base: String,
    /// The extracted host (domain or IP) of the base URL
    pub host: String,
    pub flavor: UpstreamFlavor,
}

impl UpstreamTarget {
    /// Validate the configured base URL
    ///
    /// # Examples
    /// ```
    /// # use chattap::proxy::UpstreamTarget;
    /// let target = UpstreamTarget::parse("https://api.anthropic.com/").unwrap();
    /// assert_eq!(target.host, "api.anthropic.com");
    /// assert_eq!(
    ///     target.url_for("/v1/messages?beta=true").unwrap().as_str(),
    ///     "https://api.anthropic.com/v1/messages?beta=true"
    /// );
    /// ```
    pub fn parse(base: &str) -> Result<Self> {
        let base = base.trim_end_matches('/');
        let url = Url::parse(base)
            .map_err(|e| ChatTapError::Config(format!("Invalid target server '{base}': {e}")))?;

        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ChatTapError::Config(format!(
                "Unsupported URL scheme '{scheme}': only http and https are allowed"
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ChatTapError::Config(format!("URL '{base}' has no host")))?
            .to_string();

        Ok(Self {
            base: base.to_string(),
            host,
            flavor: UpstreamFlavor::detect(&url),
        })
    }

    /// Base URL without trailing slash
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Full upstream URL for an inbound path and query
    pub fn url_for(&self, path_and_query: &str) -> Result<Url> {
        let joined = format!("{}{}", self.base, path_and_query);
        Url::parse(&joined)
            .map_err(|e| ChatTapError::Proxy(format!("Invalid upstream URL '{joined}': {e}")))
    }
}

/// Headers to send upstream for an inbound request
pub fn forward_request_headers(headers: &HeaderMap, flavor: UpstreamFlavor) -> HeaderMap {
    let mut forwarded = filter_headers(headers, REQUEST_STRIPPED);

    if flavor == UpstreamFlavor::MiniMax {
        let api_key = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(str::trim)
            .and_then(|key| HeaderValue::from_str(key).ok());

        if let Some(api_key) = api_key {
            forwarded.insert(HeaderName::from_static("x-api-key"), api_key);
        }
    }

    forwarded
}

/// Headers to relay back to the caller for an upstream response
pub fn relay_response_headers(headers: &HeaderMap) -> HeaderMap {
    filter_headers(headers, RESPONSE_STRIPPED)
}

fn filter_headers(headers: &HeaderMap, extra: &[&str]) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers.iter() {
        let name_str = name.as_str();
        if !HOP_BY_HOP_HEADERS.contains(&name_str) && !extra.contains(&name_str) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("localhost:8082"));
        headers.insert("content-length", HeaderValue::from_static("42"));
        headers.insert("accept-encoding", HeaderValue::from_static("gzip"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("authorization", HeaderValue::from_static("Bearer sk-test "));
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers
    }

    #[test]
    fn test_parse_trims_trailing_slash() {
        let target = UpstreamTarget::parse("http://localhost:8080/").unwrap();
        assert_eq!(target.base(), "http://localhost:8080");
        assert_eq!(target.host, "localhost");
        assert_eq!(target.flavor, UpstreamFlavor::Standard);
    }

    #[test]
    fn test_url_for_keeps_base_path_prefix() {
        let target = UpstreamTarget::parse("https://api.minimax.io/anthropic").unwrap();
        assert_eq!(
            target.url_for("/v1/messages").unwrap().as_str(),
            "https://api.minimax.io/anthropic/v1/messages"
        );
        assert_eq!(target.flavor, UpstreamFlavor::MiniMax);
    }

    #[test]
    fn test_parse_rejects_non_http() {
        let err = UpstreamTarget::parse("ftp://files.example.com").unwrap_err();
        assert!(err.to_string().contains("only http and https"));
        assert!(UpstreamTarget::parse("not a url").is_err());
    }

    #[test]
    fn test_ipv6_host() {
        let target = UpstreamTarget::parse("http://[::1]:8080").unwrap();
        assert_eq!(target.host, "[::1]");
    }

    #[test]
    fn test_forward_strips_hop_headers() {
        let forwarded = forward_request_headers(&inbound_headers(), UpstreamFlavor::Standard);

        assert!(forwarded.get("host").is_none());
        assert!(forwarded.get("content-length").is_none());
        assert!(forwarded.get("accept-encoding").is_none());
        assert!(forwarded.get("connection").is_none());
        assert!(forwarded.get("x-api-key").is_none());
        assert_eq!(forwarded["authorization"], "Bearer sk-test ");
        assert_eq!(forwarded["anthropic-version"], "2023-06-01");
    }

    #[test]
    fn test_minimax_translates_bearer_token() {
        let forwarded = forward_request_headers(&inbound_headers(), UpstreamFlavor::MiniMax);

        assert_eq!(forwarded["x-api-key"], "sk-test");
        assert_eq!(forwarded["authorization"], "Bearer sk-test ");
    }

    #[test]
    fn test_minimax_ignores_non_bearer_auth() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        let forwarded = forward_request_headers(&headers, UpstreamFlavor::MiniMax);
        assert!(forwarded.get("x-api-key").is_none());
    }

    #[test]
    fn test_response_headers_strip_encoding_and_length() {
        let mut headers = HeaderMap::new();
        headers.insert("content-encoding", HeaderValue::from_static("gzip"));
        headers.insert("content-length", HeaderValue::from_static("10"));
        headers.insert("transfer-encoding", HeaderValue::from_static("chunked"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let relayed = relay_response_headers(&headers);
        assert!(relayed.get("content-encoding").is_none());
        assert!(relayed.get("content-length").is_none());
        assert!(relayed.get("transfer-encoding").is_none());
        assert_eq!(relayed["content-type"], "application/json");
        assert_eq!(relayed.get_all("set-cookie").iter().count(), 2);
    }
}
