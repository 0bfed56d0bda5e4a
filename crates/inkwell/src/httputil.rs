//! Small helpers for reading proxied requests.

use axum::http::HeaderMap;
use axum::http::header::{HOST, REFERER};
use inkwell_common::constants::headers::{X_FORWARDED_FOR, X_FORWARDED_HOST};
use std::net::SocketAddr;

/// Client address: first `X-Forwarded-For` entry, else the peer address
/// without its port
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => String::new(),
    }
}

/// Host the client addressed, honoring `X-Forwarded-Host`
pub fn request_host(headers: &HeaderMap) -> String {
    headers
        .get(X_FORWARDED_HOST)
        .or_else(|| headers.get(HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Prefix `url` with `protocol://` unless it already carries a scheme.
/// Empty stays empty.
pub fn add_protocol(url: &str, protocol: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let prefix = format!("{protocol}://");
    if url.to_lowercase().starts_with(&prefix) || url.contains("://") {
        url.to_string()
    } else {
        format!("{prefix}{url}")
    }
}

/// Last path segment of the `Referer` header, which is the post slug
pub fn extract_referer(headers: &HeaderMap) -> String {
    headers
        .get(REFERER)
        .and_then(|v| v.to_str().ok())
        .map(|referer| referer.rsplit('/').next().unwrap_or_default().to_string())
        .unwrap_or_default()
}
