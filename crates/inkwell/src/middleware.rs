//! Request middleware: sessions, the admin gate, panic isolation and the
//! request log.
//!
//! Layer order, outermost first:
//! ```text
//! track_requests → session_context → CatchPanic → [require_admin] → handler
//! ```

use axum::{
    body::{Body, Bytes, to_bytes},
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use inkwell_common::InkwellError;
use inkwell_common::constants::MAX_BUFFERED_RESPONSE_BYTES;
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::httputil::client_ip;
use crate::metrics::ServerMetrics;
use crate::routes::ApiError;
use crate::session::SessionContext;
use crate::state::AppState;

/// A fully collected response body.
///
/// Dropping it without [`ResponseBuffer::flush`] discards the body.
struct ResponseBuffer {
    bytes: Option<Bytes>,
}

impl ResponseBuffer {
    async fn capture(body: Body) -> Result<Self, axum::Error> {
        let bytes = to_bytes(body, MAX_BUFFERED_RESPONSE_BYTES).await?;
        Ok(Self { bytes: Some(bytes) })
    }

    fn flush(mut self) -> Body {
        Body::from(self.bytes.take().unwrap_or_default())
    }
}

impl Drop for ResponseBuffer {
    fn drop(&mut self) {
        if let Some(bytes) = self.bytes.take() {
            tracing::debug!(bytes = bytes.len(), "Discarding buffered response");
        }
    }
}

/// Attach a [`SessionContext`] to the request and write it back before the
/// response body leaves the server.
pub async fn session_context(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let session = match SessionContext::load(req.headers(), &state.session_key) {
        Ok(session) => session,
        Err(e) => {
            tracing::warn!(error = %e, path = %req.uri().path(), "Rejecting request with bad session cookie");
            return ApiError(e).into_response();
        }
    };
    req.extensions_mut().insert(session.clone());

    let response = next.run(req).await;
    let (mut parts, body) = response.into_parts();

    let buffer = match ResponseBuffer::capture(body).await {
        Ok(buffer) => buffer,
        Err(e) => {
            return ApiError(InkwellError::Internal(format!("failed to buffer response: {e}")))
                .into_response();
        }
    };

    match session.save(&state.session_key) {
        Ok(Some(cookie)) => match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                parts.headers.append(SET_COOKIE, value);
            }
            Err(e) => {
                return ApiError(InkwellError::Session(format!("unusable cookie value: {e}")))
                    .into_response();
            }
        },
        Ok(None) => {}
        Err(e) => return ApiError(e).into_response(),
    }

    Response::from_parts(parts, buffer.flush())
}

/// Route layer for the admin tree: 403 unless the session is logged in
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let is_admin = req
        .extensions()
        .get::<SessionContext>()
        .is_some_and(SessionContext::is_admin);

    if !is_admin {
        state.metrics.forbidden_responses.inc();
        tracing::warn!(path = %req.uri().path(), "Admin area requested without login");
        return ApiError(InkwellError::Forbidden("admin login required".into())).into_response();
    }

    next.run(req).await
}

/// One log line and a latency sample per request
pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(req.headers(), peer);

    let response = next.run(req).await;
    let elapsed = start.elapsed();
    let status = response.status();

    let metrics = &state.metrics;
    if path.starts_with("/admin") {
        metrics.admin_requests.inc();
    } else {
        metrics.public_requests.inc();
    }
    if status.is_server_error() {
        metrics.internal_errors.inc();
    }
    metrics.observe_latency(elapsed);

    if path != "/favicon.ico" {
        tracing::info!(
            ip = %ip,
            method = %method,
            path = %path,
            status = status.as_u16(),
            latency_ms = elapsed.as_secs_f64() * 1000.0,
            "request"
        );
    }

    response
}

/// Response for a handler that panicked. The panic hook has already logged
/// the payload and backtrace.
pub fn panic_response(
    metrics: Arc<ServerMetrics>,
) -> impl FnMut(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |payload: Box<dyn Any + Send + 'static>| {
        metrics.panics.inc();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        ApiError(InkwellError::Internal(format!("handler panicked: {message}"))).into_response()
    }
}

/// Route panics through tracing with a backtrace
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        tracing::error!(panic = %info, backtrace = %backtrace, "💥 Panic");
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_buffer_flushes_captured_bytes() {
        let buffer = ResponseBuffer::capture(Body::from("hello")).await.unwrap();
        let body = to_bytes(buffer.flush(), usize::MAX).await.unwrap();
        assert_eq!(body, Bytes::from("hello"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let big = vec![b'x'; MAX_BUFFERED_RESPONSE_BYTES + 1];
        assert!(ResponseBuffer::capture(Body::from(big)).await.is_err());
    }

    #[test]
    fn test_panic_response_counts() {
        let metrics = Arc::new(ServerMetrics::new().unwrap());
        let mut handler = panic_response(metrics.clone());
        let response = handler(Box::new("boom"));
        assert_eq!(response.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(metrics.panics.get(), 1);
    }
}
