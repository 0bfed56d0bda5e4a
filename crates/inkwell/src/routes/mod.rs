//! HTTP route handlers for Inkwell.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use inkwell_common::InkwellError;
use serde::Serialize;
use tower_http::catch_panic::CatchPanicLayer;

use crate::middleware;
use crate::state::AppState;
use crate::storage::StoreError;

mod admin;
mod comments;
mod health;
mod posts;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/metrics", get(health::metrics))

        // Comments
        .route("/comment_submit", post(comments::submit_comment))

        // Login
        .route("/login", post(admin::login))
        .route("/logout", get(admin::logout))

        // Admin endpoints (session must be logged in)
        .nest("/admin", admin_routes(state.clone()))

        // Posts
        .route("/", get(posts::index))
        .route("/page/{n}", get(posts::page))
        .route("/archive", get(posts::archive))
        .route("/tag/{tag}", get(posts::posts_with_tag))
        .route("/feeds/rss.xml", get(posts::rss_feed))
        .route("/{url}", get(posts::show_post));

    with_middleware(routes, state)
}

/// Admin routes (moderation and publishing)
fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/comments", get(admin::list_comments))
        .route("/edit_post", get(admin::edit_post))
        .route("/load_comments", get(admin::load_comments))
        .route("/author", get(admin::show_author).post(admin::update_author))
        .route("/delete_comment", post(admin::delete_comment))
        .route("/moderate_comment", post(admin::moderate_comment))
        .route("/submit_post", post(admin::submit_post))
        .route("/delete_post", post(admin::delete_post))
        .route_layer(from_fn_with_state(state, middleware::require_admin))
}

/// Wrap routes in the panic guard, session and request-log layers
fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
    routes
        .layer(CatchPanicLayer::custom(middleware::panic_response(state.metrics.clone())))
        .layer(from_fn_with_state(state.clone(), middleware::session_context))
        .layer(from_fn_with_state(state.clone(), middleware::track_requests))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Handler error, rendered as a JSON body with the matching status.
///
/// Server-side failures are logged in full and answered generically.
#[derive(Debug)]
pub struct ApiError(pub InkwellError);

impl From<InkwellError> for ApiError {
    fn from(e: InkwellError) -> Self {
        Self(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error = if self.0.is_client_error() {
            tracing::debug!(error = %self.0, "Request rejected");
            self.0.to_string()
        } else {
            tracing::error!(error = %self.0, "Request failed");
            "internal server error".to_string()
        };

        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Path a form's `redirect_to` field points at
fn redirect_path(redirect_to: &str) -> String {
    match redirect_to.trim_matches('/') {
        "" | "login" => "/".to_string(),
        target => format!("/{target}"),
    }
}
