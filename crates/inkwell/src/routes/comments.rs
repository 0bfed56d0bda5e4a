//! Comment submission endpoint.

use axum::{
    Extension, Form, Json,
    extract::{ConnectInfo, State},
    http::HeaderMap,
};
use inkwell_common::{CommentReply, Commenter, SubmitStatus};
use serde::Deserialize;
use std::net::SocketAddr;

use super::ApiError;
use crate::comments::{CommentSubmission, SubmissionOutcome};
use crate::httputil::{add_protocol, client_ip, extract_referer, request_host};
use crate::session::SessionContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    text: String,
    #[serde(rename = "captcha-id", default)]
    captcha_id: String,
    #[serde(default)]
    captcha: String,
}

/// POST /comment_submit
///
/// The post is the last path segment of the `Referer`.
pub async fn submit_comment(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    peer: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Result<Json<CommentReply>, ApiError> {
    let peer = peer.map(|Extension(ConnectInfo(addr))| addr);
    let commenter = Commenter::new(
        form.name,
        form.email,
        add_protocol(&form.website, "http"),
        client_ip(&headers, peer),
    );

    let submission = CommentSubmission {
        commenter,
        body: form.text,
        captcha_id: Some(form.captcha_id).filter(|id| !id.is_empty()),
        captcha_answer: form.captcha,
        post_url: extract_referer(&headers),
        host: request_host(&headers),
    };

    let outcome = state
        .comments
        .submit(&submission, session.captcha_cursor())
        .await?;

    let metrics = &state.metrics;
    let reply = match outcome {
        SubmissionOutcome::Accepted { redir } => {
            metrics.comments_accepted.inc();
            CommentReply::accepted(redir)
        }
        SubmissionOutcome::ShowCaptcha(task) => {
            metrics.captchas_shown.inc();
            CommentReply::challenge(
                SubmitStatus::ShowCaptcha,
                &task.id,
                &task.task,
                &submission.commenter,
                &submission.body,
            )
        }
        SubmissionOutcome::Rejected(task) => {
            metrics.comments_rejected.inc();
            CommentReply::challenge(
                SubmitStatus::Rejected,
                &task.id,
                &task.task,
                &submission.commenter,
                &submission.body,
            )
        }
    };

    Ok(Json(reply))
}
