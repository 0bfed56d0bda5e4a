//! Login and the admin area.

use axum::{
    Extension, Form, Json,
    extract::{Query, State},
    response::Redirect,
};
use inkwell_common::{Author, AuthorProfile, CommentView, InkwellError, Post, PostDraft, explode_tags};
use serde::{Deserialize, Serialize};

use super::{ApiError, redirect_path};
use crate::auth::{hash_password_blocking, verify_password_blocking};
use crate::httputil::add_protocol;
use crate::session::SessionContext;
use crate::state::AppState;
use crate::storage::StoreError;

const COMMENTS_PAGE: &str = "/admin/comments";

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    uname: String,
    passwd: String,
    #[serde(default)]
    redirect_to: String,
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, ApiError> {
    let author = match state.storage.author(&form.uname).await {
        Ok(author) => author,
        Err(StoreError::NotFound) => {
            tracing::warn!(user = %form.uname, "Login for unknown user");
            return Err(InkwellError::Auth("invalid credentials".into()).into());
        }
        Err(e) => return Err(e.into()),
    };

    if !verify_password_blocking(author.password_hash.clone(), form.passwd.clone()).await? {
        tracing::warn!(user = %form.uname, "Login with wrong password");
        return Err(InkwellError::Auth("invalid credentials".into()).into());
    }

    session.log_in(author.id);
    tracing::info!(user = %author.username, "🔑 Admin logged in");
    Ok(Redirect::to(&redirect_path(&form.redirect_to)))
}

/// GET /logout
pub async fn logout(Extension(session): Extension<SessionContext>) -> Redirect {
    session.log_out();
    Redirect::to("/")
}

#[derive(Serialize)]
pub struct CommentsView {
    comments: Vec<CommentView>,
}

/// GET /admin/comments, newest first
pub async fn list_comments(State(state): State<AppState>) -> Result<Json<CommentsView>, ApiError> {
    let comments = state.storage.all_comments().await?;
    Ok(Json(CommentsView { comments }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteCommentForm {
    id: i64,
    #[serde(default)]
    action: String,
    #[serde(default)]
    redirect_to: String,
}

/// POST /admin/delete_comment
pub async fn delete_comment(
    State(state): State<AppState>,
    Form(form): Form<DeleteCommentForm>,
) -> Result<Redirect, ApiError> {
    if form.action == "delete" {
        state.storage.delete_comment(form.id).await?;
        tracing::info!(comment_id = form.id, "Comment deleted");
    }
    Ok(Redirect::to(&redirect_or_comments(&form.redirect_to)))
}

#[derive(Debug, Deserialize)]
pub struct ModerateCommentForm {
    id: i64,
    text: String,
    #[serde(default)]
    redirect_to: String,
}

/// POST /admin/moderate_comment
pub async fn moderate_comment(
    State(state): State<AppState>,
    Form(form): Form<ModerateCommentForm>,
) -> Result<Redirect, ApiError> {
    state.storage.update_comment(form.id, &form.text).await?;
    tracing::info!(comment_id = form.id, "Comment moderated");

    if form.redirect_to.is_empty() {
        return Ok(Redirect::to(COMMENTS_PAGE));
    }
    let target = format!("{}#comment-{}", redirect_path(&form.redirect_to), form.id);
    Ok(Redirect::to(&target))
}

#[derive(Debug, Deserialize)]
pub struct SubmitPostForm {
    title: String,
    url: String,
    #[serde(default)]
    text: String,
    /// Checkbox: "on" when ticked, absent otherwise
    #[serde(default)]
    hidden: Option<String>,
    /// Comma separated
    #[serde(default)]
    tags: String,
}

/// POST /admin/submit_post: insert, or update the post with that url
pub async fn submit_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Form(form): Form<SubmitPostForm>,
) -> Result<Redirect, ApiError> {
    let author_id = session_author(&session)?;

    let url = form.url.trim().to_string();
    if url.is_empty() || url.contains('/') {
        return Err(InkwellError::InvalidInput(format!("bad post url {url:?}")).into());
    }

    let draft = PostDraft {
        title: form.title,
        url,
        body: form.text,
        hidden: form.hidden.as_deref() == Some("on"),
        tags: explode_tags(&form.tags),
    };
    let post_id = state.storage.insert_or_update_post(author_id, &draft).await?;
    tracing::info!(post_id, url = %draft.url, hidden = draft.hidden, tags = ?draft.tags, "Post saved");

    Ok(Redirect::to(&format!("/{}", draft.url)))
}

#[derive(Debug, Deserialize)]
pub struct DeletePostForm {
    /// Url of the post
    id: String,
}

/// POST /admin/delete_post: removes the post and its comments
pub async fn delete_post(
    State(state): State<AppState>,
    Form(form): Form<DeletePostForm>,
) -> Result<Redirect, ApiError> {
    state.storage.delete_post(&form.id).await?;
    tracing::info!(url = %form.id, "Post deleted");
    Ok(Redirect::to(COMMENTS_PAGE))
}

#[derive(Debug, Deserialize)]
pub struct PostQuery {
    #[serde(default)]
    post: String,
}

#[derive(Serialize)]
pub struct EditPostView {
    /// None when writing a new post
    post: Option<Post>,
    hidden: bool,
    all_tags: Vec<String>,
}

/// GET /admin/edit_post?post={url}
///
/// An empty or unknown url opens a blank, hidden draft.
pub async fn edit_post(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> Result<Json<EditPostView>, ApiError> {
    let all_tags = state.storage.all_tags().await?;
    let url = query.post.trim_end_matches('&');

    let post = if url.is_empty() {
        None
    } else {
        match state.storage.post(url).await {
            Ok(post) => Some(post),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        }
    };

    Ok(Json(EditPostView {
        hidden: post.as_ref().is_none_or(|p| p.hidden),
        post,
        all_tags,
    }))
}

#[derive(Serialize)]
pub struct PostCommentsView {
    post: Post,
    comments: Vec<CommentView>,
}

/// GET /admin/load_comments?post={url}
pub async fn load_comments(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> Result<Json<PostCommentsView>, ApiError> {
    let post = state.storage.post(&query.post).await?;
    let comments = state.storage.comments_for_post(post.id).await?;
    Ok(Json(PostCommentsView { post, comments }))
}

#[derive(Serialize)]
pub struct AuthorView {
    author: Author,
}

/// GET /admin/author: the logged-in author's profile
pub async fn show_author(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<AuthorView>, ApiError> {
    let author = state.storage.author_by_id(session_author(&session)?).await?;
    Ok(Json(AuthorView { author }))
}

#[derive(Debug, Deserialize)]
pub struct AuthorForm {
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    website: String,
    #[serde(default)]
    old_password: String,
    /// Left empty to keep the current password
    #[serde(default)]
    new_password: String,
    #[serde(default)]
    confirm_password: String,
}

/// POST /admin/author
///
/// Changing the password needs the current one and a matching confirmation.
pub async fn update_author(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Form(form): Form<AuthorForm>,
) -> Result<Redirect, ApiError> {
    let author = state.storage.author_by_id(session_author(&session)?).await?;

    let password_hash = if form.new_password.is_empty() {
        None
    } else {
        if form.new_password != form.confirm_password {
            return Err(InkwellError::InvalidInput("new passwords do not match".into()).into());
        }
        if !verify_password_blocking(author.password_hash.clone(), form.old_password).await? {
            tracing::warn!(user = %author.username, "Profile update with wrong password");
            return Err(InkwellError::Auth("wrong password".into()).into());
        }
        Some(hash_password_blocking(form.new_password, state.config.password_cost).await?)
    };

    let profile = AuthorProfile {
        full_name: form.full_name,
        email: form.email,
        website: add_protocol(&form.website, "http"),
    };
    state
        .storage
        .update_author(author.id, &profile, password_hash.as_deref())
        .await?;
    tracing::info!(
        user = %author.username,
        password_changed = password_hash.is_some(),
        "Author profile updated"
    );
    Ok(Redirect::to("/admin/author"))
}

fn session_author(session: &SessionContext) -> Result<i64, InkwellError> {
    session
        .author_id()
        .ok_or_else(|| InkwellError::Forbidden("session has no author".into()))
}

fn redirect_or_comments(redirect_to: &str) -> String {
    if redirect_to.is_empty() {
        COMMENTS_PAGE.to_string()
    } else {
        redirect_path(redirect_to)
    }
}
