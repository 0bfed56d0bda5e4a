//! Public post views.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::{HeaderMap, header},
    response::IntoResponse,
};
use inkwell_common::constants::{NUM_FEED_ITEMS, NUM_RECENT_POSTS, POSTS_PER_PAGE};
use inkwell_common::{CommentView, InkwellError, Post, PostLink};
use serde::Serialize;

use super::ApiError;
use crate::feed::{FeedChannel, render_rss};
use crate::httputil::{add_protocol, request_host};
use crate::session::SessionContext;
use crate::state::AppState;
use crate::storage::StoreError;

#[derive(Serialize)]
pub struct IndexView {
    blog_title: String,
    blog_description: String,
    /// Full posts on this page
    posts: Vec<Post>,
    /// Sidebar links to the newest posts
    recent: Vec<PostLink>,
    /// 1-based
    page: u32,
    num_pages: u32,
    admin: bool,
}

/// GET /
pub async fn index(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<IndexView>, ApiError> {
    index_page(&state, &session, 1).await.map(Json)
}

/// GET /page/{n}. Anything that is not a positive number shows page 1.
pub async fn page(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(n): Path<String>,
) -> Result<Json<IndexView>, ApiError> {
    let page = n.parse::<u32>().ok().filter(|&n| n > 0).unwrap_or(1);
    index_page(&state, &session, page).await.map(Json)
}

async fn index_page(
    state: &AppState,
    session: &SessionContext,
    page: u32,
) -> Result<IndexView, ApiError> {
    let admin = session.is_admin();
    let offset = (page - 1).saturating_mul(POSTS_PER_PAGE);
    let posts = state.storage.posts(POSTS_PER_PAGE, offset, admin).await?;
    let recent = state.storage.titles(Some(NUM_RECENT_POSTS), admin).await?;
    let num_posts = state.storage.num_posts(admin).await?;

    Ok(IndexView {
        blog_title: state.config.blog.title.clone(),
        blog_description: state.config.blog.description.clone(),
        posts,
        recent,
        page,
        num_pages: num_posts.div_ceil(POSTS_PER_PAGE),
        admin,
    })
}

#[derive(Serialize)]
pub struct ListingView {
    blog_title: String,
    heading: String,
    posts: Vec<PostLink>,
}

/// GET /archive: every post, newest first
pub async fn archive(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<ListingView>, ApiError> {
    let posts = state.storage.titles(None, session.is_admin()).await?;
    Ok(Json(ListingView {
        blog_title: state.config.blog.title.clone(),
        heading: "All posts".to_string(),
        posts,
    }))
}

/// GET /tag/{tag}
pub async fn posts_with_tag(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(tag): Path<String>,
) -> Result<Json<ListingView>, ApiError> {
    let tag = tag.to_lowercase();
    let posts = state.storage.titles_by_tag(&tag, session.is_admin()).await?;
    Ok(Json(ListingView {
        blog_title: state.config.blog.title.clone(),
        heading: format!("Posts tagged '{tag}'"),
        posts,
    }))
}

/// GET /feeds/rss.xml: the newest visible posts
pub async fn rss_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let posts = state.storage.posts(NUM_FEED_ITEMS, 0, false).await?;

    let (author_name, author_email) = match posts.first() {
        Some(post) => match state.storage.author_by_id(post.author_id).await {
            Ok(author) => (author.full_name, author.email),
            Err(StoreError::NotFound) => Default::default(),
            Err(e) => return Err(e.into()),
        },
        None => Default::default(),
    };

    let channel = FeedChannel {
        title: state.config.blog.title.clone(),
        description: state.config.blog.description.clone(),
        link: add_protocol(&request_host(&headers), "http"),
        author_name,
        author_email,
    };
    let xml = render_rss(&channel, &posts).map_err(|e| InkwellError::Internal(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")], xml))
}

#[derive(Serialize)]
pub struct PostView {
    blog_title: String,
    post: Post,
    comments: Vec<CommentView>,
    #[serde(rename = "captcha-id")]
    captcha_id: String,
    #[serde(rename = "captcha-task")]
    captcha_task: String,
    admin: bool,
}

/// GET /{url}
///
/// Each view deals the visitor a new random CAPTCHA for their next comment.
pub async fn show_post(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    Path(url): Path<String>,
) -> Result<Json<PostView>, ApiError> {
    let admin = session.is_admin();
    let post = state.storage.post(&url).await?;
    if post.hidden && !admin {
        return Err(InkwellError::NotFound(format!("post {url:?}")).into());
    }
    let comments = state.storage.comments_for_post(post.id).await?;

    let cursor = state.deck.set_next_task(-1);
    session.set_captcha_cursor(cursor);
    let task = state.deck.next_task(cursor);

    Ok(Json(PostView {
        blog_title: state.config.blog.title.clone(),
        post,
        comments,
        captcha_id: String::new(),
        captcha_task: task.task.clone(),
        admin,
    }))
}
