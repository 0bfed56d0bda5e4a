//! Persistence seam.
//!
//! Everything above this module talks to [`Storage`] and [`StoreTx`];
//! the shipped backend is SQLite through `sqlx`.

#[cfg(test)]
pub mod memory;
mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use inkwell_common::{
    Author, AuthorProfile, CommentView, Commenter, InkwellError, Post, PostDraft, PostLink,
};
use thiserror::Error;

/// Storage failures. `NotFound` is an expected outcome, not a fault.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

impl From<StoreError> for InkwellError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => InkwellError::NotFound("record not found".to_string()),
            other => InkwellError::Storage(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// An open write transaction.
///
/// Dropping a transaction without calling [`StoreTx::commit`] discards its
/// writes.
#[async_trait]
pub trait StoreTx: Send {
    /// Id of the commenter with this identity triple, inserting it if new
    async fn insert_commenter(&mut self, commenter: &Commenter) -> StoreResult<i64>;

    async fn insert_comment(&mut self, commenter_id: i64, post_id: i64, body: &str)
    -> StoreResult<i64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Blog storage backend
#[async_trait]
pub trait Storage: Send + Sync {
    /// Cheap liveness check
    async fn ping(&self) -> StoreResult<()>;

    async fn post_id_by_url(&self, url: &str) -> StoreResult<i64>;

    /// Id of the commenter with this exact identity triple
    async fn lookup_commenter(&self, name: &str, email: &str, website: &str) -> StoreResult<i64>;

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;

    /// Newest posts first; `None` lists them all
    async fn titles(&self, limit: Option<u32>, include_hidden: bool) -> StoreResult<Vec<PostLink>>;

    /// Full posts with their tags, newest first
    async fn posts(&self, limit: u32, offset: u32, include_hidden: bool) -> StoreResult<Vec<Post>>;

    async fn num_posts(&self, include_hidden: bool) -> StoreResult<u32>;

    /// Posts carrying `tag`, newest first
    async fn titles_by_tag(&self, tag: &str, include_hidden: bool) -> StoreResult<Vec<PostLink>>;

    /// Every tag ever used, alphabetical
    async fn all_tags(&self) -> StoreResult<Vec<String>>;

    async fn post(&self, url: &str) -> StoreResult<Post>;

    /// Comments on one post, oldest first
    async fn comments_for_post(&self, post_id: i64) -> StoreResult<Vec<CommentView>>;

    /// Every comment on the blog, newest first
    async fn all_comments(&self) -> StoreResult<Vec<CommentView>>;

    async fn author(&self, username: &str) -> StoreResult<Author>;

    async fn author_by_id(&self, id: i64) -> StoreResult<Author>;

    /// Overwrite the profile fields, and the password hash when one is given
    async fn update_author(
        &self,
        id: i64,
        profile: &AuthorProfile,
        password_hash: Option<&str>,
    ) -> StoreResult<()>;

    /// Insert the author unless one already exists. Returns true when inserted.
    async fn ensure_author(&self, author: &Author) -> StoreResult<bool>;

    /// Update the post with the draft's url, or insert a new one.
    /// The post's tags become exactly the draft's.
    async fn insert_or_update_post(&self, author_id: i64, draft: &PostDraft) -> StoreResult<i64>;

    async fn delete_comment(&self, id: i64) -> StoreResult<()>;

    async fn update_comment(&self, id: i64, body: &str) -> StoreResult<()>;

    /// Delete a post with its comments and tag mappings
    async fn delete_post(&self, url: &str) -> StoreResult<()>;
}
