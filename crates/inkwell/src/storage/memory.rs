//! In-memory storage with fault injection, for tests.

use async_trait::async_trait;
use inkwell_common::{
    Author, AuthorProfile, CommentView, Commenter, Post, PostDraft, PostLink, format_timestamp,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Storage, StoreError, StoreResult, StoreTx};

#[derive(Clone)]
struct StoredComment {
    id: i64,
    commenter_id: i64,
    post_id: i64,
    body: String,
    timestamp: i64,
}

#[derive(Default)]
struct MemoryState {
    authors: Vec<Author>,
    posts: Vec<Post>,
    commenters: Vec<(i64, Commenter)>,
    comments: Vec<StoredComment>,
    tags: BTreeSet<String>,
    next_id: i64,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn commenter_id(&self, commenter: &Commenter) -> Option<i64> {
        self.commenters
            .iter()
            .find(|(_, c)| same_identity(c, commenter))
            .map(|(id, _)| *id)
    }

    /// Visible posts, newest first
    fn newest(&self, include_hidden: bool) -> impl Iterator<Item = &Post> {
        self.posts.iter().rev().filter(move |p| include_hidden || !p.hidden)
    }

    fn view(&self, comment: &StoredComment) -> Option<CommentView> {
        let post = self.posts.iter().find(|p| p.id == comment.post_id)?;
        let (_, commenter) = self.commenters.iter().find(|(id, _)| *id == comment.commenter_id)?;
        Some(CommentView {
            id: comment.id,
            post_url: post.url.clone(),
            post_title: post.title.clone(),
            name: commenter.name.clone(),
            email: commenter.email.clone(),
            website: commenter.website.clone(),
            body: comment.body.clone(),
            timestamp: comment.timestamp,
            time: format_timestamp(comment.timestamp),
        })
    }
}

fn same_identity(a: &Commenter, b: &Commenter) -> bool {
    a.name == b.name && a.email == b.email && a.website == b.website
}

fn link(post: &Post) -> PostLink {
    PostLink {
        title: post.title.clone(),
        url: post.url.clone(),
    }
}

fn sorted_tags(tags: &[String]) -> Vec<String> {
    tags.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect()
}

#[derive(Default)]
struct Faults {
    lookup: AtomicBool,
    insert_comment: AtomicBool,
    post_lookup: AtomicBool,
}

/// Storage held in a mutex. Transactions stage writes and apply them on
/// commit.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<Faults>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a visible post and return its id
    pub fn add_post(&self, url: &str, title: &str) -> i64 {
        let mut state = self.state();
        let id = state.allocate_id();
        state.posts.push(Post {
            id,
            author_id: 1,
            title: title.to_string(),
            url: url.to_string(),
            body: format!("Body of {title}"),
            date: chrono::Utc::now().timestamp(),
            hidden: false,
            tags: Vec::new(),
        });
        id
    }

    pub fn add_author(&self, author: Author) {
        self.state().authors.push(author);
    }

    pub fn commenter_count(&self) -> usize {
        self.state().commenters.len()
    }

    pub fn comment_count(&self) -> usize {
        self.state().comments.len()
    }

    /// Make commenter lookups fail with a database error
    pub fn fail_lookups(&self, fail: bool) {
        self.faults.lookup.store(fail, Ordering::SeqCst);
    }

    /// Make comment inserts fail inside transactions
    pub fn fail_comment_inserts(&self, fail: bool) {
        self.faults.insert_comment.store(fail, Ordering::SeqCst);
    }

    /// Make post id lookups fail with a database error
    pub fn fail_post_lookups(&self, fail: bool) {
        self.faults.post_lookup.store(fail, Ordering::SeqCst);
    }
}

enum Staged {
    Commenter(i64, Commenter),
    Comment(StoredComment),
}

pub struct MemoryTx {
    storage: MemoryStorage,
    staged: Vec<Staged>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_commenter(&mut self, commenter: &Commenter) -> StoreResult<i64> {
        let staged = self.staged.iter().find_map(|s| match s {
            Staged::Commenter(id, c) if same_identity(c, commenter) => Some(*id),
            _ => None,
        });
        if let Some(id) = staged {
            return Ok(id);
        }

        let mut state = self.storage.state();
        if let Some(id) = state.commenter_id(commenter) {
            return Ok(id);
        }
        let id = state.allocate_id();
        drop(state);
        self.staged.push(Staged::Commenter(id, commenter.clone()));
        Ok(id)
    }

    async fn insert_comment(
        &mut self,
        commenter_id: i64,
        post_id: i64,
        body: &str,
    ) -> StoreResult<i64> {
        if self.storage.faults.insert_comment.load(Ordering::SeqCst) {
            return Err(StoreError::Other("injected comment insert failure".into()));
        }
        let id = self.storage.state().allocate_id();
        self.staged.push(Staged::Comment(StoredComment {
            id,
            commenter_id,
            post_id,
            body: body.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        }));
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let mut state = self.storage.state();
        for staged in self.staged {
            match staged {
                // lost a race with another transaction for this identity
                Staged::Commenter(_, c) if state.commenter_id(&c).is_some() => {}
                Staged::Commenter(id, c) => state.commenters.push((id, c)),
                Staged::Comment(c) => state.comments.push(c),
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn post_id_by_url(&self, url: &str) -> StoreResult<i64> {
        if self.faults.post_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Other("injected post lookup failure".into()));
        }
        self.state()
            .posts
            .iter()
            .find(|p| p.url == url)
            .map(|p| p.id)
            .ok_or(StoreError::NotFound)
    }

    async fn lookup_commenter(&self, name: &str, email: &str, website: &str) -> StoreResult<i64> {
        if self.faults.lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Other("injected lookup failure".into()));
        }
        self.state()
            .commenter_id(&Commenter::new(name, email, website, ""))
            .ok_or(StoreError::NotFound)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        Ok(Box::new(MemoryTx {
            storage: self.clone(),
            staged: Vec::new(),
        }))
    }

    async fn titles(&self, limit: Option<u32>, include_hidden: bool) -> StoreResult<Vec<PostLink>> {
        let limit = limit.map_or(usize::MAX, |l| l as usize);
        Ok(self.state().newest(include_hidden).take(limit).map(link).collect())
    }

    async fn posts(&self, limit: u32, offset: u32, include_hidden: bool) -> StoreResult<Vec<Post>> {
        Ok(self
            .state()
            .newest(include_hidden)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn num_posts(&self, include_hidden: bool) -> StoreResult<u32> {
        let count = self.state().newest(include_hidden).count();
        u32::try_from(count).map_err(|_| StoreError::Other(format!("post count {count} out of range")))
    }

    async fn titles_by_tag(&self, tag: &str, include_hidden: bool) -> StoreResult<Vec<PostLink>> {
        Ok(self
            .state()
            .newest(include_hidden)
            .filter(|p| p.tags.iter().any(|t| t == tag))
            .map(link)
            .collect())
    }

    async fn all_tags(&self) -> StoreResult<Vec<String>> {
        Ok(self.state().tags.iter().cloned().collect())
    }

    async fn post(&self, url: &str) -> StoreResult<Post> {
        self.state()
            .posts
            .iter()
            .find(|p| p.url == url)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn comments_for_post(&self, post_id: i64) -> StoreResult<Vec<CommentView>> {
        let state = self.state();
        Ok(state
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| state.view(c))
            .collect())
    }

    async fn all_comments(&self) -> StoreResult<Vec<CommentView>> {
        let state = self.state();
        Ok(state.comments.iter().rev().filter_map(|c| state.view(c)).collect())
    }

    async fn author(&self, username: &str) -> StoreResult<Author> {
        self.state()
            .authors
            .iter()
            .find(|a| a.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn author_by_id(&self, id: i64) -> StoreResult<Author> {
        self.state()
            .authors
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_author(
        &self,
        id: i64,
        profile: &AuthorProfile,
        password_hash: Option<&str>,
    ) -> StoreResult<()> {
        let mut state = self.state();
        let author = state
            .authors
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        author.full_name = profile.full_name.clone();
        author.email = profile.email.clone();
        author.website = profile.website.clone();
        if let Some(hash) = password_hash {
            author.password_hash = hash.to_string();
        }
        Ok(())
    }

    async fn ensure_author(&self, author: &Author) -> StoreResult<bool> {
        let mut state = self.state();
        if !state.authors.is_empty() {
            return Ok(false);
        }
        let id = state.allocate_id();
        state.authors.push(Author { id, ..author.clone() });
        Ok(true)
    }

    async fn insert_or_update_post(&self, author_id: i64, draft: &PostDraft) -> StoreResult<i64> {
        let mut state = self.state();
        let tags = sorted_tags(&draft.tags);
        state.tags.extend(tags.iter().cloned());

        if let Some(post) = state.posts.iter_mut().find(|p| p.url == draft.url) {
            post.title = draft.title.clone();
            post.body = draft.body.clone();
            post.hidden = draft.hidden;
            post.tags = tags;
            return Ok(post.id);
        }
        let id = state.allocate_id();
        state.posts.push(Post {
            id,
            author_id,
            title: draft.title.clone(),
            url: draft.url.clone(),
            body: draft.body.clone(),
            date: chrono::Utc::now().timestamp(),
            hidden: draft.hidden,
            tags,
        });
        Ok(id)
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state();
        let before = state.comments.len();
        state.comments.retain(|c| c.id != id);
        if state.comments.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_comment(&self, id: i64, body: &str) -> StoreResult<()> {
        let mut state = self.state();
        let comment = state
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::NotFound)?;
        comment.body = body.to_string();
        Ok(())
    }

    async fn delete_post(&self, url: &str) -> StoreResult<()> {
        let mut state = self.state();
        let post_id = state
            .posts
            .iter()
            .find(|p| p.url == url)
            .map(|p| p.id)
            .ok_or(StoreError::NotFound)?;
        state.comments.retain(|c| c.post_id != post_id);
        state.posts.retain(|p| p.id != post_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_commenter_dedupes_identity() {
        let storage = MemoryStorage::new();
        let commenter = Commenter::new("N", "@", "http://w", "10.0.0.1");

        let mut tx = storage.begin().await.unwrap();
        let first = tx.insert_commenter(&commenter).await.unwrap();
        let staged = tx.insert_commenter(&commenter).await.unwrap();
        assert_eq!(first, staged);
        tx.commit().await.unwrap();

        let mut tx = storage.begin().await.unwrap();
        let again = Commenter::new("N", "@", "http://w", "10.0.0.2");
        assert_eq!(tx.insert_commenter(&again).await.unwrap(), first);
        tx.commit().await.unwrap();
        assert_eq!(storage.commenter_count(), 1);
    }

    #[tokio::test]
    async fn test_racing_transactions_keep_one_commenter() {
        let storage = MemoryStorage::new();
        let commenter = Commenter::new("N", "@", "http://w", "");

        let mut a = storage.begin().await.unwrap();
        let mut b = storage.begin().await.unwrap();
        a.insert_commenter(&commenter).await.unwrap();
        b.insert_commenter(&commenter).await.unwrap();
        a.commit().await.unwrap();
        b.commit().await.unwrap();

        assert_eq!(storage.commenter_count(), 1);
    }
}
