//! SQLite backend.

use async_trait::async_trait;
use inkwell_common::{
    Author, AuthorProfile, CommentView, Commenter, Post, PostDraft, PostLink, format_timestamp,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite};
use std::str::FromStr;

use super::{Storage, StoreError, StoreResult, StoreTx};

const SCHEMA: [&str; 7] = [
    r#"
    CREATE TABLE IF NOT EXISTS author (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        disp_name TEXT NOT NULL UNIQUE,
        passwd TEXT NOT NULL,
        full_name TEXT NOT NULL DEFAULT '',
        email TEXT NOT NULL DEFAULT '',
        www TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        author_id INTEGER NOT NULL REFERENCES author(id),
        title TEXT NOT NULL,
        date INTEGER NOT NULL,
        url TEXT NOT NULL UNIQUE,
        body TEXT NOT NULL,
        hidden BOOLEAN NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS commenter (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        www TEXT NOT NULL,
        ip TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS commenter_identity ON commenter (name, email, www)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comment (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        commenter_id INTEGER NOT NULL REFERENCES commenter(id),
        post_id INTEGER NOT NULL REFERENCES post(id),
        timestamp INTEGER NOT NULL,
        body TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tag (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tag TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tagmap (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        tag_id INTEGER NOT NULL REFERENCES tag(id),
        post_id INTEGER NOT NULL REFERENCES post(id),
        UNIQUE (tag_id, post_id)
    )
    "#,
];

const POST_SELECT: &str = "SELECT id, author_id, title, url, body, date, hidden FROM post";

const COMMENT_VIEW_SELECT: &str = r#"
    SELECT comment.id AS id, post.url AS post_url, post.title AS post_title,
           commenter.name AS name, commenter.email AS email, commenter.www AS www,
           comment.body AS body, comment.timestamp AS timestamp
    FROM comment
    INNER JOIN commenter ON comment.commenter_id = commenter.id
    INNER JOIN post ON comment.post_id = post.id
"#;

#[derive(FromRow)]
struct SqlPost {
    id: i64,
    author_id: i64,
    title: String,
    url: String,
    body: String,
    date: i64,
    hidden: bool,
}

impl From<SqlPost> for Post {
    fn from(sql: SqlPost) -> Self {
        Post {
            id: sql.id,
            author_id: sql.author_id,
            title: sql.title,
            url: sql.url,
            body: sql.body,
            date: sql.date,
            hidden: sql.hidden,
            tags: Vec::new(),
        }
    }
}

#[derive(FromRow)]
struct SqlComment {
    id: i64,
    post_url: String,
    post_title: String,
    name: String,
    email: String,
    www: String,
    body: String,
    timestamp: i64,
}

impl From<SqlComment> for CommentView {
    fn from(sql: SqlComment) -> Self {
        CommentView {
            id: sql.id,
            post_url: sql.post_url,
            post_title: sql.post_title,
            name: sql.name,
            email: sql.email,
            website: sql.www,
            body: sql.body,
            time: format_timestamp(sql.timestamp),
            timestamp: sql.timestamp,
        }
    }
}

#[derive(FromRow)]
struct SqlAuthor {
    id: i64,
    disp_name: String,
    passwd: String,
    full_name: String,
    email: String,
    www: String,
}

impl From<SqlAuthor> for Author {
    fn from(sql: SqlAuthor) -> Self {
        Author {
            id: sql.id,
            username: sql.disp_name,
            password_hash: sql.passwd,
            full_name: sql.full_name,
            email: sql.email,
            website: sql.www,
        }
    }
}

/// Pooled SQLite storage
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (creating if missing) the database at `url` and bootstrap the schema
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    /// Private in-memory database on a single pinned connection
    #[cfg(test)]
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("SQLite schema ready");
        Ok(())
    }

    async fn tags_for(&self, post_id: i64) -> StoreResult<Vec<String>> {
        let tags = sqlx::query_scalar(
            "SELECT tag.tag FROM tag INNER JOIN tagmap ON tagmap.tag_id = tag.id \
             WHERE tagmap.post_id = ? ORDER BY tag.tag",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn with_tags(&self, rows: Vec<SqlPost>) -> StoreResult<Vec<Post>> {
        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let mut post = Post::from(row);
            post.tags = self.tags_for(post.id).await?;
            posts.push(post);
        }
        Ok(posts)
    }
}

/// Point `post_id` at exactly `tags`, creating missing tag rows
async fn replace_tags(
    tx: &mut sqlx::Transaction<'static, Sqlite>,
    post_id: i64,
    tags: &[String],
) -> StoreResult<()> {
    sqlx::query("DELETE FROM tagmap WHERE post_id = ?")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;

    for tag in tags {
        sqlx::query("INSERT INTO tag (tag) VALUES (?) ON CONFLICT (tag) DO NOTHING")
            .bind(tag)
            .execute(&mut **tx)
            .await?;
        let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tag WHERE tag = ?")
            .bind(tag)
            .fetch_one(&mut **tx)
            .await?;
        sqlx::query("INSERT OR IGNORE INTO tagmap (tag_id, post_id) VALUES (?, ?)")
            .bind(tag_id)
            .bind(post_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Open SQLite transaction
pub struct SqliteTx {
    tx: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn insert_commenter(&mut self, commenter: &Commenter) -> StoreResult<i64> {
        // a concurrent submission may have created the same identity first
        sqlx::query(
            "INSERT INTO commenter (name, email, www, ip) VALUES (?, ?, ?, ?) \
             ON CONFLICT (name, email, www) DO NOTHING",
        )
        .bind(&commenter.name)
        .bind(&commenter.email)
        .bind(&commenter.website)
        .bind(&commenter.ip)
        .execute(&mut *self.tx)
        .await?;

        let id = sqlx::query_scalar("SELECT id FROM commenter WHERE name = ? AND email = ? AND www = ?")
            .bind(&commenter.name)
            .bind(&commenter.email)
            .bind(&commenter.website)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(id)
    }

    async fn insert_comment(
        &mut self,
        commenter_id: i64,
        post_id: i64,
        body: &str,
    ) -> StoreResult<i64> {
        let result = sqlx::query(
            "INSERT INTO comment (commenter_id, post_id, timestamp, body) VALUES (?, ?, ?, ?)",
        )
        .bind(commenter_id)
        .bind(post_id)
        .bind(chrono::Utc::now().timestamp())
        .bind(body)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn post_id_by_url(&self, url: &str) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT id FROM post WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn lookup_commenter(&self, name: &str, email: &str, website: &str) -> StoreResult<i64> {
        sqlx::query_scalar("SELECT id FROM commenter WHERE name = ? AND email = ? AND www = ?")
            .bind(name)
            .bind(email)
            .bind(website)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx { tx }))
    }

    async fn titles(&self, limit: Option<u32>, include_hidden: bool) -> StoreResult<Vec<PostLink>> {
        // LIMIT -1 is unbounded in SQLite
        let limit = limit.map_or(-1, i64::from);
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT title, url FROM post WHERE (? OR hidden = 0) ORDER BY date DESC, id DESC LIMIT ?",
        )
        .bind(include_hidden)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(title, url)| PostLink { title, url })
            .collect())
    }

    async fn posts(&self, limit: u32, offset: u32, include_hidden: bool) -> StoreResult<Vec<Post>> {
        let sql = format!(
            "{POST_SELECT} WHERE (? OR hidden = 0) ORDER BY date DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows: Vec<SqlPost> = sqlx::query_as(&sql)
            .bind(include_hidden)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        self.with_tags(rows).await
    }

    async fn num_posts(&self, include_hidden: bool) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM post WHERE (? OR hidden = 0)")
            .bind(include_hidden)
            .fetch_one(&self.pool)
            .await?;
        u32::try_from(count).map_err(|_| StoreError::Other(format!("post count {count} out of range")))
    }

    async fn titles_by_tag(&self, tag: &str, include_hidden: bool) -> StoreResult<Vec<PostLink>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT post.title, post.url FROM post \
             INNER JOIN tagmap ON tagmap.post_id = post.id \
             INNER JOIN tag ON tagmap.tag_id = tag.id \
             WHERE tag.tag = ? AND (? OR post.hidden = 0) \
             ORDER BY post.date DESC, post.id DESC",
        )
        .bind(tag)
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(title, url)| PostLink { title, url })
            .collect())
    }

    async fn all_tags(&self) -> StoreResult<Vec<String>> {
        let tags = sqlx::query_scalar("SELECT tag FROM tag ORDER BY tag")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn post(&self, url: &str) -> StoreResult<Post> {
        let sql = format!("{POST_SELECT} WHERE url = ?");
        let row: Option<SqlPost> = sqlx::query_as(&sql)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;

        let mut post = row.map(Post::from).ok_or(StoreError::NotFound)?;
        post.tags = self.tags_for(post.id).await?;
        Ok(post)
    }

    async fn comments_for_post(&self, post_id: i64) -> StoreResult<Vec<CommentView>> {
        let sql = format!("{COMMENT_VIEW_SELECT} WHERE comment.post_id = ? ORDER BY comment.timestamp, comment.id");
        let rows: Vec<SqlComment> = sqlx::query_as(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    async fn all_comments(&self) -> StoreResult<Vec<CommentView>> {
        let sql = format!("{COMMENT_VIEW_SELECT} ORDER BY comment.timestamp DESC, comment.id DESC");
        let rows: Vec<SqlComment> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    async fn author(&self, username: &str) -> StoreResult<Author> {
        let author: Option<SqlAuthor> = sqlx::query_as(
            "SELECT id, disp_name, passwd, full_name, email, www FROM author WHERE disp_name = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        author.map(Author::from).ok_or(StoreError::NotFound)
    }

    async fn author_by_id(&self, id: i64) -> StoreResult<Author> {
        let author: Option<SqlAuthor> = sqlx::query_as(
            "SELECT id, disp_name, passwd, full_name, email, www FROM author WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        author.map(Author::from).ok_or(StoreError::NotFound)
    }

    async fn update_author(
        &self,
        id: i64,
        profile: &AuthorProfile,
        password_hash: Option<&str>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE author SET full_name = ?, email = ?, www = ?, passwd = COALESCE(?, passwd) WHERE id = ?",
        )
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(&profile.website)
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn ensure_author(&self, author: &Author) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM author")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO author (disp_name, passwd, full_name, email, www) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&author.username)
        .bind(&author.password_hash)
        .bind(&author.full_name)
        .bind(&author.email)
        .bind(&author.website)
        .execute(&self.pool)
        .await?;
        Ok(true)
    }

    async fn insert_or_update_post(&self, author_id: i64, draft: &PostDraft) -> StoreResult<i64> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM post WHERE url = ?")
            .bind(&draft.url)
            .fetch_optional(&mut *tx)
            .await?;

        let post_id = match existing {
            Some(id) => {
                sqlx::query("UPDATE post SET title = ?, body = ?, hidden = ? WHERE id = ?")
                    .bind(&draft.title)
                    .bind(&draft.body)
                    .bind(draft.hidden)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                id
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO post (author_id, title, date, url, body, hidden) VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(author_id)
                .bind(&draft.title)
                .bind(chrono::Utc::now().timestamp())
                .bind(&draft.url)
                .bind(&draft.body)
                .bind(draft.hidden)
                .execute(&mut *tx)
                .await?;
                result.last_insert_rowid()
            }
        };

        replace_tags(&mut tx, post_id, &draft.tags).await?;
        tx.commit().await?;
        Ok(post_id)
    }

    async fn delete_comment(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM comment WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_comment(&self, id: i64, body: &str) -> StoreResult<()> {
        let result = sqlx::query("UPDATE comment SET body = ? WHERE id = ?")
            .bind(body)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_post(&self, url: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM comment WHERE post_id IN (SELECT id FROM post WHERE url = ?)")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM tagmap WHERE post_id IN (SELECT id FROM post WHERE url = ?)")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM post WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            // dropping the transaction rolls it back
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
