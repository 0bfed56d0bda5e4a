//! Core types shared across Inkwell components.

use serde::{Deserialize, Serialize};

/// Someone who left a comment.
///
/// Identity for de-duplication is the exact `(name, email, website)`
/// triple; `ip` is recorded but never matched on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commenter {
    pub name: String,
    pub email: String,
    pub website: String,
    pub ip: String,
}

impl Commenter {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        website: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            website: website.into(),
            ip: ip.into(),
        }
    }
}

/// The blog's single author
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub username: String,
    /// Salted password hash (never serialized to clients)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub email: String,
    pub website: String,
}

/// Author fields editable from the admin profile page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    pub full_name: String,
    pub email: String,
    pub website: String,
}

/// A blog post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    /// Public slug, unique per post
    pub url: String,
    pub body: String,
    /// Publication time (Unix epoch seconds)
    pub date: i64,
    pub hidden: bool,
    /// Lowercase tag names, alphabetical
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fields an admin submits when writing a post
#[derive(Debug, Clone, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub url: String,
    pub body: String,
    pub hidden: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Split a comma separated tag field into lowercase tag names.
///
/// Blank entries and repeats are dropped; order of first appearance is kept.
pub fn explode_tags(tags: &str) -> Vec<String> {
    let mut exploded: Vec<String> = Vec::new();
    for tag in tags.split(',') {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !exploded.contains(&tag) {
            exploded.push(tag);
        }
    }
    exploded
}

/// Title and slug of a post, for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostLink {
    pub title: String,
    pub url: String,
}

/// A published comment joined with its commenter and post
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentView {
    pub id: i64,
    pub post_url: String,
    pub post_title: String,
    pub name: String,
    pub email: String,
    pub website: String,
    pub body: String,
    /// Unix epoch seconds
    pub timestamp: i64,
    /// Human-readable `timestamp`
    pub time: String,
}

/// Render a Unix timestamp the way comment listings show it
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// Outcome of a comment submission as reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    /// Comment published
    Accepted,
    /// Wrong CAPTCHA answer (or commenter lookup failed)
    Rejected,
    /// Client must solve the attached CAPTCHA and resubmit
    ShowCaptcha,
}

/// JSON payload returned by the comment endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentReply {
    pub status: SubmitStatus,
    /// Anchor of the new comment (`accepted` only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redir: Option<String>,
    #[serde(rename = "captcha-id", skip_serializing_if = "Option::is_none")]
    pub captcha_id: Option<String>,
    #[serde(rename = "captcha-task", skip_serializing_if = "Option::is_none")]
    pub captcha_task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl CommentReply {
    pub fn accepted(redir: String) -> Self {
        Self {
            status: SubmitStatus::Accepted,
            redir: Some(redir),
            captcha_id: None,
            captcha_task: None,
            name: None,
            email: None,
            website: None,
            body: None,
        }
    }

    /// A challenge reply that echoes the submitted form back so the
    /// client can re-render it
    pub fn challenge(
        status: SubmitStatus,
        captcha_id: &str,
        captcha_task: &str,
        commenter: &Commenter,
        body: &str,
    ) -> Self {
        Self {
            status,
            redir: None,
            captcha_id: Some(captcha_id.to_string()),
            captcha_task: Some(captcha_task.to_string()),
            name: Some(commenter.name.clone()),
            email: Some(commenter.email.clone()),
            website: Some(commenter.website.clone()),
            body: Some(body.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_wire_format() {
        let commenter = Commenter::new("N", "@", "http://w", "");
        let reply =
            CommentReply::challenge(SubmitStatus::ShowCaptcha, "700", "9 + 2 =", &commenter, "hi");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["status"], "showcaptcha");
        assert_eq!(json["captcha-id"], "700");
        assert_eq!(json["captcha-task"], "9 + 2 =");
        assert_eq!(json["body"], "hi");
        assert!(json.get("redir").is_none());

        let json = serde_json::to_value(CommentReply::accepted("/hello#comment-3".into())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "accepted", "redir": "/hello#comment-3"}));
    }

    #[test]
    fn test_explode_tags() {
        assert_eq!(explode_tags("tag"), vec!["tag"]);
        assert_eq!(explode_tags(",tagg"), vec!["tagg"]);
        assert_eq!(explode_tags(" Rust , web,,rust "), vec!["rust", "web"]);
        assert!(explode_tags(" , ").is_empty());
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00");
    }
}
