//! Anti-spam decision flow for one comment submission.

use inkwell_common::{Commenter, InkwellError};
use std::sync::Arc;

use super::publish::{publish_comment, publish_comment_with_commenter};
use crate::captcha::{CaptchaDeck, CaptchaTask, DeckCursor, check_answer};
use crate::language::LanguageGate;
use crate::notify::{Notifier, comment_notification};
use crate::storage::{Storage, StoreError};

/// A comment as submitted by a visitor
#[derive(Debug, Clone)]
pub struct CommentSubmission {
    /// Website already normalized with a protocol
    pub commenter: Commenter,
    pub body: String,
    /// Challenge id echoed back by the client, if it was shown one
    pub captcha_id: Option<String>,
    pub captcha_answer: String,
    /// Slug of the post being commented on
    pub post_url: String,
    /// Host the visitor used, for notification links
    pub host: String,
}

/// What to tell the visitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Published; `redir` points at the new comment
    Accepted { redir: String },
    /// Solve this challenge and resubmit
    ShowCaptcha(CaptchaTask),
    /// Wrong answer (or the commenter could not be checked)
    Rejected(CaptchaTask),
}

/// Runs comment submissions against storage, the CAPTCHA deck and the
/// language gate
#[derive(Clone)]
pub struct CommentService {
    storage: Arc<dyn Storage>,
    deck: Arc<CaptchaDeck>,
    gate: LanguageGate,
    notifier: Option<Notifier>,
}

impl CommentService {
    pub fn new(
        storage: Arc<dyn Storage>,
        deck: Arc<CaptchaDeck>,
        gate: LanguageGate,
        notifier: Option<Notifier>,
    ) -> Self {
        Self {
            storage,
            deck,
            gate,
            notifier,
        }
    }

    /// Decide on and, if allowed, publish one comment.
    ///
    /// `cursor` selects the challenge shown when a new one is needed.
    /// Errors are reserved for an unknown post and storage failures while
    /// publishing.
    pub async fn submit(
        &self,
        submission: &CommentSubmission,
        cursor: DeckCursor,
    ) -> Result<SubmissionOutcome, InkwellError> {
        let post_id = match self.storage.post_id_by_url(&submission.post_url).await {
            Ok(id) => id,
            Err(StoreError::NotFound) => {
                return Err(InkwellError::NotFound(format!("post {:?}", submission.post_url)));
            }
            Err(e) => {
                tracing::error!(error = %e, post = %submission.post_url, "Post lookup failed");
                return Err(e.into());
            }
        };

        let commenter = &submission.commenter;
        let lookup = self
            .storage
            .lookup_commenter(&commenter.name, &commenter.email, &commenter.website)
            .await;

        let comment_id = match lookup {
            Ok(commenter_id) => {
                tracing::debug!(commenter_id, "Returning commenter");
                publish_comment(self.storage.as_ref(), post_id, commenter_id, &submission.body).await?
            }
            Err(StoreError::NotFound) => match submission.captcha_id.as_deref() {
                None => {
                    if !self.gate.is_native(&submission.body).await {
                        let task = self.deck.next_task(cursor).clone();
                        tracing::debug!(captcha_id = %task.id, "Challenging new commenter");
                        return Ok(SubmissionOutcome::ShowCaptcha(task));
                    }
                    self.publish_new(post_id, submission).await?
                }
                Some(captcha_id) => {
                    let task = self.deck.task_by_id(captcha_id);
                    if !check_answer(task, &submission.captcha_answer) {
                        tracing::debug!(captcha_id = %task.id, "Wrong CAPTCHA answer");
                        return Ok(SubmissionOutcome::Rejected(task.clone()));
                    }
                    self.publish_new(post_id, submission).await?
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "Commenter lookup failed, rejecting");
                return Ok(SubmissionOutcome::Rejected(self.deck.next_task(cursor).clone()));
            }
        };

        let redir = format!("/{}#comment-{}", submission.post_url, comment_id);
        tracing::info!(post = %submission.post_url, comment_id, commenter = %commenter.name, "Comment published");

        if let Some(notifier) = &self.notifier {
            let url = format!("{}{}", submission.host, redir);
            notifier.enqueue(comment_notification(
                commenter,
                &submission.body,
                &url,
                &submission.post_url,
            ));
        }

        Ok(SubmissionOutcome::Accepted { redir })
    }

    async fn publish_new(&self, post_id: i64, submission: &CommentSubmission) -> Result<i64, StoreError> {
        publish_comment_with_commenter(
            self.storage.as_ref(),
            post_id,
            &submission.commenter,
            &submission.body,
        )
        .await
    }
}
