//! Transactional comment writes.

use inkwell_common::Commenter;

use crate::storage::{Storage, StoreResult, StoreTx};

/// Commit on success, roll back on failure. The original error wins over
/// a rollback error.
async fn finish(tx: Box<dyn StoreTx>, result: StoreResult<i64>) -> StoreResult<i64> {
    match result {
        Ok(id) => {
            tx.commit().await?;
            Ok(id)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

/// Insert a comment by a known commenter. Returns the comment id.
pub async fn publish_comment(
    storage: &dyn Storage,
    post_id: i64,
    commenter_id: i64,
    body: &str,
) -> StoreResult<i64> {
    let mut tx = storage.begin().await?;
    let result = tx.insert_comment(commenter_id, post_id, body).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, post_id, commenter_id, "Comment insert failed");
    }
    finish(tx, result).await
}

/// Insert a new commenter and their comment atomically. Returns the
/// comment id.
pub async fn publish_comment_with_commenter(
    storage: &dyn Storage,
    post_id: i64,
    commenter: &Commenter,
    body: &str,
) -> StoreResult<i64> {
    let mut tx = storage.begin().await?;
    let result = async {
        let commenter_id = tx.insert_commenter(commenter).await?;
        tx.insert_comment(commenter_id, post_id, body).await
    }
    .await;
    if let Err(e) = &result {
        tracing::error!(error = %e, post_id, commenter = %commenter.name, "Comment with new commenter failed");
    }
    finish(tx, result).await
}
