//! Comment notifications.
//!
//! Notifications are queued on a bounded channel and delivered by a
//! background worker, so a slow or failing mailer never holds up a
//! request. Delivery failures are only logged.

use anyhow::Result;
use async_trait::async_trait;
use inkwell_common::Commenter;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Outgoing mail capability
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Writes notifications to the log instead of delivering them
pub struct LogMailer {
    recipient: String,
}

impl LogMailer {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        tracing::info!(to = %self.recipient, subject = %subject, body = %body, "📧 Notification");
        Ok(())
    }
}

/// A queued message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

/// Build the notification for a freshly published comment
pub fn comment_notification(
    commenter: &Commenter,
    raw_body: &str,
    url: &str,
    post_title: &str,
) -> Notification {
    let subject = format!("New comment in '{post_title}'");
    let body = format!(
        "New comment from {} <{}> ({}):\n\n{}\n\nURL: {}\n",
        commenter.name, commenter.email, commenter.website, raw_body, url
    );
    Notification { subject, body }
}

/// Producer side of the notification queue
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Notification>,
}

impl Notifier {
    /// Create the queue; the receiver goes to [`notifier_worker`]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue without waiting. Returns false when the message was dropped.
    pub fn enqueue(&self, notification: Notification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(subject = %n.subject, "Notification queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                tracing::warn!(subject = %n.subject, "Notification worker gone, dropping message");
                false
            }
        }
    }
}

/// Background worker that drains the notification queue
pub async fn notifier_worker(
    mailer: Arc<dyn Mailer>,
    mut rx: mpsc::Receiver<Notification>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    tracing::info!("📬 Notification worker started");

    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(notification) = next else { break };
                if let Err(e) = mailer.send(&notification.subject, &notification.body).await {
                    tracing::error!(error = %e, subject = %notification.subject, "Failed to send notification");
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("📬 Notification worker shutting down...");
                break;
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every message it is asked to send
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<Notification>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, subject: &str, body: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("smtp unavailable");
            }
            self.sent.lock().unwrap().push(Notification {
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingMailer;
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_comment_notification_text() {
        let commenter = Commenter::new("Ann", "ann@example.com", "http://ann.dev", "");
        let n = comment_notification(&commenter, "Nice post", "blog.example.com/hello#comment-4", "hello");
        assert_eq!(n.subject, "New comment in 'hello'");
        assert!(n.body.contains("New comment from Ann <ann@example.com> (http://ann.dev):"));
        assert!(n.body.contains("Nice post"));
        assert!(n.body.ends_with("URL: blog.example.com/hello#comment-4\n"));
    }

    #[test]
    fn test_full_queue_drops() {
        let (notifier, _rx) = Notifier::new(1);
        let n = Notification { subject: "a".into(), body: "b".into() };
        assert!(notifier.enqueue(n.clone()));
        assert!(!notifier.enqueue(n));
    }

    #[tokio::test]
    async fn test_worker_delivers_and_survives_failures() {
        let mailer = Arc::new(RecordingMailer::default());
        let (notifier, rx) = Notifier::new(8);
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let worker = tokio::spawn(notifier_worker(mailer.clone(), rx, shutdown_rx));

        notifier.enqueue(Notification { subject: "s".into(), body: "b".into() });
        for _ in 0..50 {
            if !mailer.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);

        shutdown_tx.send(()).unwrap();
        worker.await.unwrap();
        assert!(!notifier.enqueue(Notification { subject: "late".into(), body: String::new() }));

        let failing = Arc::new(RecordingMailer { fail: true, ..Default::default() });
        let (notifier, rx) = Notifier::new(8);
        let (_shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let worker = tokio::spawn(notifier_worker(failing, rx, shutdown_rx));
        notifier.enqueue(Notification { subject: "s".into(), body: "b".into() });
        drop(notifier);
        // channel closed: worker drains and exits without panicking
        worker.await.unwrap();
    }
}
