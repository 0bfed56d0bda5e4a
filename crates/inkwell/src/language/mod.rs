//! Language gate for first-time commenters.
//!
//! Comments written in the blog's native language skip the CAPTCHA. The
//! classifier is an external service, so every call is bounded by a
//! timeout and every failure degrades to "unknown", which the comment flow
//! treats as a reason to show a CAPTCHA.

mod detector;

pub use detector::{FixedLanguageDetector, HttpLanguageDetector};

use async_trait::async_trait;
use inkwell_common::constants::TIMED_OUT_TAG;
use std::sync::Arc;
use std::time::Duration;

/// Language classification capability.
///
/// Implementations fail open: on any transport or decoding error they
/// return an empty tag rather than an error.
#[async_trait]
pub trait LanguageDetector: Send + Sync {
    async fn detect(&self, text: &str) -> String;
}

/// Applies the native-language policy on top of a detector
#[derive(Clone)]
pub struct LanguageGate {
    detector: Arc<dyn LanguageDetector>,
    native_tag: String,
    timeout: Duration,
}

impl LanguageGate {
    pub fn new(detector: Arc<dyn LanguageDetector>, native_tag: impl Into<String>, timeout: Duration) -> Self {
        Self {
            detector,
            native_tag: native_tag.into(),
            timeout,
        }
    }

    pub fn native_tag(&self) -> &str {
        &self.native_tag
    }

    /// Classify `text`, giving up after the configured timeout.
    ///
    /// The detector runs on its own task. When the deadline passes the task
    /// is left to finish on its own and its result is dropped.
    pub async fn detect_with_timeout(&self, text: &str) -> String {
        let detector = Arc::clone(&self.detector);
        let text = text.to_owned();
        let task = tokio::spawn(async move { detector.detect(&text).await });

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(tag)) => tag,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Language detector task failed");
                String::new()
            }
            Err(_) => {
                tracing::debug!(timeout_ms = self.timeout.as_millis() as u64, "Language detection timed out");
                TIMED_OUT_TAG.to_string()
            }
        }
    }

    /// True only when the detected tag equals the native tag exactly
    pub async fn is_native(&self, text: &str) -> bool {
        let tag = self.detect_with_timeout(text).await;
        tracing::info!(detected = %tag, native = %self.native_tag, "Detected comment language");
        tag == self.native_tag
    }
}
