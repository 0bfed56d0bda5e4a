//! Application state and shared resources.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::captcha::CaptchaDeck;
use crate::comments::CommentService;
use crate::config::{AppConfig, DetectorKind, LanguageConfig};
use crate::language::{FixedLanguageDetector, HttpLanguageDetector, LanguageDetector, LanguageGate};
use crate::metrics::ServerMetrics;
use crate::notify::Notifier;
use crate::session::SessionKey;
use crate::storage::Storage;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Posts, comments and commenters
    pub storage: Arc<dyn Storage>,

    /// CAPTCHA challenges, fixed for the life of the process
    pub deck: Arc<CaptchaDeck>,

    /// Comment submission pipeline
    pub comments: CommentService,

    /// Session cookie signing key
    pub session_key: SessionKey,

    /// Request and anti-spam counters
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    /// Build state from configuration, choosing the language detector it names
    pub fn new(config: AppConfig, storage: Arc<dyn Storage>, notifier: Option<Notifier>) -> Result<Self> {
        let detector = build_detector(&config.language)?;

        let session_key = match &config.cookie_secret {
            Some(secret) => SessionKey::new(secret),
            None => {
                tracing::warn!("No cookie_secret configured, sessions will not survive a restart");
                SessionKey::generate()
            }
        };

        Self::with_detector(config, storage, detector, session_key, notifier)
    }

    /// Build state around an explicit detector and key
    pub fn with_detector(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        detector: Arc<dyn LanguageDetector>,
        session_key: SessionKey,
        notifier: Option<Notifier>,
    ) -> Result<Self> {
        let deck = Arc::new(CaptchaDeck::default());
        let gate = LanguageGate::new(
            detector,
            config.language.native_tag.clone(),
            Duration::from_millis(config.language.timeout_ms),
        );
        tracing::debug!(native = %gate.native_tag(), tasks = deck.tasks().len(), "Comment gate ready");
        let comments = CommentService::new(storage.clone(), deck.clone(), gate, notifier);

        let metrics = ServerMetrics::new().context("Failed to register metrics")?;

        Ok(Self {
            config: Arc::new(config),
            storage,
            deck,
            comments,
            session_key,
            metrics: Arc::new(metrics),
        })
    }
}

fn build_detector(config: &LanguageConfig) -> Result<Arc<dyn LanguageDetector>> {
    match config.detector {
        DetectorKind::Fixed => {
            tracing::info!(tag = %config.fixed_tag, "Using fixed language detector");
            Ok(Arc::new(FixedLanguageDetector::new(config.fixed_tag.clone())))
        }
        DetectorKind::Http => {
            let endpoint = config
                .endpoint
                .clone()
                .context("language.endpoint is not set")?;
            tracing::info!(endpoint = %endpoint, "Using HTTP language detector");
            // The gate enforces the real deadline; this only stops sockets piling up.
            let request_timeout = Duration::from_millis(config.timeout_ms.saturating_mul(4));
            let detector = HttpLanguageDetector::new(endpoint, request_timeout)
                .context("Failed to build language detector client")?;
            Ok(Arc::new(detector))
        }
    }
}
