//! Configuration management for Inkwell.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use inkwell_common::constants::{
    DEFAULT_DATABASE_URL, DEFAULT_LISTEN_ADDR, DEFAULT_NATIVE_LANGUAGE, LANGUAGE_DETECT_TIMEOUT_MS,
    NOTIFICATION_QUEUE_CAPACITY,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Session cookie signing secret (random per process if unset)
    #[serde(default)]
    pub cookie_secret: Option<String>,

    /// bcrypt work factor for passwords changed through the profile page
    #[serde(default = "default_password_cost")]
    pub password_cost: u32,

    #[serde(default)]
    pub blog: BlogConfig,

    #[serde(default)]
    pub language: LanguageConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Author seeded into an empty database
    #[serde(default)]
    pub author: Option<AuthorConfig>,
}

/// Blog metadata shown in views
#[derive(Debug, Clone, Deserialize)]
pub struct BlogConfig {
    #[serde(default = "default_blog_title")]
    pub title: String,

    #[serde(default)]
    pub description: String,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            title: default_blog_title(),
            description: String::new(),
        }
    }
}

/// Which language detector to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Http,
    Fixed,
}

/// Language gate configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LanguageConfig {
    /// Language that skips the CAPTCHA for first-time commenters
    #[serde(default = "default_native_tag")]
    pub native_tag: String,

    #[serde(default = "default_detector")]
    pub detector: DetectorKind,

    /// Classifier endpoint for the http detector
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Upper bound on waiting for a verdict
    #[serde(default = "default_detect_timeout")]
    pub timeout_ms: u64,

    /// Tag reported by the fixed detector. Empty matches no language, so
    /// every first-time commenter gets a CAPTCHA.
    #[serde(default)]
    pub fixed_tag: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            native_tag: default_native_tag(),
            detector: default_detector(),
            endpoint: None,
            timeout_ms: default_detect_timeout(),
            fixed_tag: String::new(),
        }
    }
}

/// Comment notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub send_email: bool,

    #[serde(default)]
    pub admin_email: String,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            send_email: false,
            admin_email: String::new(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// The blog author, as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorConfig {
    pub username: String,

    /// Output of `inkwell --hash-password`
    pub password_hash: String,

    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub website: String,
}

// Default value functions
fn default_database_url() -> String { DEFAULT_DATABASE_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_max_connections() -> u32 { 5 }
fn default_blog_title() -> String { "Inkwell".to_string() }
fn default_native_tag() -> String { DEFAULT_NATIVE_LANGUAGE.to_string() }
fn default_detector() -> DetectorKind { DetectorKind::Fixed }
fn default_detect_timeout() -> u64 { LANGUAGE_DETECT_TIMEOUT_MS }
fn default_queue_capacity() -> usize { NOTIFICATION_QUEUE_CAPACITY }
fn default_password_cost() -> u32 { crate::auth::DEFAULT_COST }

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut config = Self::from_file(config_path)?;

        // Apply CLI overrides
        if let Some(ref database_url) = args.database_url {
            config.database_url = database_url.clone();
        }
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(config_path: &str) -> Result<Self> {
        if !Path::new(config_path).exists() {
            // Use defaults if config file doesn't exist
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .build()
            .context("Failed to load config file")?;

        settings
            .try_deserialize()
            .context("Failed to parse config")
    }

    fn validate(&self) -> Result<()> {
        if self.language.detector == DetectorKind::Http && self.language.endpoint.is_none() {
            anyhow::bail!("language.endpoint is required when language.detector = \"http\"");
        }
        if !(4..=31).contains(&self.password_cost) {
            anyhow::bail!("password_cost must be between 4 and 31, got {}", self.password_cost);
        }
        if self.notifications.send_email && self.notifications.admin_email.is_empty() {
            anyhow::bail!("notifications.admin_email is required when send_email is on");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            max_connections: default_max_connections(),
            listen_addr: default_listen_addr(),
            cookie_secret: None,
            password_cost: default_password_cost(),
            blog: BlogConfig::default(),
            language: LanguageConfig::default(),
            notifications: NotificationConfig::default(),
            author: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("inkwell-test-{}.toml", rand::random::<u64>()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.language.timeout_ms, 1500);
        assert_eq!(config.language.native_tag, "en");
        assert_eq!(config.language.detector, DetectorKind::Fixed);
        assert_eq!(config.language.fixed_tag, "");
        assert_ne!(config.language.fixed_tag, config.language.native_tag);
        assert_eq!(config.password_cost, 12);
        assert_eq!(config.notifications.queue_capacity, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::from_file("/nonexistent/inkwell.toml").unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.author.is_none());
    }

    #[test]
    fn test_file_sections() {
        let path = write_config(
            r#"
listen_addr = "0.0.0.0:9000"
cookie_secret = "s3cret"

[blog]
title = "Notes"

[language]
native_tag = "lt"
detector = "http"
endpoint = "http://localhost:5000/detect"

[author]
username = "ada"
password_hash = "abc$def"
"#,
        );
        let config = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.cookie_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.blog.title, "Notes");
        assert_eq!(config.language.detector, DetectorKind::Http);
        assert_eq!(config.language.timeout_ms, 1500);
        assert_eq!(config.language.fixed_tag, "");
        assert_eq!(config.author.unwrap().username, "ada");
    }

    #[test]
    fn test_sample_config_gates_foreign_text() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/inkwell.toml");
        let config = AppConfig::from_file(path).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.language.detector, DetectorKind::Fixed);
        assert_ne!(config.language.fixed_tag, config.language.native_tag);
    }

    #[test]
    fn test_password_cost_range() {
        let mut config = AppConfig::default();
        config.password_cost = 3;
        assert!(config.validate().is_err());
        config.password_cost = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_detector_needs_endpoint() {
        let mut config = AppConfig::default();
        config.language.detector = DetectorKind::Http;
        assert!(config.validate().is_err());
        config.language.endpoint = Some("http://localhost:5000".into());
        assert!(config.validate().is_ok());
    }
}
