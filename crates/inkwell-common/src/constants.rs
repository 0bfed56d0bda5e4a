//! Shared constants for Inkwell components.

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Default SQLite database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite://inkwell.db";

/// How long a comment waits for the language detector (milliseconds)
pub const LANGUAGE_DETECT_TIMEOUT_MS: u64 = 1500;

/// Language tag reported when the detector did not answer in time
pub const TIMED_OUT_TAG: &str = "timedout";

/// Default native language of the blog
pub const DEFAULT_NATIVE_LANGUAGE: &str = "en";

/// Capacity of the outgoing notification queue
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 64;

/// Largest handler response the session middleware will buffer (bytes)
pub const MAX_BUFFERED_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Number of post links shown on the index
pub const NUM_RECENT_POSTS: u32 = 10;

/// Posts rendered in full on each index page
pub const POSTS_PER_PAGE: u32 = 5;

/// Posts included in the RSS feed
pub const NUM_FEED_ITEMS: u32 = 3;

/// Session cookie layout
pub mod session {
    /// Cookie carrying the signed session payload
    pub const COOKIE_NAME: &str = "inkwell";

    /// Session lifetime in seconds (30 days)
    pub const MAX_AGE_SECS: u64 = 30 * 24 * 3600;
}

/// HTTP header names
pub mod headers {
    /// Client address chain set by reverse proxies
    pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

    /// Original host set by reverse proxies
    pub const X_FORWARDED_HOST: &str = "X-Forwarded-Host";
}
