//! # Inkwell Common
//!
//! Shared types, errors, and constants used across Inkwell components.
//!
//! ## Modules
//! - `types` - Core data structures (Commenter, Post, CommentReply, etc.)
//! - `error` - Common error types
//! - `constants` - Shared configuration constants

pub mod constants;
pub mod error;
pub mod types;

pub use error::InkwellError;
pub use types::*;
