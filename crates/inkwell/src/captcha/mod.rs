//! CAPTCHA challenges for first-time commenters.
//!
//! A small fixed deck of arithmetic questions. No server-side challenge
//! storage: the client echoes the challenge id back with its answer.

mod deck;

pub use deck::{CaptchaDeck, CaptchaTask, DeckCursor, check_answer};
