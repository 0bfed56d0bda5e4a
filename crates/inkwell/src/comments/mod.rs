//! Comment submission pipeline.
//!
//! ```text
//! identify post ─► look up commenter ─┬─ returning ─────────────────► publish
//!                                     ├─ new, no captcha id ─► language gate ─┬─ native ─► publish + commenter
//!                                     │                                       └─ other ──► show captcha
//!                                     ├─ new, captcha id ───► check answer ───┬─ right ──► publish + commenter
//!                                     │                                       └─ wrong ──► rejected
//!                                     └─ lookup error ──────────────────────────────────► rejected
//! ```

mod flow;
mod publish;

pub use flow::{CommentService, CommentSubmission, SubmissionOutcome};
