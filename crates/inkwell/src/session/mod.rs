//! Per-request session context.
//!
//! Session state lives entirely in a signed cookie. The middleware loads a
//! [`SessionContext`] before the handler runs and writes it back, when it
//! changed, before any of the response body is released.

mod cookie;

pub use cookie::{SessionKey, find_session_cookie, format_set_cookie};

use axum::http::header::{COOKIE, HeaderMap};
use inkwell_common::InkwellError;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::captcha::DeckCursor;

/// Values persisted in the session cookie
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    /// Set after a successful admin login
    #[serde(default)]
    pub admin_login: bool,

    /// Author who logged in; new posts are attributed to them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,

    /// Which CAPTCHA this visitor gets next
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha_cursor: Option<DeckCursor>,
}

struct SessionInner {
    data: SessionData,
    dirty: bool,
}

/// Handle to the current request's session. Cheap to clone; clones share
/// state.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<Mutex<SessionInner>>,
}

impl SessionContext {
    fn from_data(data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner { data, dirty: false })),
        }
    }

    /// Load the session from request headers.
    ///
    /// No cookie yields a fresh session. A cookie that fails verification
    /// is an error.
    pub fn load(headers: &HeaderMap, key: &SessionKey) -> Result<Self, InkwellError> {
        let cookies = headers.get_all(COOKIE).iter().filter_map(|v| v.to_str().ok());
        let data = match find_session_cookie(cookies) {
            Some(value) => key.decode(value)?,
            None => SessionData::default(),
        };
        Ok(Self::from_data(data))
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_admin(&self) -> bool {
        self.lock().data.admin_login
    }

    pub fn author_id(&self) -> Option<i64> {
        self.lock().data.author_id
    }

    /// Mark the session as logged in as `author_id`
    pub fn log_in(&self, author_id: i64) {
        let mut inner = self.lock();
        inner.data.admin_login = true;
        inner.data.author_id = Some(author_id);
        inner.dirty = true;
    }

    pub fn log_out(&self) {
        let mut inner = self.lock();
        inner.data.admin_login = false;
        inner.data.author_id = None;
        inner.dirty = true;
    }

    pub fn captcha_cursor(&self) -> DeckCursor {
        self.lock().data.captcha_cursor.unwrap_or_default()
    }

    pub fn set_captcha_cursor(&self, cursor: DeckCursor) {
        let mut inner = self.lock();
        inner.data.captcha_cursor = Some(cursor);
        inner.dirty = true;
    }

    /// `Set-Cookie` value when the session changed during this request
    pub fn save(&self, key: &SessionKey) -> Result<Option<String>, InkwellError> {
        let inner = self.lock();
        if !inner.dirty {
            return Ok(None);
        }
        let value = key.encode(&inner.data)?;
        Ok(Some(format_set_cookie(&value)))
    }
}
