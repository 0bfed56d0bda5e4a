//! Signed cookie codec.
//!
//! Cookie value layout: `base64url(json) "." hex(hmac_sha256(secret, base64url(json)))`.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use inkwell_common::InkwellError;
use inkwell_common::constants::session::{COOKIE_NAME, MAX_AGE_SECS};
use sha2::Sha256;

use super::SessionData;

type HmacSha256 = Hmac<Sha256>;

/// Secret used to sign session cookies
#[derive(Clone)]
pub struct SessionKey {
    secret: Vec<u8>,
}

impl SessionKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Fresh random key; sessions signed with it die with the process
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::rng(), &mut bytes);
        Self::new(bytes)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// Serialize and sign session data into a cookie value
    pub fn encode(&self, data: &SessionData) -> Result<String, InkwellError> {
        let json = serde_json::to_vec(data)
            .map_err(|e| InkwellError::Session(format!("failed to serialize session: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{payload}.{signature}"))
    }

    /// Verify and deserialize a cookie value
    pub fn decode(&self, value: &str) -> Result<SessionData, InkwellError> {
        let (payload, signature) = value
            .split_once('.')
            .ok_or_else(|| InkwellError::Session("malformed session cookie".into()))?;
        let signature = hex::decode(signature)
            .map_err(|_| InkwellError::Session("malformed session signature".into()))?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| InkwellError::Session("session signature mismatch".into()))?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| InkwellError::Session("malformed session payload".into()))?;
        serde_json::from_slice(&json)
            .map_err(|e| InkwellError::Session(format!("failed to parse session: {e}")))
    }
}

/// Find the session cookie among `Cookie` header values
pub fn find_session_cookie<'a>(cookie_headers: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    cookie_headers
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value)
}

/// `Set-Cookie` header value for a signed session
pub fn format_set_cookie(value: &str) -> String {
    format!("{COOKIE_NAME}={value}; Path=/; Max-Age={MAX_AGE_SECS}; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_session() -> SessionData {
        SessionData {
            admin_login: true,
            author_id: Some(1),
            captcha_cursor: None,
        }
    }

    #[test]
    fn test_signed_cookie_verifies() {
        let key = SessionKey::new("secret");
        let value = key.encode(&admin_session()).unwrap();
        let decoded = key.decode(&value).unwrap();
        assert!(decoded.admin_login);
        assert_eq!(decoded.author_id, Some(1));
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let key = SessionKey::new("secret");
        let value = key.encode(&SessionData::default()).unwrap();
        let (_, signature) = value.split_once('.').unwrap();

        // forge an admin payload under the old signature
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&admin_session()).unwrap());
        let forged = format!("{forged_payload}.{signature}");
        assert!(matches!(key.decode(&forged), Err(InkwellError::Session(_))));

        assert!(key.decode("garbage").is_err());
        assert!(key.decode("abc.zz").is_err());
    }

    #[test]
    fn test_other_key_rejected() {
        let value = SessionKey::new("one").encode(&admin_session()).unwrap();
        assert!(SessionKey::new("two").decode(&value).is_err());
    }

    #[test]
    fn test_find_session_cookie() {
        let headers = ["theme=dark; inkwell=abc.def", "other=1"];
        assert_eq!(find_session_cookie(headers.into_iter()), Some("abc.def"));
        assert_eq!(find_session_cookie(["inkwellx=1"].into_iter()), None);
    }
}
