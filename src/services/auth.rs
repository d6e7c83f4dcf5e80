//! Session verification for the disguise gate.
//!
//! A session cookie looks like `<issued_at_millis>.<hex hmac>` where the
//! HMAC-SHA256 is keyed with the callback secret and covers the timestamp.
//! Subscription access itself is authorized by the token, not by this.

use std::time::Duration;

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Answers whether a request carries a valid operator session.
pub trait AuthService: Send + Sync {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool;
}

/// Verifies signed session cookies.
#[derive(Debug, Clone)]
pub struct SessionCookieAuth {
    secret: String,
    cookie_name: String,
    max_age: Duration,
}

impl SessionCookieAuth {
    pub fn new(secret: impl Into<String>, cookie_name: impl Into<String>, max_age: Duration) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: cookie_name.into(),
            max_age,
        }
    }

    /// Cookie value for a session issued at `issued_at_millis`.
    pub fn sign(&self, issued_at_millis: i64) -> Option<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(issued_at_millis.to_string().as_bytes());
        Some(format!(
            "{}.{}",
            issued_at_millis,
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    fn verify(&self, value: &str, now_millis: i64) -> bool {
        let Some((timestamp, signature)) = value.split_once('.') else {
            return false;
        };
        let Ok(issued_at) = timestamp.parse::<i64>() else {
            return false;
        };
        let age = now_millis.saturating_sub(issued_at);
        if age < 0 || age as u128 > self.max_age.as_millis() {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(self.secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

impl AuthService for SessionCookieAuth {
    fn is_authenticated(&self, headers: &HeaderMap) -> bool {
        let now = Utc::now().timestamp_millis();
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == self.cookie_name)
            .any(|(_, value)| self.verify(value, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth() -> SessionCookieAuth {
        SessionCookieAuth::new("secret", "auth_session", Duration::from_secs(8 * 3600))
    }

    fn headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_valid_session() {
        let auth = auth();
        let value = auth.sign(Utc::now().timestamp_millis()).unwrap();
        assert!(auth.is_authenticated(&headers(&format!("theme=dark; auth_session={}", value))));
    }

    #[test]
    fn test_expired_or_forged_session() {
        let auth = auth();
        let old = Utc::now().timestamp_millis() - 9 * 3600 * 1000;
        let expired = auth.sign(old).unwrap();
        assert!(!auth.is_authenticated(&headers(&format!("auth_session={}", expired))));

        let other = SessionCookieAuth::new("other", "auth_session", Duration::from_secs(3600));
        let forged = other.sign(Utc::now().timestamp_millis()).unwrap();
        assert!(!auth.is_authenticated(&headers(&format!("auth_session={}", forged))));

        assert!(!auth.is_authenticated(&headers("auth_session=garbage")));
        assert!(!auth.is_authenticated(&HeaderMap::new()));
    }
}
