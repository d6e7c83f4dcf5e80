//! Callback URLs handed to conversion backends.
//!
//! The backend fetches the raw node list back from us through a URL that
//! carries a token derived from the service secret; a request presenting
//! that token is served base64 directly instead of being converted again.

use axum::http::header::HOST;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

type HmacSha256 = Hmac<Sha256>;

const CALLBACK_MESSAGE: &[u8] = b"callback-static-data";

/// First 16 hex chars of HMAC-SHA256(secret, "callback-static-data").
pub fn callback_token(secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(CALLBACK_MESSAGE);
    let mut token = hex::encode(mac.finalize().into_bytes());
    token.truncate(16);
    token
}

/// Origin the backend should call back.
///
/// The configured public URL wins; otherwise `X-Forwarded-Proto` + `Host`.
pub fn public_base(configured: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(origin) = configured.and_then(origin_of) {
        return origin;
    }

    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    let proto = header("x-forwarded-proto").unwrap_or("http");
    let host = header(HOST.as_str()).unwrap_or("localhost");
    format!("{}://{}", proto, host)
}

fn origin_of(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = if raw.contains("://") {
        Url::parse(raw).ok()?
    } else {
        Url::parse(&format!("https://{}", raw)).ok()?
    };
    Some(url.origin().ascii_serialization())
}

/// `<base>/sub/<token>[/<profile>]?target=base64&callback_token=<t>`
pub fn callback_url(base: &str, token: &str, profile: Option<&str>, callback_token: &str) -> String {
    let mut path = format!("/sub/{}", urlencoding::encode(token));
    if let Some(profile) = profile {
        path.push('/');
        path.push_str(&urlencoding::encode(profile));
    }
    format!(
        "{}{}?target=base64&callback_token={}",
        base.trim_end_matches('/'),
        path,
        callback_token
    )
}
