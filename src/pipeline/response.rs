//! Response builders for every delivery branch.

use axum::http::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use crate::cache::CacheStatus;
use crate::links::encode_node_list;
use crate::store::model::DisguiseSettings;
use crate::subconverter::Conversion;

pub const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");
pub const X_SUBHUB_FALLBACK: HeaderName = HeaderName::from_static("x-subhub-fallback");
pub const X_SUBHUB_ERROR: HeaderName = HeaderName::from_static("x-subhub-error");

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const NO_STORE: &str = "no-store, no-cache";
const ERROR_HEADER_LIMIT: usize = 200;

const FALLBACK_YAML: &str = r#"proxies:
  - name: "Subscription conversion failed (fallback)"
    type: trojan
    server: 127.0.0.1
    port: 443
    password: error
    sni: error.com
    skip-cert-verify: true
    udp: false

proxy-groups:
  - name: "Error"
    type: select
    proxies:
      - "Subscription conversion failed (fallback)"

rules:
  - MATCH,DIRECT
"#;

const DISGUISE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Welcome</title></head>
<body><h1>It works!</h1><p>This server is up and running.</p></body>
</html>
"#;

fn plain(body: String, cache: CacheStatus) -> Response {
    (
        [
            (CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN)),
            (CACHE_CONTROL, HeaderValue::from_static(NO_STORE)),
            (X_CACHE_STATUS, HeaderValue::from_static(cache.as_str())),
        ],
        body,
    )
        .into_response()
}

/// Raw node list, base64 encoded.
pub fn base64_list(nodes: &[String], cache: CacheStatus) -> Response {
    plain(encode_node_list(nodes), cache)
}

/// Backend output, passed through with our own content headers.
pub fn converted(conversion: Conversion, display_name: &str, cache: CacheStatus) -> Response {
    let mut response = plain(conversion.body, cache);
    let headers = response.headers_mut();
    for (name, value) in conversion.headers.iter() {
        headers.insert(name.clone(), value.clone());
    }
    let disposition = format!(
        "attachment; filename*=utf-8''{}",
        urlencoding::encode(display_name)
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    response
}

/// Degraded answer after every conversion backend failed.
///
/// Clash-family targets get a minimal valid config with one error proxy;
/// everything else gets the base64 list.
pub fn fallback(target: &str, nodes: &[String], error: &str, cache: CacheStatus) -> Response {
    let (mut response, mode) = if super::format::wants_yaml_stub(target) {
        let mut response = FALLBACK_YAML.into_response();
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/yaml; charset=utf-8"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        headers.insert(X_CACHE_STATUS, HeaderValue::from_static(cache.as_str()));
        (response, "yaml")
    } else {
        (base64_list(nodes, cache), "base64")
    };

    let headers = response.headers_mut();
    headers.insert(X_SUBHUB_FALLBACK, HeaderValue::from_static(mode));
    if let Ok(value) = HeaderValue::from_str(&header_safe(error)) {
        headers.insert(X_SUBHUB_ERROR, value);
    }
    response
}

/// First 200 chars, reduced to visible ASCII so the value is a valid header.
fn header_safe(error: &str) -> String {
    error
        .chars()
        .take(ERROR_HEADER_LIMIT)
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .collect()
}

/// What a browser sees when the disguise is on.
pub fn disguise(settings: &DisguiseSettings) -> Response {
    let redirect = settings.redirect_url.trim();
    if settings.page_type == "redirect" && !redirect.is_empty() {
        if let Ok(location) = HeaderValue::from_str(redirect) {
            return (StatusCode::FOUND, [(LOCATION, location)]).into_response();
        }
    }
    Html(DISGUISE_PAGE).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn header<'a>(response: &'a Response, name: &HeaderName) -> &'a str {
        response.headers().get(name).unwrap().to_str().unwrap()
    }

    #[test]
    fn test_base64_headers() {
        let response = base64_list(&["a://x".into()], CacheStatus::Miss);
        assert_eq!(header(&response, &CONTENT_TYPE), TEXT_PLAIN);
        assert_eq!(header(&response, &CACHE_CONTROL), NO_STORE);
        assert_eq!(header(&response, &X_CACHE_STATUS), "MISS");
    }

    #[test]
    fn test_converted_headers() {
        let mut forwarded = HeaderMap::new();
        forwarded.insert("subscription-userinfo", HeaderValue::from_static("upload=1; download=2"));
        let conversion = Conversion {
            body: "proxies: []".into(),
            headers: forwarded,
            endpoint: "http://b/sub".into(),
        };
        let response = converted(conversion, "我的订阅", CacheStatus::Hit);
        assert_eq!(
            header(&response, &CONTENT_DISPOSITION),
            "attachment; filename*=utf-8''%E6%88%91%E7%9A%84%E8%AE%A2%E9%98%85"
        );
        assert_eq!(header(&response, &CONTENT_TYPE), TEXT_PLAIN);
        assert_eq!(header(&response, &X_CACHE_STATUS), "HIT");
        assert_eq!(
            header(&response, &HeaderName::from_static("subscription-userinfo")),
            "upload=1; download=2"
        );
    }

    #[test]
    fn test_fallback_modes() {
        let nodes = vec!["trojan://p@h:443#A".to_string()];
        let long_error = "x".repeat(500);

        let yaml = fallback("clash", &nodes, &long_error, CacheStatus::Stale);
        assert_eq!(header(&yaml, &X_SUBHUB_FALLBACK), "yaml");
        assert_eq!(header(&yaml, &CONTENT_TYPE), "text/yaml; charset=utf-8");
        assert_eq!(header(&yaml, &X_SUBHUB_ERROR).len(), 200);

        let b64 = fallback("singbox", &nodes, "boom\nline", CacheStatus::Miss);
        assert_eq!(header(&b64, &X_SUBHUB_FALLBACK), "base64");
        assert_eq!(header(&b64, &X_SUBHUB_ERROR), "boom?line");
    }

    #[test]
    fn test_disguise() {
        let redirect = disguise(&DisguiseSettings {
            enabled: true,
            page_type: "redirect".into(),
            redirect_url: "https://example.com".into(),
        });
        assert_eq!(redirect.status(), StatusCode::FOUND);
        assert_eq!(header(&redirect, &LOCATION), "https://example.com");

        let page = disguise(&DisguiseSettings {
            enabled: true,
            ..Default::default()
        });
        assert_eq!(page.status(), StatusCode::OK);
    }
}
