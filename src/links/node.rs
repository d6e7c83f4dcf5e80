//! Structured view of a protocol link.
//!
//! Only the fields the transforms need are extracted: protocol, server,
//! port and display name. Links that cannot be parsed are still carried
//! through the pipeline untouched.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::Value;

/// Proxy node parsed from a link.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProxyNode {
    /// Normalized protocol (`hy2` is reported as `hysteria2`).
    pub protocol: String,
    /// Server address, lowercased.
    pub server: String,
    pub port: u16,
    /// Decoded display name.
    pub name: String,
}

impl ProxyNode {
    pub fn parse(link: &str) -> Option<Self> {
        let protocol = protocol_of(link)?;
        let (server, port, name) = match protocol.as_str() {
            "vmess" => parse_vmess(link)?,
            "ss" => parse_ss(link)?,
            "ssr" => parse_ssr(link)?,
            _ => parse_url_style(link)?,
        };
        Some(Self {
            protocol,
            server: server.to_ascii_lowercase(),
            port,
            name,
        })
    }
}

/// Lowercased scheme of a link, with aliases folded.
pub fn protocol_of(link: &str) -> Option<String> {
    let (scheme, _) = link.split_once("://")?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+') {
        return None;
    }
    let scheme = scheme.to_ascii_lowercase();
    Some(match scheme.as_str() {
        "hy2" => "hysteria2".to_string(),
        "socks5" => "socks".to_string(),
        _ => scheme,
    })
}

/// Decoded display name of a link (vmess `ps`, otherwise the fragment).
pub fn link_name(link: &str) -> String {
    if is_vmess(link) {
        if let Some(json) = vmess_json(link) {
            return json.get("ps").and_then(Value::as_str).unwrap_or_default().to_string();
        }
    }
    match link.rsplit_once('#') {
        Some((_, fragment)) => percent_decode(fragment),
        None => String::new(),
    }
}

/// Replace the display name of a link.
///
/// vmess links are re-encoded with a new `ps`; ssr names are not rewritten.
pub fn set_link_name(link: &str, name: &str) -> String {
    if is_vmess(link) {
        if let Some(mut json) = vmess_json(link) {
            if let Some(obj) = json.as_object_mut() {
                obj.insert("ps".to_string(), Value::String(name.to_string()));
                return format!("vmess://{}", STANDARD.encode(json.to_string()));
            }
        }
        return link.to_string();
    }
    if protocol_of(link).as_deref() == Some("ssr") {
        return link.to_string();
    }
    let base = link.split_once('#').map_or(link, |(base, _)| base);
    format!("{}#{}", base, urlencoding::encode(name))
}

fn is_vmess(link: &str) -> bool {
    link.len() > 8 && link.get(..8).is_some_and(|scheme| scheme.eq_ignore_ascii_case("vmess://"))
}

fn vmess_json(link: &str) -> Option<Value> {
    let payload = link.get(8..)?;
    let payload = payload.split_once('#').map_or(payload, |(p, _)| p);
    let bytes = decode_base64(payload)?;
    serde_json::from_slice(&bytes).ok()
}

/// Decode standard or URL-safe base64, padded or not, ignoring whitespace.
pub fn decode_base64(input: &str) -> Option<Vec<u8>> {
    let clean: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if clean.is_empty() {
        return None;
    }
    STANDARD
        .decode(&clean)
        .or_else(|_| STANDARD_NO_PAD.decode(clean.trim_end_matches('=')))
        .or_else(|_| URL_SAFE.decode(&clean))
        .or_else(|_| URL_SAFE_NO_PAD.decode(clean.trim_end_matches('=')))
        .ok()
}

/// `decodeURIComponent`-like decoding that never fails.
pub fn percent_decode(input: &str) -> String {
    urlencoding::decode(input)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| input.to_string())
}

fn parse_vmess(link: &str) -> Option<(String, u16, String)> {
    let json = vmess_json(link)?;
    let server = json.get("add").and_then(Value::as_str)?.to_string();
    let port = match json.get("port")? {
        Value::Number(n) => u16::try_from(n.as_u64()?).ok()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let name = json.get("ps").and_then(Value::as_str).unwrap_or_default().to_string();
    Some((server, port, name))
}

fn parse_ss(link: &str) -> Option<(String, u16, String)> {
    let rest = &link[link.find("://")? + 3..];
    let (body, name) = match rest.split_once('#') {
        Some((body, fragment)) => (body, percent_decode(fragment)),
        None => (rest, String::new()),
    };
    // SIP002 `userinfo@host:port` or legacy `base64(method:pass@host:port)`
    let host_part = match body.rsplit_once('@') {
        Some((_, host)) => host.to_string(),
        None => {
            let encoded = body.split(['?', '/']).next()?;
            let decoded = String::from_utf8(decode_base64(encoded)?).ok()?;
            decoded.rsplit_once('@')?.1.to_string()
        }
    };
    let host_part = host_part.split(['?', '/']).next()?;
    let (server, port) = split_host_port(host_part)?;
    Some((server, port, name))
}

fn parse_ssr(link: &str) -> Option<(String, u16, String)> {
    let decoded = String::from_utf8(decode_base64(&link[link.find("://")? + 3..])?).ok()?;
    let (main, query) = decoded.split_once("/?").unwrap_or((decoded.as_str(), ""));
    // server:port:protocol:method:obfs:password, server may be IPv6
    let mut parts = main.rsplitn(6, ':');
    let _password = parts.next()?;
    let _obfs = parts.next()?;
    let _method = parts.next()?;
    let _protocol = parts.next()?;
    let port = parts.next()?.parse().ok()?;
    let server = parts.next()?.to_string();
    let name = query
        .split('&')
        .find_map(|kv| kv.strip_prefix("remarks="))
        .and_then(decode_base64)
        .and_then(|b| String::from_utf8(b).ok())
        .unwrap_or_default();
    Some((server, port, name))
}

fn parse_url_style(link: &str) -> Option<(String, u16, String)> {
    let url = url::Url::parse(link).ok()?;
    let server = url.host_str()?.trim_matches(['[', ']']).to_string();
    let port = url.port()?;
    let name = url.fragment().map(percent_decode).unwrap_or_default();
    Some((server, port, name))
}

fn split_host_port(input: &str) -> Option<(String, u16)> {
    let (host, port) = input.rsplit_once(':')?;
    let host = host.trim_matches(['[', ']']);
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port.parse().ok()?))
}
