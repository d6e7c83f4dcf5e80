//! Link normalizer.
//!
//! Pure functions over protocol link strings: decoding subscription
//! bodies, repairing name encoding, prefixing, manual renames and
//! include/exclude filtering.

pub mod filter;
pub mod node;
pub mod normalize;

pub use filter::{apply_filters, RuleSet};
pub use node::{link_name, protocol_of, set_link_name, ProxyNode};
pub use normalize::{apply_custom_name, fix_encoding, prepend_name};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Extract link lines from a subscription body.
///
/// Bodies that are a single base64 blob are decoded first. Only lines that
/// look like `scheme://...` survive; nested http(s) URLs are dropped.
pub fn extract_links(body: &str) -> Vec<String> {
    let decoded = decode_body(body);
    decoded
        .lines()
        .map(str::trim)
        .filter(|line| is_link(line))
        .map(str::to_string)
        .collect()
}

fn decode_body(body: &str) -> String {
    let trimmed = body.trim();
    let looks_encoded = !trimmed.contains("://")
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_') || c.is_whitespace());
    if looks_encoded {
        if let Some(text) = node::decode_base64(trimmed).and_then(|b| String::from_utf8(b).ok()) {
            return text;
        }
    }
    trimmed.to_string()
}

fn is_link(line: &str) -> bool {
    match protocol_of(line) {
        Some(p) => p != "http" && p != "https",
        None => false,
    }
}

/// Base64 of the newline-joined node list, as served to clients.
pub fn encode_node_list(nodes: &[String]) -> String {
    STANDARD.encode(nodes.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_plain_body() {
        let body = "vless://a@h:1#A\r\n\n  trojan://b@h:2#B  \nhttps://nested/sub\ngarbage\n";
        assert_eq!(extract_links(body), vec!["vless://a@h:1#A", "trojan://b@h:2#B"]);
    }

    #[test]
    fn test_extract_base64_body() {
        let body = STANDARD.encode("vless://a@h:1#A\nss://YWVzOnA@h:3#C\n");
        assert_eq!(extract_links(&body).len(), 2);
    }

    #[test]
    fn test_encode_node_list() {
        let nodes = vec!["a://1".to_string(), "b://2".to_string()];
        let decoded = STANDARD.decode(encode_node_list(&nodes)).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "a://1\nb://2");
    }
}
