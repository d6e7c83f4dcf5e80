//! Output format negotiation.

use std::collections::HashMap;

pub const BASE64: &str = "base64";

/// Boolean query flags, in priority order.
const FORMAT_FLAGS: [&str; 7] = ["clash", "singbox", "surge", "loon", "base64", "v2ray", "trojan"];

/// User-Agent keywords, most specific first.
const CLIENT_KEYWORDS: [(&str, &str); 16] = [
    ("flyclash", "clash"),
    ("mihomo", "clash"),
    ("clash.meta", "clash"),
    ("clash-verge", "clash"),
    ("meta", "clash"),
    ("stash", "clash"),
    ("nekoray", "clash"),
    ("sing-box", "singbox"),
    ("shadowrocket", "base64"),
    ("v2rayn", "base64"),
    ("v2rayng", "base64"),
    ("surge", "surge"),
    ("loon", "loon"),
    ("quantumult%20x", "quanx"),
    ("quantumult", "quanx"),
    ("clash", "clash"),
];

const BROWSER_MARKERS: [&str; 6] = ["mozilla", "chrome", "safari", "firefox", "edg", "opera"];

/// `target` param, then format flags, then client keywords, then base64.
pub fn negotiate(query: &HashMap<String, String>, user_agent: &str) -> String {
    if let Some(target) = query.get("target").map(|t| t.trim()).filter(|t| !t.is_empty()) {
        return target.to_string();
    }

    if let Some(flag) = FORMAT_FLAGS.iter().find(|f| query.contains_key(**f)) {
        return match *flag {
            "v2ray" | "trojan" => BASE64.to_string(),
            other => other.to_string(),
        };
    }

    client_format(user_agent).unwrap_or(BASE64).to_string()
}

fn client_format(user_agent: &str) -> Option<&'static str> {
    let ua = user_agent.to_lowercase();
    CLIENT_KEYWORDS
        .iter()
        .find(|(keyword, _)| ua.contains(keyword))
        .map(|(_, format)| *format)
}

/// A browser is anything that looks like one and is not a known proxy client.
pub fn is_browser(user_agent: &str) -> bool {
    if client_format(user_agent).is_some() {
        return false;
    }
    let ua = user_agent.to_lowercase();
    BROWSER_MARKERS.iter().any(|m| ua.contains(m))
}

/// Targets whose degraded response is a YAML stub rather than base64.
pub fn wants_yaml_stub(target: &str) -> bool {
    matches!(target, "clash" | "loon" | "surge")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_explicit_target_wins() {
        assert_eq!(negotiate(&query(&[("target", "surge"), ("clash", "")]), "clash-verge/1.0"), "surge");
        assert_eq!(negotiate(&query(&[("target", " ")]), "clash-verge/1.0"), "clash");
    }

    #[test]
    fn test_flags_in_priority_order() {
        assert_eq!(negotiate(&query(&[("loon", ""), ("singbox", "")]), ""), "singbox");
        assert_eq!(negotiate(&query(&[("v2ray", "")]), "clash"), "base64");
        assert_eq!(negotiate(&query(&[("trojan", "1")]), ""), "base64");
    }

    #[test]
    fn test_client_keywords() {
        assert_eq!(negotiate(&HashMap::new(), "ClashVerge clash-verge/v1.7"), "clash");
        assert_eq!(negotiate(&HashMap::new(), "Shadowrocket/2070 CFNetwork"), "base64");
        assert_eq!(negotiate(&HashMap::new(), "SFA/1.9 (sing-box 1.9)"), "singbox");
        assert_eq!(negotiate(&HashMap::new(), "Quantumult%20X/1.4"), "quanx");
        assert_eq!(negotiate(&HashMap::new(), "curl/8.0"), "base64");
    }

    #[test]
    fn test_browser_detection() {
        assert!(is_browser(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/126.0 Safari/537.36"
        ));
        assert!(!is_browser("clash-verge/v1.7 Mozilla/5.0"));
        assert!(!is_browser("v2rayN/7.23"));
        assert!(!is_browser("curl/8.0"));
    }
}
