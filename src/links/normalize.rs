//! Name-fragment repair, prefixing and manual renames.

use crate::links::node::{link_name, percent_decode, protocol_of, set_link_name};

/// Repair double-encoded or raw name fragments.
///
/// vmess links carry their name inside the payload and are returned as-is,
/// as are protocols this function does not know.
pub fn fix_encoding(link: &str) -> String {
    match protocol_of(link).as_deref() {
        Some("ss") => fix_ss(link),
        Some("trojan" | "vless" | "hysteria2") => fix_fragment(link),
        _ => link.to_string(),
    }
}

fn fix_fragment(link: &str) -> String {
    let Some((base, fragment)) = link.split_once('#') else {
        return link.to_string();
    };
    let mut decoded = percent_decode(fragment);
    if decoded.contains('%') {
        decoded = percent_decode(&decoded);
    }
    // A replacement character means the bytes were not UTF-8; leave them alone.
    if decoded.contains('\u{FFFD}') {
        return link.to_string();
    }
    format!("{}#{}", base, urlencoding::encode(&decoded))
}

fn fix_ss(link: &str) -> String {
    let (base, fragment) = match link.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (link, None),
    };
    let after_scheme = &base["ss://".len()..];
    let base = match after_scheme.split_once('@') {
        Some((userinfo, rest)) if userinfo.contains('%') => {
            format!("ss://{}@{}", percent_decode(userinfo), rest)
        }
        _ => base.to_string(),
    };
    match fragment {
        Some(f) if !f.is_empty() => format!("{}#{}", base, urlencoding::encode(&percent_decode(f))),
        _ => base,
    }
}

/// Prefix the display name with `prefix - `, unless it already starts with it.
pub fn prepend_name(link: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return link.to_string();
    }
    let current = link_name(link);
    if current.starts_with(prefix) {
        return link.to_string();
    }
    let name = if current.is_empty() {
        prefix.to_string()
    } else {
        format!("{} - {}", prefix, current)
    };
    set_link_name(link, &name)
}

/// Give a manual node the name configured on its source.
pub fn apply_custom_name(link: &str, name: &str) -> String {
    if name.trim().is_empty() {
        return link.to_string();
    }
    match protocol_of(link).as_deref() {
        Some("vmess" | "ss" | "trojan" | "vless" | "hysteria2" | "tuic") => set_link_name(link, name),
        _ => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_double_encoded_fragment() {
        let link = "trojan://pw@h:443#%25E9%25A6%2599%25E6%25B8%25AF";
        assert_eq!(fix_encoding(link), "trojan://pw@h:443#%E9%A6%99%E6%B8%AF");
    }

    #[test]
    fn test_fix_raw_fragment() {
        assert_eq!(fix_encoding("vless://u@h:1#香港 A"), "vless://u@h:1#%E9%A6%99%E6%B8%AF%20A");
    }

    #[test]
    fn test_fix_ss_userinfo() {
        let link = "ss://YWVz%3DLTI@1.2.3.4:80#A%20B";
        assert_eq!(fix_encoding(link), "ss://YWVz=LTI@1.2.3.4:80#A%20B");
    }

    #[test]
    fn test_unknown_protocol_untouched() {
        assert_eq!(fix_encoding("tuic://x@h:1#%2541"), "tuic://x@h:1#%2541");
    }

    #[test]
    fn test_prepend_is_idempotent() {
        let once = prepend_name("trojan://pw@h:443#HK", "Airport");
        assert_eq!(link_name(&once), "Airport - HK");
        assert_eq!(prepend_name(&once, "Airport"), once);

        let unnamed = prepend_name("trojan://pw@h:443", "Airport");
        assert_eq!(link_name(&unnamed), "Airport");
    }

    #[test]
    fn test_apply_custom_name() {
        let named = apply_custom_name("vless://u@h:1#old", "Home");
        assert_eq!(link_name(&named), "Home");
        assert_eq!(apply_custom_name("vless://u@h:1#old", " "), "vless://u@h:1#old");
        assert_eq!(apply_custom_name("socks://h:1#old", "x"), "socks://h:1#old");
    }
}
