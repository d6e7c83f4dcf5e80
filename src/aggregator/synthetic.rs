//! Synthetic informational nodes.
//!
//! Both point at a blackhole trojan endpoint; clients only show the name.

const PLACEHOLDER: &str = "trojan://00000000-0000-0000-0000-000000000000@127.0.0.1:443";

/// Single node served in place of an expired profile.
pub fn expired_node() -> String {
    format!("{}#{}", PLACEHOLDER, urlencoding::encode("Subscription expired"))
}

/// Node whose name reports the remaining traffic.
pub fn traffic_node(remaining: u64) -> String {
    let name = format!("Traffic remaining ≫ {}", format_bytes(remaining));
    format!("{}#{}", PLACEHOLDER, urlencoding::encode(&name))
}

/// Human-readable size with 1024-based units and two decimals.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exponent])
}
