//! Backend candidate lists and URL variants.

use url::Url;

/// `[primary, fallbacks...]`, trimmed, empties removed, first occurrence kept.
pub fn build_candidates(primary: &str, fallbacks: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for candidate in std::iter::once(primary).chain(fallbacks.iter().map(String::as_str)) {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        let normalized = normalize_for_compare(candidate);
        if out.iter().any(|c| normalize_for_compare(c) == normalized) {
            continue;
        }
        out.push(candidate.to_string());
    }
    out
}

fn normalize_for_compare(candidate: &str) -> String {
    candidate.trim_end_matches('/').to_ascii_lowercase()
}

fn has_scheme(candidate: &str) -> bool {
    let lower = candidate.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Absolute URLs to try for one candidate, pointing at its `/sub` endpoint.
///
/// A candidate without a scheme yields an https variant, then an http one.
/// Variants that do not parse are skipped.
pub fn url_variants(candidate: &str) -> Vec<Url> {
    let candidate = candidate.trim();
    let raw: Vec<String> = if has_scheme(candidate) {
        vec![candidate.to_string()]
    } else {
        vec![format!("https://{}", candidate), format!("http://{}", candidate)]
    };

    let mut variants: Vec<Url> = Vec::new();
    for r in raw {
        let Ok(mut url) = Url::parse(&r) else {
            tracing::debug!(candidate = %r, "Skipping unparseable backend");
            continue;
        };
        if url.host_str().map_or(true, str::is_empty) {
            continue;
        }
        let path = url.path().trim_end_matches('/').to_string();
        let normalized = if path.to_ascii_lowercase().ends_with("/sub") {
            path
        } else {
            format!("{}/sub", path)
        };
        url.set_path(&normalized);
        url.set_query(None);
        url.set_fragment(None);
        if !variants.contains(&url) {
            variants.push(url);
        }
    }
    variants
}

/// `scheme://host[:port]/path`, as reported in attempt lists.
pub fn endpoint_label(url: &Url) -> String {
    format!("{}{}", url.origin().ascii_serialization(), url.path())
}
