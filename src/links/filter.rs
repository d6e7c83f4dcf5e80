//! Include/exclude rule sets.
//!
//! Rule text is one rule per line. `proto:vless,trojan` lines match by
//! protocol; every other line is a regex fragment. Fragments are joined
//! with `|` into one case-insensitive pattern.

use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

use crate::links::node::{link_name, protocol_of};

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    protocols: HashSet<String>,
    name_regex: Option<Regex>,
}

impl RuleSet {
    pub fn parse(text: &str) -> Self {
        let mut protocols = HashSet::new();
        let mut patterns = Vec::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line == "---" {
                continue;
            }
            let lower = line.to_ascii_lowercase();
            if let Some(list) = lower.strip_prefix("proto:") {
                protocols.extend(
                    list.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(|p| if p == "hy2" { "hysteria2".to_string() } else { p.to_string() }),
                );
                continue;
            }
            patterns.push(line);
        }

        let name_regex = if patterns.is_empty() {
            None
        } else {
            match RegexBuilder::new(&patterns.join("|")).case_insensitive(true).build() {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid filter regex, rule skipped");
                    None
                }
            }
        };

        Self {
            protocols,
            name_regex,
        }
    }

    pub fn has_rules(&self) -> bool {
        !self.protocols.is_empty() || self.name_regex.is_some()
    }

    /// Protocol hit, or a regex hit on the decoded name or raw link.
    pub fn matches(&self, link: &str) -> bool {
        let protocol_hit = protocol_of(link).is_some_and(|p| self.protocols.contains(&p));
        protocol_hit
            || self
                .name_regex
                .as_ref()
                .is_some_and(|re| re.is_match(&link_name(link)) || re.is_match(link))
    }
}

/// Apply a source's include rules, then its exclude rules.
pub fn apply_filters(links: Vec<String>, include: &str, exclude: &str) -> Vec<String> {
    let include = RuleSet::parse(include);
    let exclude = RuleSet::parse(exclude);

    links
        .into_iter()
        .filter(|link| !include.has_rules() || include.matches(link))
        .filter(|link| !exclude.has_rules() || !exclude.matches(link))
        .collect()
}
