//! Regex and template renaming.

use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::links::set_link_name;
use crate::transform::config::{IndexScope, RegexRule, RenameConfig, TemplateConfig};
use crate::transform::{region, Entry};

/// Rename parsed nodes: regex rules first, then the template.
pub fn rename(entries: Vec<Entry>, config: &RenameConfig) -> Vec<Entry> {
    let rules = if config.regex.enabled {
        compile_rules(&config.regex.rules)
    } else {
        Vec::new()
    };
    let mut counters: HashMap<String, u64> = HashMap::new();

    entries
        .into_iter()
        .map(|mut entry| {
            let Some(node) = entry.node.as_mut() else {
                return entry;
            };
            let mut name = node.name.clone();
            for (re, replacement, global) in &rules {
                name = if *global {
                    re.replace_all(&name, replacement.as_str()).into_owned()
                } else {
                    re.replace(&name, replacement.as_str()).into_owned()
                };
            }
            if config.template.enabled {
                name = render(&config.template, node, &name, &mut counters);
            }
            if name != node.name {
                entry.link = set_link_name(&entry.link, &name);
                node.name = name;
            }
            entry
        })
        .collect()
}

fn compile_rules(rules: &[RegexRule]) -> Vec<(Regex, String, bool)> {
    rules
        .iter()
        .filter(|r| !r.pattern.is_empty())
        .filter_map(|r| {
            let built = RegexBuilder::new(&r.pattern)
                .case_insensitive(r.flags.contains('i'))
                .build();
            match built {
                Ok(re) => Some((re, r.replacement.clone(), r.flags.contains('g'))),
                Err(e) => {
                    tracing::warn!(pattern = %r.pattern, error = %e, "Invalid rename rule skipped");
                    None
                }
            }
        })
        .collect()
}

fn render(
    template: &TemplateConfig,
    node: &crate::links::ProxyNode,
    name: &str,
    counters: &mut HashMap<String, u64>,
) -> String {
    let detected = region::detect(name);
    let region = template
        .region_alias
        .get(detected.name)
        .map(String::as_str)
        .unwrap_or(detected.name);
    let protocol = template
        .protocol_alias
        .get(&node.protocol)
        .map(String::as_str)
        .unwrap_or(&node.protocol);

    let scope = match template.index_scope {
        IndexScope::Global => String::new(),
        IndexScope::Region => detected.name.to_string(),
        IndexScope::Protocol => node.protocol.clone(),
        IndexScope::RegionProtocol => format!("{}\u{0}{}", detected.name, node.protocol),
    };
    let counter = counters.entry(scope).or_insert(template.index_start);
    let index = format!("{:0width$}", *counter, width = template.index_pad);
    *counter += 1;

    template
        .template
        .replace("{emoji}", detected.emoji)
        .replace("{region}", region)
        .replace("{protocol}", protocol)
        .replace("{index}", &index)
        .replace("{name}", name)
        .replace("{server}", &node.server)
        .replace("{port}", &node.port.to_string())
}
