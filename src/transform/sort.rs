use std::cmp::Ordering;

use crate::links::ProxyNode;
use crate::transform::config::{SortConfig, SortField, SortKeyConfig, SortOrder};
use crate::transform::{region, Entry};

/// Stable sort by the configured key chain. Unparsed entries go last.
pub fn sort(entries: &mut Vec<Entry>, config: &SortConfig) {
    if config.keys.is_empty() {
        return;
    }
    let (mut parsed, unparsed): (Vec<Entry>, Vec<Entry>) =
        entries.drain(..).partition(|e| e.node.is_some());

    parsed.sort_by(|a, b| match (&a.node, &b.node) {
        (Some(a), Some(b)) => compare(a, b, config),
        _ => Ordering::Equal,
    });

    entries.extend(parsed);
    entries.extend(unparsed);
}

fn compare(a: &ProxyNode, b: &ProxyNode, config: &SortConfig) -> Ordering {
    config
        .keys
        .iter()
        .map(|key| {
            let ordering = compare_key(a, b, key, config.name_ignore_emoji);
            match key.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn compare_key(a: &ProxyNode, b: &ProxyNode, key: &SortKeyConfig, ignore_emoji: bool) -> Ordering {
    match key.key {
        SortField::Region => {
            let (ra, rb) = (region::detect(&a.name).name, region::detect(&b.name).name);
            by_custom_order(ra, rb, &key.custom_order)
        }
        SortField::Protocol => by_custom_order(&a.protocol, &b.protocol, &key.custom_order),
        SortField::Name => {
            if ignore_emoji {
                strip_emoji(&a.name).cmp(&strip_emoji(&b.name))
            } else {
                a.name.cmp(&b.name)
            }
        }
        SortField::Server => a.server.cmp(&b.server),
        SortField::Port => a.port.cmp(&b.port),
        SortField::Unknown => Ordering::Equal,
    }
}

/// Listed values first, in list order; the rest alphabetically after them.
fn by_custom_order(a: &str, b: &str, order: &[String]) -> Ordering {
    let rank = |v: &str| order.iter().position(|o| o.eq_ignore_ascii_case(v)).unwrap_or(usize::MAX);
    rank(a).cmp(&rank(b)).then_with(|| a.cmp(b))
}

fn strip_emoji(name: &str) -> String {
    name.chars()
        .filter(|c| {
            let cp = *c as u32;
            !(cp >= 0x1F000 || (0x2600..=0x27BF).contains(&cp) || cp == 0xFE0F || cp == 0x200D)
        })
        .collect::<String>()
        .trim()
        .to_string()
}
