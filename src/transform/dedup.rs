use std::collections::HashMap;

use crate::transform::config::DedupConfig;
use crate::transform::Entry;

/// Drop nodes that share server and port (and protocol, if configured).
///
/// The survivor is the node whose protocol ranks best in
/// `prefer.protocol_order`; ties keep the earliest. The survivor takes the
/// slot of the first occurrence so output order stays stable.
pub fn dedup(entries: Vec<Entry>, config: &DedupConfig) -> Vec<Entry> {
    let rank = |protocol: &str| {
        config
            .prefer
            .protocol_order
            .iter()
            .position(|p| p.eq_ignore_ascii_case(protocol))
            .unwrap_or(usize::MAX)
    };

    let mut out: Vec<Entry> = Vec::with_capacity(entries.len());
    let mut slots: HashMap<(String, u16, String), usize> = HashMap::new();

    for entry in entries {
        let Some(node) = &entry.node else {
            out.push(entry);
            continue;
        };
        let protocol = if config.include_protocol {
            node.protocol.clone()
        } else {
            String::new()
        };
        let key = (node.server.clone(), node.port, protocol);

        match slots.get(&key) {
            Some(&slot) => {
                let current = out[slot].node.as_ref().map_or(usize::MAX, |n| rank(&n.protocol));
                if rank(&node.protocol) < current {
                    out[slot] = entry;
                }
            }
            None => {
                slots.insert(key, out.len());
                out.push(entry);
            }
        }
    }
    out
}
