//! Node transforms.
//!
//! # Order
//! ```text
//! links → dedup.rs (server+port[+protocol], preferred protocol kept)
//!       → rename.rs (regex rules, then template)
//!       → sort.rs (configured key chain, stable)
//! ```
//!
//! Links that cannot be parsed are never dropped: dedup and rename leave
//! them alone and sort moves them after every parsed node.

pub mod config;
pub mod dedup;
pub mod region;
pub mod rename;
pub mod sort;

pub use config::{
    resolve_transform, DedupConfig, IndexScope, NodeTransformConfig, RenameConfig, SortConfig,
    SortField, SortKeyConfig, SortOrder, TemplateConfig, DEFAULT_TEMPLATE,
};

use crate::links::ProxyNode;

/// A link together with its parsed form.
#[derive(Debug, Clone)]
pub struct Entry {
    pub link: String,
    pub node: Option<ProxyNode>,
    /// Caller-defined tag that survives reordering (the source index).
    pub origin: usize,
}

impl Entry {
    pub fn new(link: String) -> Self {
        Self::with_origin(link, 0)
    }

    pub fn with_origin(link: String, origin: usize) -> Self {
        let node = ProxyNode::parse(&link);
        Self { link, node, origin }
    }
}

/// Run the enabled transforms over a node list.
pub fn apply(links: Vec<String>, config: &NodeTransformConfig) -> Vec<String> {
    let entries = links.into_iter().map(Entry::new).collect();
    apply_entries(entries, config)
        .into_iter()
        .map(|e| e.link)
        .collect()
}

/// Same as [`apply`], keeping each entry's origin tag.
pub fn apply_entries(mut entries: Vec<Entry>, config: &NodeTransformConfig) -> Vec<Entry> {
    if !config.is_enabled() || entries.is_empty() {
        return entries;
    }
    let before = entries.len();

    if config.dedup.enabled {
        entries = dedup::dedup(entries, &config.dedup);
    }
    if config.rename.regex.enabled || config.rename.template.enabled {
        entries = rename::rename(entries, &config.rename);
    }
    if config.sort.enabled {
        sort::sort(&mut entries, &config.sort);
    }

    tracing::debug!(before, after = entries.len(), "Node transforms applied");
    entries
}
