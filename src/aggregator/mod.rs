//! Node source aggregation.
//!
//! # Data Flow
//! ```text
//! Plan (sources selected for a token or profile, effective settings)
//!     → manual sources: custom name, encoding repair
//!     → remote sources: fetched with bounded concurrency (fetch.rs),
//!       body decoded, encoding repair, include/exclude filters
//!     → concatenated in source-list order (not completion order)
//!     → transforms (dedup → rename → sort)
//!     → name prefixes per origin
//!     → optional traffic-info node in front
//! ```
//!
//! A failed fetch contributes zero nodes and is logged; it never fails the
//! whole aggregation.

pub mod fetch;
pub mod synthetic;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};

use crate::links::{apply_custom_name, apply_filters, extract_links, fix_encoding, prepend_name};
use crate::observability::metrics;
use crate::store::{PrefixSettings, Profile, Settings, Source};
use crate::transform::{self, resolve_transform, Entry, NodeTransformConfig};

pub use fetch::{FetchError, HttpFetcher, SourceFetcher};

/// Output of one aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeList {
    pub nodes: Vec<String>,
    /// Display names of the remote sources that were consulted.
    pub source_names: Vec<String>,
}

/// Everything needed to rebuild a node list, detached from the request.
#[derive(Debug, Clone)]
pub struct Plan {
    pub sources: Vec<Source>,
    pub transform: NodeTransformConfig,
    pub prefix: PrefixSettings,
    pub traffic_node: bool,
    pub expired: bool,
}

impl Plan {
    /// All enabled sources, global transform and prefixes.
    pub fn for_token(settings: &Settings, sources: &[Source]) -> Self {
        Self {
            sources: sources.iter().filter(|s| s.enabled).cloned().collect(),
            transform: resolve_transform(&settings.default_node_transform, None),
            prefix: settings.default_prefix_settings.clone(),
            traffic_node: settings.enable_traffic_node,
            expired: false,
        }
    }

    /// Enabled sources referenced by the profile, with profile overrides.
    pub fn for_profile(
        settings: &Settings,
        sources: &[Source],
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Self {
        let expired = profile.is_expired(now);
        let selected = if expired {
            Vec::new()
        } else {
            let subscriptions: HashSet<&str> = profile.subscriptions.iter().map(String::as_str).collect();
            let manual: HashSet<&str> = profile.manual_nodes.iter().map(String::as_str).collect();
            sources
                .iter()
                .filter(|s| s.enabled)
                .filter(|s| {
                    if s.is_remote() {
                        subscriptions.contains(s.id.as_str())
                    } else {
                        manual.contains(s.id.as_str())
                    }
                })
                .cloned()
                .collect()
        };

        Self {
            sources: selected,
            transform: resolve_transform(&settings.default_node_transform, profile.node_transform.as_ref()),
            prefix: settings
                .default_prefix_settings
                .merged(profile.prefix_settings.as_ref()),
            traffic_node: settings.enable_traffic_node,
            expired,
        }
    }

    /// Names of the remote sources, in source order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .filter(|s| s.is_remote())
            .map(|s| s.display_name().to_string())
            .collect()
    }

    /// Sum of the remaining quota over sources that report one.
    pub fn remaining_traffic(&self) -> u64 {
        self.sources
            .iter()
            .filter_map(|s| s.user_info.as_ref().and_then(|u| u.remaining()))
            .sum()
    }
}

/// Builds node lists from plans.
#[derive(Clone)]
pub struct Aggregator {
    fetcher: Arc<dyn SourceFetcher>,
    concurrency: usize,
}

impl Aggregator {
    pub fn new(fetcher: Arc<dyn SourceFetcher>, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn aggregate(&self, plan: &Plan) -> NodeList {
        if plan.expired {
            return NodeList {
                nodes: vec![synthetic::expired_node()],
                source_names: Vec::new(),
            };
        }

        // buffered() yields in input order, which keeps the output deterministic.
        // Items are owned so the future stays Send when spawned for a refresh.
        let per_source: Vec<Vec<String>> = stream::iter(plan.sources.clone())
            .map(|source| {
                let aggregator = self.clone();
                async move { aggregator.collect_source(&source).await }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let entries: Vec<Entry> = per_source
            .into_iter()
            .enumerate()
            .flat_map(|(origin, links)| links.into_iter().map(move |l| Entry::with_origin(l, origin)))
            .collect();

        let mut nodes: Vec<String> = transform::apply_entries(entries, &plan.transform)
            .into_iter()
            .map(|entry| {
                let source = &plan.sources[entry.origin];
                match origin_prefix(source, &plan.prefix) {
                    Some(prefix) => prepend_name(&entry.link, prefix),
                    None => entry.link,
                }
            })
            .collect();

        if plan.traffic_node {
            let remaining = plan.remaining_traffic();
            if remaining > 0 {
                nodes.insert(0, synthetic::traffic_node(remaining));
            }
        }

        tracing::debug!(
            sources = plan.sources.len(),
            nodes = nodes.len(),
            "Node list aggregated"
        );
        NodeList {
            nodes,
            source_names: plan.source_names(),
        }
    }

    async fn collect_source(&self, source: &Source) -> Vec<String> {
        if !source.is_remote() {
            let link = source.url.trim();
            if link.is_empty() {
                return Vec::new();
            }
            let named = apply_custom_name(link, &source.name);
            return vec![fix_encoding(&named)];
        }

        match self.fetcher.fetch(source).await {
            Ok(body) => {
                let links: Vec<String> = extract_links(&body).iter().map(|l| fix_encoding(l)).collect();
                let total = links.len();
                let kept = apply_filters(links, &source.filter_include, &source.filter_exclude);
                metrics::record_source_fetch("success");
                tracing::debug!(
                    source = %source.display_name(),
                    total,
                    kept = kept.len(),
                    "Source fetched"
                );
                kept
            }
            Err(e) => {
                metrics::record_source_fetch("failure");
                tracing::warn!(source = %source.display_name(), error = %e, "Source fetch failed, skipping");
                Vec::new()
            }
        }
    }
}

fn origin_prefix<'a>(source: &'a Source, prefix: &'a PrefixSettings) -> Option<&'a str> {
    if source.is_remote() {
        (prefix.enable_subscriptions && !source.name.is_empty()).then_some(source.name.as_str())
    } else {
        (prefix.enable_manual_nodes && !prefix.manual_node_prefix.is_empty())
            .then_some(prefix.manual_node_prefix.as_str())
    }
}
