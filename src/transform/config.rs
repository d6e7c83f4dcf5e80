//! Typed node transform configuration.
//!
//! Stored as camelCase JSON inside settings (`defaultNodeTransform`) and
//! profiles (`nodeTransform`). Every nested block has its own defaults so a
//! partial document still deserializes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::store::lenient;

/// Default rename template.
pub const DEFAULT_TEMPLATE: &str = "{emoji}{region}-{protocol}-{index}";

fn default_protocol_order() -> Vec<String> {
    ["vless", "trojan", "vmess", "hysteria2", "ss", "ssr"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Complete transform configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeTransformConfig {
    /// `None` means "not set here", which matters for precedence.
    #[serde(deserialize_with = "lenient::opt_bool_like")]
    pub enabled: Option<bool>,
    pub rename: RenameConfig,
    pub dedup: DedupConfig,
    pub sort: SortConfig,
}

impl NodeTransformConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Whether the rename template will emit emoji flags.
    pub fn wants_emoji(&self) -> bool {
        self.is_enabled()
            && self.rename.template.enabled
            && self.rename.template.template.contains("{emoji}")
    }
}

/// Pick the transform that applies to a request.
///
/// Precedence: a profile that explicitly sets `enabled` (true or false) wins;
/// otherwise the global transform applies if it is enabled; otherwise the
/// built-in default, which is a no-op.
pub fn resolve_transform(
    global: &NodeTransformConfig,
    profile: Option<&NodeTransformConfig>,
) -> NodeTransformConfig {
    match profile {
        Some(p) if p.enabled.is_some() => p.clone(),
        _ if global.is_enabled() => global.clone(),
        _ => NodeTransformConfig::default(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenameConfig {
    pub regex: RegexRenameConfig,
    pub template: TemplateConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegexRenameConfig {
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enabled: bool,
    pub rules: Vec<RegexRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegexRule {
    pub pattern: String,
    pub replacement: String,
    /// Regex flags: `i` matches case-insensitively, `g` replaces every
    /// match instead of the first. Other flags are ignored.
    pub flags: String,
}

/// Counter scope for `{index}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexScope {
    Global,
    Region,
    Protocol,
    #[default]
    #[serde(other)]
    RegionProtocol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateConfig {
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enabled: bool,
    pub template: String,
    pub index_start: u64,
    pub index_pad: usize,
    pub index_scope: IndexScope,
    pub region_alias: HashMap<String, String>,
    pub protocol_alias: HashMap<String, String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            template: DEFAULT_TEMPLATE.to_string(),
            index_start: 1,
            index_pad: 2,
            index_scope: IndexScope::RegionProtocol,
            region_alias: HashMap::new(),
            protocol_alias: HashMap::from([("hysteria2".to_string(), "hy2".to_string())]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DedupConfig {
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enabled: bool,
    /// Only `serverPort` is defined.
    pub mode: String,
    #[serde(deserialize_with = "lenient::bool_like")]
    pub include_protocol: bool,
    pub prefer: DedupPrefer,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: "serverPort".to_string(),
            include_protocol: false,
            prefer: DedupPrefer::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DedupPrefer {
    pub protocol_order: Vec<String>,
}

impl Default for DedupPrefer {
    fn default() -> Self {
        Self {
            protocol_order: default_protocol_order(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SortConfig {
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient::bool_like")]
    pub name_ignore_emoji: bool,
    pub keys: Vec<SortKeyConfig>,
}

impl Default for SortConfig {
    fn default() -> Self {
        let regions = ["香港", "台湾", "日本", "新加坡", "美国", "韩国", "英国", "德国", "法国", "加拿大"];
        Self {
            enabled: false,
            name_ignore_emoji: true,
            keys: vec![
                SortKeyConfig {
                    key: SortField::Region,
                    order: SortOrder::Asc,
                    custom_order: regions.iter().map(|s| s.to_string()).collect(),
                },
                SortKeyConfig {
                    key: SortField::Protocol,
                    order: SortOrder::Asc,
                    custom_order: default_protocol_order(),
                },
                SortKeyConfig {
                    key: SortField::Name,
                    order: SortOrder::Asc,
                    custom_order: Vec::new(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Region,
    Protocol,
    Name,
    Server,
    Port,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Desc,
    #[default]
    #[serde(other)]
    Asc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortKeyConfig {
    pub key: SortField,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub custom_order: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(flag: Option<bool>) -> NodeTransformConfig {
        NodeTransformConfig {
            enabled: flag,
            ..Default::default()
        }
    }

    #[test]
    fn test_profile_explicit_wins() {
        let global = enabled(Some(true));
        let profile = enabled(Some(false));
        assert_eq!(resolve_transform(&global, Some(&profile)).enabled, Some(false));
    }

    #[test]
    fn test_falls_back_to_global_then_default() {
        let global = enabled(Some(true));
        let unset = enabled(None);
        assert_eq!(resolve_transform(&global, Some(&unset)).enabled, Some(true));
        assert_eq!(resolve_transform(&enabled(Some(false)), Some(&unset)), NodeTransformConfig::default());
        assert!(!resolve_transform(&enabled(None), None).is_enabled());
    }

    #[test]
    fn test_partial_document() {
        let cfg: NodeTransformConfig = serde_json::from_str(
            r#"{"enabled":"true","dedup":{"enabled":true},"rename":{"template":{"enabled":true}}}"#,
        )
        .unwrap();
        assert!(cfg.is_enabled());
        assert!(cfg.dedup.enabled);
        assert_eq!(cfg.dedup.prefer.protocol_order[0], "vless");
        assert_eq!(cfg.rename.template.template, DEFAULT_TEMPLATE);
        assert!(cfg.wants_emoji());
    }
}
