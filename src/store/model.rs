//! Stored data model: settings, subscription sources and profiles.
//!
//! Field names follow the camelCase JSON the data file has always used.
//! Defaults are merged once, at deserialization time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::lenient;
use crate::transform::NodeTransformConfig;

pub const DEFAULT_SUB_CONFIG: &str =
    "https://raw.githubusercontent.com/cmliu/ACL4SSR/refs/heads/main/Clash/config/ACL4SSR_Online_Full.ini";

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Display name used for the download filename.
    #[serde(rename = "FileName", deserialize_with = "lenient::string_like")]
    pub file_name: String,

    /// Access token for the all-sources subscription.
    #[serde(rename = "mytoken", deserialize_with = "lenient::string_like")]
    pub my_token: String,

    /// Access token required in front of every profile identifier.
    #[serde(deserialize_with = "lenient::string_like")]
    pub profile_token: String,

    #[serde(deserialize_with = "lenient::string_like")]
    pub sub_converter: String,
    #[serde(deserialize_with = "lenient::string_like")]
    pub sub_config: String,

    #[serde(deserialize_with = "lenient::bool_like")]
    pub sub_converter_scv: bool,

    #[serde(deserialize_with = "lenient::bool_like")]
    pub sub_converter_udp: bool,

    #[serde(deserialize_with = "lenient::bool_like")]
    pub enable_access_log: bool,

    #[serde(deserialize_with = "lenient::bool_like")]
    pub enable_traffic_node: bool,

    pub default_prefix_settings: PrefixSettings,
    pub default_node_transform: NodeTransformConfig,
    pub disguise: DisguiseSettings,

    #[serde(rename = "BotToken", deserialize_with = "lenient::string_like")]
    pub bot_token: String,

    #[serde(rename = "ChatID", deserialize_with = "lenient::string_like")]
    pub chat_id: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            file_name: "MiSub".to_string(),
            my_token: "auto".to_string(),
            profile_token: "profiles".to_string(),
            sub_converter: "url.v1.mk".to_string(),
            sub_config: DEFAULT_SUB_CONFIG.to_string(),
            sub_converter_scv: false,
            sub_converter_udp: false,
            enable_access_log: false,
            enable_traffic_node: false,
            default_prefix_settings: PrefixSettings::default(),
            default_node_transform: NodeTransformConfig::default(),
            disguise: DisguiseSettings::default(),
            bot_token: String::new(),
            chat_id: String::new(),
        }
    }
}

/// Name prefixing for manual and subscription nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrefixSettings {
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enable_manual_nodes: bool,
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enable_subscriptions: bool,
    #[serde(deserialize_with = "lenient::string_like")]
    pub manual_node_prefix: String,
}

impl Default for PrefixSettings {
    fn default() -> Self {
        Self {
            enable_manual_nodes: true,
            enable_subscriptions: true,
            manual_node_prefix: "手动节点".to_string(),
        }
    }
}

impl PrefixSettings {
    /// Profile values override global ones field by field.
    pub fn merged(&self, overrides: Option<&PrefixOverrides>) -> PrefixSettings {
        let Some(o) = overrides else {
            return self.clone();
        };
        PrefixSettings {
            enable_manual_nodes: o.enable_manual_nodes.unwrap_or(self.enable_manual_nodes),
            enable_subscriptions: o.enable_subscriptions.unwrap_or(self.enable_subscriptions),
            manual_node_prefix: o
                .manual_node_prefix
                .clone()
                .unwrap_or_else(|| self.manual_node_prefix.clone()),
        }
    }
}

/// Per-profile prefix settings; absent fields inherit the global value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PrefixOverrides {
    #[serde(deserialize_with = "lenient::opt_bool_like")]
    pub enable_manual_nodes: Option<bool>,
    #[serde(deserialize_with = "lenient::opt_bool_like")]
    pub enable_subscriptions: Option<bool>,
    pub manual_node_prefix: Option<String>,
}

/// Browser disguise page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisguiseSettings {
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enabled: bool,
    /// `default` or `redirect`.
    #[serde(deserialize_with = "lenient::string_like")]
    pub page_type: String,
    #[serde(deserialize_with = "lenient::string_like")]
    pub redirect_url: String,
}

/// Traffic counters reported by a subscription provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserInfo {
    #[serde(deserialize_with = "lenient::u64_like")]
    pub upload: u64,
    #[serde(deserialize_with = "lenient::u64_like")]
    pub download: u64,
    #[serde(deserialize_with = "lenient::u64_like")]
    pub total: u64,
}

impl UserInfo {
    /// Remaining quota, or `None` when the provider reports no total.
    pub fn remaining(&self) -> Option<u64> {
        if self.total == 0 {
            return None;
        }
        Some(self.total.saturating_sub(self.upload.saturating_add(self.download)))
    }
}

/// A manual node or remote subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Source {
    #[serde(deserialize_with = "lenient::string_like")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string_like")]
    pub url: String,
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient::string_like")]
    pub name: String,
    pub user_info: Option<UserInfo>,
    #[serde(deserialize_with = "lenient::string_like")]
    pub filter_include: String,
    #[serde(deserialize_with = "lenient::string_like")]
    pub filter_exclude: String,
}

impl Source {
    /// Remote subscriptions are fetched over HTTP; anything else is a link.
    pub fn is_remote(&self) -> bool {
        let url = self.url.trim_start();
        url.get(..4).is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
    }

    /// Name used in logs and cache fingerprints.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.url
        } else {
            &self.name
        }
    }
}

/// A curated subset of sources with its own identifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Profile {
    #[serde(deserialize_with = "lenient::string_like")]
    pub id: String,
    #[serde(deserialize_with = "lenient::string_like")]
    pub custom_id: String,
    #[serde(deserialize_with = "lenient::string_like")]
    pub name: String,
    #[serde(deserialize_with = "lenient::bool_like")]
    pub enabled: bool,
    pub subscriptions: Vec<String>,
    pub manual_nodes: Vec<String>,
    #[serde(deserialize_with = "lenient::string_like")]
    pub sub_converter: String,
    #[serde(deserialize_with = "lenient::string_like")]
    pub sub_config: String,
    pub node_transform: Option<NodeTransformConfig>,
    pub prefix_settings: Option<PrefixOverrides>,
    #[serde(deserialize_with = "lenient::opt_string_like")]
    pub expires_at: Option<String>,
    #[serde(deserialize_with = "lenient::u64_like")]
    pub download_count: u64,
}

impl Profile {
    /// Custom identifier first, then internal id.
    pub fn matches(&self, identifier: &str) -> bool {
        (!self.custom_id.is_empty() && self.custom_id == identifier) || self.id == identifier
    }

    /// Whether `expiresAt` lies before `now`. Unparseable dates never expire.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .as_deref()
            .and_then(parse_expiry)
            .is_some_and(|expiry| now > expiry)
    }
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
