//! Tolerant deserializers for stored values.
//!
//! Older data files carry booleans as `"true"`/`"false"` strings and numbers
//! as strings or floats. These helpers accept either shape.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `true`, `"true"` (any case) and non-zero numbers are true; everything else is false.
pub fn bool_like<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        _ => false,
    })
}

/// Like [`bool_like`] but keeps "absent/null" distinct from `false`.
pub fn opt_bool_like<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Bool(b) => Some(b),
        Value::String(s) => Some(s.trim().eq_ignore_ascii_case("true")),
        Value::Number(n) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
        _ => None,
    })
}

/// Non-negative integer from a number, float or numeric string. Anything else is 0.
pub fn u64_like<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_to_u64(&Value::deserialize(deserializer)?))
}

pub(crate) fn value_to_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v > 0.0).map(|v| v as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| *v > 0.0).map_or(0, |v| v as u64),
        _ => 0,
    }
}

/// String from a string or number; null becomes empty.
pub fn string_like<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Optional string; numbers are kept as their decimal text, empty strings become `None`.
pub fn opt_string_like<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(deserialize_with = "bool_like")]
        flag: bool,
        #[serde(deserialize_with = "u64_like")]
        bytes: u64,
        #[serde(deserialize_with = "string_like")]
        chat: String,
    }

    #[test]
    fn test_legacy_shapes() {
        let p: Sample =
            serde_json::from_str(r#"{"flag":"TRUE","bytes":"1024","chat":123456}"#).unwrap();
        assert!(p.flag);
        assert_eq!(p.bytes, 1024);
        assert_eq!(p.chat, "123456");

        let p: Sample = serde_json::from_str(r#"{"flag":"false","bytes":1.5e3,"chat":null}"#).unwrap();
        assert!(!p.flag);
        assert_eq!(p.bytes, 1500);
        assert!(p.chat.is_empty());
    }
}
