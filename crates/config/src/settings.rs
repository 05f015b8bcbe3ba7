//! The validated options record and its tolerant loader.

use serde_json::Value;
use tabtidy_world::GroupColor;
use tracing::warn;

use crate::{Error, defaults};

/// A locator rewrite rule: tabs whose `host + path` matches `pattern` are
/// keyed as if their host were `host`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AltDomainRule {
    /// Regex tested against `host + path`.
    pub pattern: String,
    /// Replacement host used for grouping and sorting.
    pub host: String,
}

/// A group color rule: groups whose name starts with the label prefix get
/// the color. The longest matching prefix wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColorRule {
    /// Space-joined label prefix of the group name.
    pub prefix: String,
    /// Color to apply.
    pub color: GroupColor,
}

/// Validated options snapshot handed to the engine.
///
/// Construct with [`Settings::default`] or by merging a persisted blob over
/// the defaults with [`Settings::from_json`] / [`Settings::from_value`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Reorder tabs at all.
    pub enable_sort: bool,
    /// Maintain physical tab groups at all.
    pub enable_groups: bool,
    /// Minimum tab count for a logical group to exist.
    pub group_threshold: u32,
    /// Ordered locator rewrite rules; first match wins.
    pub alt_domain_rules: Vec<AltDomainRule>,
    /// Group color rules; longest prefix wins.
    pub group_color_rules: Vec<ColorRule>,
    /// Collapse groups that fall out of the recency list.
    pub auto_collapse_enabled: bool,
    /// Capacity of the recency list.
    pub auto_collapse_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_sort: defaults::ENABLE_SORT,
            enable_groups: defaults::ENABLE_GROUPS,
            group_threshold: defaults::GROUP_THRESHOLD,
            alt_domain_rules: Vec::new(),
            group_color_rules: defaults::default_color_rules(),
            auto_collapse_enabled: defaults::AUTO_COLLAPSE_ENABLED,
            auto_collapse_limit: defaults::AUTO_COLLAPSE_LIMIT,
        }
    }
}

impl Settings {
    /// Parse a persisted JSON blob and merge it over the defaults.
    pub fn from_json(blob: &str) -> Result<Self, Error> {
        Self::from_value(serde_json::from_str(blob)?)
    }

    /// Merge an already-parsed persisted value over the defaults.
    ///
    /// `null` yields the defaults (nothing was ever stored). Any other
    /// non-object value is rejected; inside an object, every key is merged
    /// independently and bad values degrade to their defaults.
    pub fn from_value(value: Value) -> Result<Self, Error> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(Error::NotAnObject {
                    found: json_type(&other),
                });
            }
        };

        let mut settings = Self::default();
        for (key, val) in map {
            match key.as_str() {
                "enableSort" => merge_bool(&key, val, &mut settings.enable_sort),
                "enableGroups" => merge_bool(&key, val, &mut settings.enable_groups),
                "groupThreshold" => merge_u32(&key, val, &mut settings.group_threshold),
                "altDomainRules" => {
                    settings.alt_domain_rules = merge_rules(&key, val, |pair: (String, String)| {
                        Some(AltDomainRule {
                            pattern: pair.0,
                            host: pair.1,
                        })
                    });
                }
                "groupColors" => {
                    settings.group_color_rules =
                        merge_rules(&key, val, |pair: (String, GroupColor)| {
                            Some(ColorRule {
                                prefix: pair.0,
                                color: pair.1,
                            })
                        });
                }
                "autoCollapseEnabled" => {
                    merge_bool(&key, val, &mut settings.auto_collapse_enabled);
                }
                "autoCollapseLimit" => merge_u32(&key, val, &mut settings.auto_collapse_limit),
                // Hosts may persist keys we never look at.
                _ => {}
            }
        }

        settings.clamp();
        Ok(settings)
    }

    /// Clamp numeric options into their legal ranges.
    fn clamp(&mut self) {
        self.group_threshold = self
            .group_threshold
            .clamp(defaults::THRESHOLD_MIN, defaults::THRESHOLD_MAX);
        self.auto_collapse_limit = self.auto_collapse_limit.max(defaults::COLLAPSE_LIMIT_MIN);
    }
}

/// JSON type name for diagnostics.
fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Overwrite `slot` when `val` is a bool; keep the default otherwise.
fn merge_bool(key: &str, val: Value, slot: &mut bool) {
    match val {
        Value::Bool(b) => *slot = b,
        other => warn!(
            "ignoring option {}: expected bool, got {}",
            key,
            json_type(&other)
        ),
    }
}

/// Overwrite `slot` when `val` is a non-negative integer; keep the default
/// otherwise.
fn merge_u32(key: &str, val: Value, slot: &mut u32) {
    match val.as_u64().and_then(|n| u32::try_from(n).ok()) {
        Some(n) => *slot = n,
        None => warn!("ignoring option {}: expected small integer", key),
    }
}

/// Parse a rule list entry by entry, dropping malformed entries.
fn merge_rules<R, P>(key: &str, val: Value, build: impl Fn(P) -> Option<R>) -> Vec<R>
where
    P: serde::de::DeserializeOwned,
{
    let entries = match val {
        Value::Array(entries) => entries,
        other => {
            warn!(
                "ignoring option {}: expected array, got {}",
                key,
                json_type(&other)
            );
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(at, entry)| match serde_json::from_value::<P>(entry) {
            Ok(pair) => build(pair),
            Err(e) => {
                warn!("ignoring {}[{}]: {}", key, at, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_options() {
        let s = Settings::default();
        assert!(s.enable_sort);
        assert!(s.enable_groups);
        assert_eq!(s.group_threshold, 4);
        assert!(!s.auto_collapse_enabled);
        assert_eq!(s.auto_collapse_limit, 3);
        assert_eq!(s.group_color_rules.len(), 3);
        assert_eq!(s.group_color_rules[0].prefix, "google");
        assert_eq!(s.group_color_rules[0].color, GroupColor::Blue);
    }

    #[test]
    fn partial_blob_merges_over_defaults() {
        let s = Settings::from_json(r#"{"groupThreshold": 6, "enableSort": false}"#).unwrap();
        assert_eq!(s.group_threshold, 6);
        assert!(!s.enable_sort);
        assert!(s.enable_groups);
        assert_eq!(s.group_color_rules.len(), 3);
    }

    #[test]
    fn null_blob_yields_defaults() {
        let s = Settings::from_value(Value::Null).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let s = Settings::from_json(r#"{"somethingElse": [1, 2, 3]}"#).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn wrong_typed_keys_keep_defaults() {
        let s = Settings::from_json(
            r#"{"groupThreshold": "four", "enableGroups": 1, "autoCollapseLimit": -2}"#,
        )
        .unwrap();
        assert_eq!(s.group_threshold, 4);
        assert!(s.enable_groups);
        assert_eq!(s.auto_collapse_limit, 3);
    }

    #[test]
    fn threshold_is_clamped_to_ui_range() {
        let s = Settings::from_json(r#"{"groupThreshold": 1}"#).unwrap();
        assert_eq!(s.group_threshold, 2);
        let s = Settings::from_json(r#"{"groupThreshold": 500}"#).unwrap();
        assert_eq!(s.group_threshold, 99);
    }

    #[test]
    fn color_rules_parse_and_filter() {
        let s = Settings::from_json(
            r#"{"groupColors": [["github", "purple"], ["bad", "mauve"], 17, ["docs"]]}"#,
        )
        .unwrap();
        assert_eq!(s.group_color_rules.len(), 1);
        assert_eq!(s.group_color_rules[0].prefix, "github");
        assert_eq!(s.group_color_rules[0].color, GroupColor::Purple);
    }

    #[test]
    fn alt_domain_rules_parse() {
        let s = Settings::from_json(
            r#"{"altDomainRules": [["^docs\\.example\\.", "example.com"], [42, "x"]]}"#,
        )
        .unwrap();
        assert_eq!(s.alt_domain_rules.len(), 1);
        assert_eq!(s.alt_domain_rules[0].host, "example.com");
    }

    #[test]
    fn non_object_blob_is_rejected() {
        assert!(Settings::from_json("[1, 2]").is_err());
        assert!(Settings::from_json("true").is_err());
        assert!(Settings::from_json("{not json").is_err());
    }
}
