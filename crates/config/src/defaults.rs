//! Defaults and legal ranges for persisted options.

use tabtidy_world::GroupColor;

use crate::settings::ColorRule;

pub(crate) const ENABLE_SORT: bool = true;
pub(crate) const ENABLE_GROUPS: bool = true;
pub(crate) const GROUP_THRESHOLD: u32 = 4;
pub(crate) const AUTO_COLLAPSE_ENABLED: bool = false;
pub(crate) const AUTO_COLLAPSE_LIMIT: u32 = 3;

/// Legal threshold range, matching the settings UI.
pub(crate) const THRESHOLD_MIN: u32 = 2;
pub(crate) const THRESHOLD_MAX: u32 = 99;

/// Lower bound for the auto-collapse recency capacity.
pub(crate) const COLLAPSE_LIMIT_MIN: u32 = 1;

/// Stock color rules applied when none are configured.
pub(crate) fn default_color_rules() -> Vec<ColorRule> {
    vec![
        ColorRule {
            prefix: "google".to_string(),
            color: GroupColor::Blue,
        },
        ColorRule {
            prefix: "stackoverflow".to_string(),
            color: GroupColor::Orange,
        },
        ColorRule {
            prefix: "duckduckgo".to_string(),
            color: GroupColor::Red,
        },
    ]
}
