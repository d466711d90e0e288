use app_policy_core::update::ConfigUpdate;
use std::{fmt, str::FromStr};

pub const DROP_ACTION_OVERRIDE: &str = "DropActionOverride";
pub const STATS_ENABLED_FOR_ALLOWED: &str = "DataplaneStatsEnabledForAllowed";
pub const STATS_ENABLED_FOR_DENIED: &str = "DataplaneStatsEnabledForDenied";

/// Store-wide correction applied to denied verdicts.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DropActionOverride {
    #[default]
    Drop,
    LogAndDrop,
    Accept,
    LogAndAccept,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown DropActionOverride value: {0:?}")]
pub struct InvalidDropActionOverride(String);

// === impl DropActionOverride ===

impl DropActionOverride {
    /// Returns true if denied verdicts are to be rewritten as allowed.
    pub fn accepts(&self) -> bool {
        matches!(self, Self::Accept | Self::LogAndAccept)
    }
}

impl FromStr for DropActionOverride {
    type Err = InvalidDropActionOverride;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "loganddrop" => Ok(Self::LogAndDrop),
            "accept" => Ok(Self::Accept),
            "logandaccept" => Ok(Self::LogAndAccept),
            _ => Err(InvalidDropActionOverride(s.to_string())),
        }
    }
}

impl fmt::Display for DropActionOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => "Drop".fmt(f),
            Self::LogAndDrop => "LogAndDrop".fmt(f),
            Self::Accept => "Accept".fmt(f),
            Self::LogAndAccept => "LogAndAccept".fmt(f),
        }
    }
}

/// Settings extracted from a `ConfigUpdate`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct StoreConfig {
    /// Unset when the update does not mention the override.
    pub drop_action_override: Option<DropActionOverride>,
    pub stats_enabled_for_allowed: bool,
    pub stats_enabled_for_denied: bool,
}

// === impl StoreConfig ===

impl StoreConfig {
    /// Extracts known keys, ignoring everything else. Values that fail to
    /// parse fall back to their safe defaults.
    pub(crate) fn parse(update: &ConfigUpdate) -> Self {
        let drop_action_override = update.config.get(DROP_ACTION_OVERRIDE).map(|v| {
            v.parse().unwrap_or_else(|error: InvalidDropActionOverride| {
                tracing::error!(%error, "Falling back to Drop");
                DropActionOverride::Drop
            })
        });

        Self {
            drop_action_override,
            stats_enabled_for_allowed: parse_bool(update, STATS_ENABLED_FOR_ALLOWED),
            stats_enabled_for_denied: parse_bool(update, STATS_ENABLED_FOR_DENIED),
        }
    }
}

fn parse_bool(update: &ConfigUpdate, key: &str) -> bool {
    match update.config.get(key).map(|v| v.to_ascii_lowercase()) {
        None => false,
        Some(v) => match v.as_str() {
            "true" | "1" | "t" => true,
            "false" | "0" | "f" => false,
            _ => {
                tracing::warn!(%key, value = %v, "Invalid boolean config value");
                false
            }
        },
    }
}
