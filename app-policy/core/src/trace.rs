//! Audit trace entries recording which rule decided a verdict.

use crate::{Action, RuleDir};
use std::fmt;

/// The tier name recorded for rules that belong to profiles.
pub const PROFILE_TIER: &str = "__PROFILE__";

/// The name recorded when no profile matched a flow.
pub const NO_MATCH: &str = "__NO_MATCH__";

/// Identifies the rule (or the synthetic end-of-tier marker) that decided a flow.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RuleId {
    pub tier: String,
    pub name: String,
    pub namespace: String,
    pub ordinal: Ordinal,
    pub direction: RuleDir,
    pub action: Action,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ordinal {
    /// The zero-based position of a rule within its policy or profile.
    Rule(usize),
    /// The tier's default action was applied.
    EndOfTier,
}

// === impl RuleId ===

impl RuleId {
    pub fn policy_rule(
        tier: &str,
        name: &str,
        namespace: &str,
        index: usize,
        direction: RuleDir,
        action: Action,
    ) -> Self {
        Self {
            tier: tier.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            ordinal: Ordinal::Rule(index),
            direction,
            action,
        }
    }

    pub fn end_of_tier(tier: &str, name: &str, namespace: &str, direction: RuleDir) -> Self {
        Self {
            tier: tier.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            ordinal: Ordinal::EndOfTier,
            direction,
            action: Action::Deny,
        }
    }

    pub fn profile_rule(name: &str, index: usize, direction: RuleDir, action: Action) -> Self {
        Self::policy_rule(PROFILE_TIER, name, "", index, direction, action)
    }

    /// The marker recorded when every profile was exhausted without a match.
    pub fn profile_no_match(direction: RuleDir) -> Self {
        Self::end_of_tier(PROFILE_TIER, NO_MATCH, "", direction)
    }

    pub fn is_end_of_tier(&self) -> bool {
        self.ordinal == Ordinal::EndOfTier
    }
}

/// Renders as `tier|name|ordinal|action`, with namespaced names as `namespace/name`.
impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|", self.tier)?;
        if !self.namespace.is_empty() {
            write!(f, "{}/", self.namespace)?;
        }
        write!(f, "{}|{}|{}", self.name, self.ordinal, self.action)
    }
}

// === impl Ordinal ===

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(i) => i.fmt(f),
            Self::EndOfTier => "-1".fmt(f),
        }
    }
}
