use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The action a matched rule applies to a flow.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Allow,
    Deny,
    /// Ends evaluation of the current tier and moves on to the next one.
    Pass,
    /// Records the match and continues with the next rule.
    Log,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid rule action: {0:?}")]
pub struct InvalidAction(pub String);

/// The direction of a flow relative to the endpoint whose policy is evaluated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDir {
    Ingress,
    Egress,
}

// === impl Action ===

impl FromStr for Action {
    type Err = InvalidAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            "pass" | "next-tier" => Ok(Self::Pass),
            "log" => Ok(Self::Log),
            _ => Err(InvalidAction(s.to_string())),
        }
    }
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Pass => "pass",
            Self::Log => "log",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

// === impl RuleDir ===

impl fmt::Display for RuleDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingress => "ingress".fmt(f),
            Self::Egress => "egress".fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        for (input, expected) in [
            ("allow", Action::Allow),
            ("Allow", Action::Allow),
            ("deny", Action::Deny),
            ("Deny", Action::Deny),
            ("pass", Action::Pass),
            ("Pass", Action::Pass),
            ("next-tier", Action::Pass),
            ("log", Action::Log),
            ("LOG", Action::Log),
        ] {
            assert_eq!(input.parse::<Action>(), Ok(expected), "{input}");
        }
    }

    #[test]
    fn rejects_unknown_actions() {
        assert_eq!(
            "no_match".parse::<Action>(),
            Err(InvalidAction("no_match".to_string()))
        );
        assert!("".parse::<Action>().is_err());
    }
}
