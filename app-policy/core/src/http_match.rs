use regex::Regex;
use serde::{Deserialize, Serialize};

/// Matches HTTP request attributes.
///
/// Empty method and path lists match any request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpMatch {
    pub methods: Vec<String>,
    pub paths: Vec<PathMatch>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(try_from = "wire::PathMatch", into = "wire::PathMatch")]
pub enum PathMatch {
    Exact(String),
    Prefix(String),
    Regex(Regex),
}

// === impl HttpMatch ===

impl HttpMatch {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.paths.is_empty()
    }

    pub fn matches_method(&self, method: &str) -> bool {
        self.methods.is_empty() || self.methods.iter().any(|m| m == "*" || m == method)
    }

    /// Matches a request path that has already been stripped of its query.
    pub fn matches_path(&self, path: &str) -> bool {
        self.paths.is_empty() || self.paths.iter().any(|p| p.matches(path))
    }
}

// === impl PathMatch ===

impl PartialEq for PathMatch {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(l0), Self::Exact(r0)) => l0 == r0,
            (Self::Prefix(l0), Self::Prefix(r0)) => l0 == r0,
            (Self::Regex(l0), Self::Regex(r0)) => l0.as_str() == r0.as_str(),
            _ => false,
        }
    }
}

impl Eq for PathMatch {}

impl PathMatch {
    pub fn regex(s: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(s)?))
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Regex(re) => re.is_match(path),
        }
    }
}

mod wire {
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Deserialize, Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum PathMatch {
        Exact(String),
        Prefix(String),
        Regex(String),
    }

    impl TryFrom<PathMatch> for super::PathMatch {
        type Error = regex::Error;

        fn try_from(pm: PathMatch) -> Result<Self, Self::Error> {
            match pm {
                PathMatch::Exact(s) => Ok(Self::Exact(s)),
                PathMatch::Prefix(s) => Ok(Self::Prefix(s)),
                PathMatch::Regex(s) => Self::regex(&s),
            }
        }
    }

    impl From<super::PathMatch> for PathMatch {
        fn from(pm: super::PathMatch) -> Self {
            match pm {
                super::PathMatch::Exact(s) => Self::Exact(s),
                super::PathMatch::Prefix(s) => Self::Prefix(s),
                super::PathMatch::Regex(re) => Self::Regex(re.as_str().to_string()),
            }
        }
    }
}
