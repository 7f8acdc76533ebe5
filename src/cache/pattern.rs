//! Key pattern used by `invalidate`.

use regex::Regex;

use crate::error::Result;

/// Selects the keys removed by an invalidation.
#[derive(Debug, Clone)]
pub enum KeyPattern {
    /// Every key
    All,
    /// Keys containing the given substring
    Substring(String),
    /// Keys matched by the regular expression
    Regex(Regex),
}

impl KeyPattern {
    /// Compiles `pattern` into a regex matcher.
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(KeyPattern::Regex(Regex::new(pattern)?))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::All => true,
            KeyPattern::Substring(needle) => key.contains(needle.as_str()),
            KeyPattern::Regex(re) => re.is_match(key),
        }
    }
}

impl From<&str> for KeyPattern {
    fn from(needle: &str) -> Self {
        KeyPattern::Substring(needle.to_string())
    }
}

impl From<String> for KeyPattern {
    fn from(needle: String) -> Self {
        KeyPattern::Substring(needle)
    }
}

impl From<Regex> for KeyPattern {
    fn from(re: Regex) -> Self {
        KeyPattern::Regex(re)
    }
}
