//! Component name patterns: exact (`Database`), prefix (`Data*`) or any (`*`).

use std::fmt;

/// A parsed component pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentPattern {
    Exact(String),
    Prefix(String),
    Any,
}

impl ComponentPattern {
    /// Parse a pattern. Only a trailing `*` is special.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some("") => ComponentPattern::Any,
            Some(prefix) => ComponentPattern::Prefix(prefix.to_string()),
            None => ComponentPattern::Exact(pattern.to_string()),
        }
    }

    /// Empty input never matches; `Foo*` matches `Foo` itself.
    pub fn matches(&self, input: &str) -> bool {
        if input.is_empty() {
            return false;
        }
        match self {
            ComponentPattern::Exact(name) => name == input,
            ComponentPattern::Prefix(prefix) => input.starts_with(prefix.as_str()),
            ComponentPattern::Any => true,
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, ComponentPattern::Exact(_))
    }
}

impl fmt::Display for ComponentPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentPattern::Exact(name) => f.write_str(name),
            ComponentPattern::Prefix(prefix) => write!(f, "{prefix}*"),
            ComponentPattern::Any => f.write_str("*"),
        }
    }
}

/// Match `input` against a raw pattern string without keeping the parsed form.
pub fn pattern_matches(pattern: &str, input: &str) -> bool {
    if pattern.is_empty() || input.is_empty() {
        return false;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => input.starts_with(prefix),
        None => pattern == input,
    }
}
