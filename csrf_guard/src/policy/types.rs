use regex::Regex;

use crate::config::ConfigError;

/// Whether a request requires CSRF validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Protected,
    Unprotected,
}

/// One configured page rule.
///
/// Descriptor convention, which any client-side mirror of the rules must
/// follow: a descriptor that starts with `^` and ends with `$` is an anchored
/// regular expression; `*.ext` matches by extension; `/prefix/*` matches a
/// path subtree; anything else is an exact normalized path. Literal
/// descriptors are matched case-insensitively against the normalized
/// (lowercased, context-stripped) request path.
#[derive(Debug, Clone)]
pub(crate) enum PageRule {
    Exact(String),
    PathPrefix(String),
    Extension(String),
    Regex(Regex),
}

impl PageRule {
    /// Parse a configured descriptor. An unparsable regex is a fatal
    /// configuration error, never a per-request one.
    pub(crate) fn parse(descriptor: &str) -> Result<Self, ConfigError> {
        let descriptor = descriptor.trim();
        if descriptor.is_empty() {
            return Err(ConfigError::InvalidPattern(
                "Empty page rule descriptor".to_string(),
            ));
        }

        if is_regex_descriptor(descriptor) {
            let regex = Regex::new(descriptor).map_err(|e| {
                ConfigError::InvalidPattern(format!(
                    "Invalid regular expression page rule '{descriptor}': {e}"
                ))
            })?;
            return Ok(PageRule::Regex(regex));
        }

        if let Some(extension) = descriptor.strip_prefix('*') {
            // "*.ext" form; keep the dot so "/a.html" matches "*.html"
            return Ok(PageRule::Extension(extension.to_ascii_lowercase()));
        }

        if let Some(prefix) = descriptor.strip_suffix("/*") {
            let mut prefix = prefix.to_ascii_lowercase();
            if !prefix.starts_with('/') {
                prefix.insert(0, '/');
            }
            return Ok(PageRule::PathPrefix(prefix));
        }

        let mut path = descriptor.to_ascii_lowercase();
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        Ok(PageRule::Exact(path))
    }

    /// Match against a normalized request path.
    pub(crate) fn matches(&self, normalized_path: &str) -> bool {
        match self {
            PageRule::Exact(path) => normalized_path == path,
            PageRule::PathPrefix(prefix) => {
                normalized_path == prefix
                    || normalized_path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/') || prefix == "/")
            }
            PageRule::Extension(extension) => normalized_path.ends_with(extension.as_str()),
            PageRule::Regex(regex) => regex.is_match(normalized_path),
        }
    }

    pub(crate) fn is_exact(&self) -> bool {
        matches!(self, PageRule::Exact(_))
    }

    pub(crate) fn is_wildcard(&self) -> bool {
        matches!(self, PageRule::PathPrefix(_) | PageRule::Extension(_))
    }

    pub(crate) fn is_regex(&self) -> bool {
        matches!(self, PageRule::Regex(_))
    }
}

/// The explicit convention distinguishing a regex descriptor from a literal
/// path: anchored at both ends.
fn is_regex_descriptor(descriptor: &str) -> bool {
    descriptor.starts_with('^') && descriptor.ends_with('$')
}
