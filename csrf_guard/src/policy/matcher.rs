use std::collections::HashSet;

use http::Method;

use crate::config::CsrfConfig;

use super::types::{Disposition, PageRule};

/// Decides whether CSRF validation applies to a request, from its path and
/// HTTP method. Rule sets are immutable after construction and safe to read
/// from concurrent evaluations without locking.
pub struct PolicyMatcher {
    protect_by_default: bool,
    context_path: String,
    protected_pages: Vec<PageRule>,
    unprotected_pages: Vec<PageRule>,
    protected_methods: HashSet<String>,
    unprotected_methods: HashSet<String>,
}

impl PolicyMatcher {
    pub(crate) fn new(config: &CsrfConfig) -> Self {
        Self {
            protect_by_default: config.protect_by_default,
            context_path: config.context_path.clone(),
            protected_pages: config.protected_pages.clone(),
            unprotected_pages: config.unprotected_pages.clone(),
            protected_methods: config.protected_methods.clone(),
            unprotected_methods: config.unprotected_methods.clone(),
        }
    }

    /// Classify a request. Method rules take precedence over page rules; the
    /// path axis then protects by default or by allow-list depending on
    /// configuration.
    pub fn classify(&self, path: &str, method: &Method) -> Disposition {
        if self.unprotected_methods.contains(method.as_str()) {
            return Disposition::Unprotected;
        }
        if !self.protected_methods.is_empty() && !self.protected_methods.contains(method.as_str())
        {
            return Disposition::Unprotected;
        }

        let normalized = self.normalize_path(path);
        if self.protect_by_default {
            if Self::matches_any(&self.unprotected_pages, &normalized) {
                Disposition::Unprotected
            } else {
                Disposition::Protected
            }
        } else if Self::matches_any(&self.protected_pages, &normalized) {
            Disposition::Protected
        } else {
            Disposition::Unprotected
        }
    }

    /// Normalize a request path for matching and for page-scope keys: drop
    /// any query component, strip the configured context prefix
    /// (case-insensitively), force a leading `/` and lowercase ASCII.
    pub fn normalize_path(&self, path: &str) -> String {
        let path = path.split(['?', '#']).next().unwrap_or(path);

        let mut normalized = path.to_ascii_lowercase();
        if !self.context_path.is_empty() {
            let context = self.context_path.to_ascii_lowercase();
            // Strip only on a segment boundary: "/app" must not eat into
            // "/application/save".
            if let Some(rest) = normalized.strip_prefix(&context)
                && (rest.is_empty() || rest.starts_with('/'))
            {
                normalized = rest.to_string();
            }
        }
        if !normalized.starts_with('/') {
            normalized.insert(0, '/');
        }
        normalized
    }

    /// Exact protected pages, the only ones precreation can enumerate.
    pub(crate) fn concrete_protected_pages(&self) -> impl Iterator<Item = &str> {
        self.protected_pages.iter().filter_map(|rule| match rule {
            PageRule::Exact(path) => Some(path.as_str()),
            _ => None,
        })
    }

    /// First match wins, in the order: exact rules, wildcard forms, regexes.
    fn matches_any(rules: &[PageRule], normalized_path: &str) -> bool {
        rules
            .iter()
            .filter(|r| r.is_exact())
            .chain(rules.iter().filter(|r| r.is_wildcard()))
            .chain(rules.iter().filter(|r| r.is_regex()))
            .any(|rule| rule.matches(normalized_path))
    }
}
