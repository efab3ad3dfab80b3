//! Immutable startup configuration for the CSRF core.
//!
//! The configuration is constructed once, validated, and passed by reference
//! to each component at construction. Validation failures here are fatal;
//! nothing in this module is downgraded to a per-request error.

use std::collections::HashSet;
use std::env;

use thiserror::Error;

use crate::policy::PageRule;

const DEFAULT_TOKEN_NAME: &str = "OWASP-CSRFTOKEN";
const DEFAULT_TOKEN_LENGTH: usize = 32;
const DEFAULT_TOLERANCE_SECONDS: u64 = 2;
const DEFAULT_STORE_TYPE: &str = "memory";

/// The minimum the token length knob accepts.
const MIN_TOKEN_LENGTH: usize = 4;

const HTTP_METHODS: [&str; 9] = [
    "GET", "HEAD", "POST", "PUT", "DELETE", "CONNECT", "OPTIONS", "TRACE", "PATCH",
];

#[derive(Debug, Error, Clone)]
pub enum ConfigError {
    #[error(
        "The token length cannot be less than {MIN_TOKEN_LENGTH} characters, got {0}. The recommended default value is {DEFAULT_TOKEN_LENGTH}"
    )]
    TokenLength(usize),

    #[error("The {0} HTTP method(s) cannot be both protected and unprotected")]
    MethodOverlap(String),

    #[error("Unknown HTTP method in configuration: {0}")]
    InvalidMethod(String),

    #[error("Invalid page rule: {0}")]
    InvalidPattern(String),

    #[error("At least one action to execute on validation failure must be configured")]
    NoActions,
}

/// One configured response to a validation failure: a name plus an ordered
/// parameter list. Owned by configuration, consumed read-only by the engine's
/// callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    name: String,
    parameters: Vec<(String, String)>,
}

impl ActionRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Immutable configuration value for the whole core.
#[derive(Debug, Clone)]
pub struct CsrfConfig {
    pub enabled: bool,
    pub token_name: String,
    pub token_length: usize,
    pub rotate: bool,
    pub token_per_page: bool,
    pub token_per_page_precreate: bool,
    pub validate_when_no_session: bool,
    pub domain_origin: Option<String>,
    pub tolerance_seconds: u64,
    pub prng_algorithm: Option<String>,
    pub prng_provider: Option<String>,
    pub protect_by_default: bool,
    pub banned_user_agents: Vec<String>,
    pub new_token_landing_page: Option<String>,
    pub context_path: String,
    pub ajax_enabled: bool,
    pub force_synchronous_ajax: bool,
    pub print_config: bool,
    pub actions: Vec<ActionRecord>,
    pub token_store_type: String,
    pub token_store_url: Option<String>,

    pub(crate) protected_pages: Vec<PageRule>,
    pub(crate) unprotected_pages: Vec<PageRule>,
    pub(crate) protected_methods: HashSet<String>,
    pub(crate) unprotected_methods: HashSet<String>,
}

impl CsrfConfig {
    pub fn builder() -> CsrfConfigBuilder {
        CsrfConfigBuilder::default()
    }

    /// Build a configuration from `CSRF_*` environment variables, loading a
    /// `.env` file first when one is present.
    ///
    /// Missing or unparsable scalar values fall back to their defaults; rule
    /// and method lists are comma-separated; per-action parameters are read
    /// from `CSRF_ACTION_<NAME>_<PARAM>` keys.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut builder = Self::builder()
            .enabled(env_bool("CSRF_ENABLED", true))
            .token_name(env_string("CSRF_TOKEN_NAME", DEFAULT_TOKEN_NAME))
            .token_length(env_usize("CSRF_TOKEN_LENGTH", DEFAULT_TOKEN_LENGTH))
            .rotate(env_bool("CSRF_ROTATE", false))
            .token_per_page(env_bool("CSRF_TOKEN_PER_PAGE", false))
            .token_per_page_precreate(env_bool("CSRF_TOKEN_PER_PAGE_PRECREATE", false))
            .validate_when_no_session(env_bool("CSRF_VALIDATE_WHEN_NO_SESSION_EXISTS", false))
            .tolerance_seconds(env_u64(
                "CSRF_TOKEN_TOLERANCE_SECONDS",
                DEFAULT_TOLERANCE_SECONDS,
            ))
            .protect_by_default(env_bool("CSRF_PROTECT_BY_DEFAULT", true))
            .protected_pages(env_list("CSRF_PROTECTED_PAGES"))
            .unprotected_pages(env_list("CSRF_UNPROTECTED_PAGES"))
            .protected_methods(env_list("CSRF_PROTECTED_METHODS"))
            .unprotected_methods(env_list("CSRF_UNPROTECTED_METHODS"))
            .banned_user_agents(env_list("CSRF_BANNED_USER_AGENTS"))
            .context_path(env_string("CSRF_CONTEXT_PATH", ""))
            .ajax_enabled(env_bool("CSRF_AJAX_ENABLED", true))
            .force_synchronous_ajax(env_bool("CSRF_FORCE_SYNCHRONOUS_AJAX", false))
            .print_config(env_bool("CSRF_PRINT_CONFIG", false))
            .token_store_type(env_string("CSRF_TOKEN_STORE_TYPE", DEFAULT_STORE_TYPE));

        if let Some(origin) = env_opt("CSRF_DOMAIN_ORIGIN") {
            builder = builder.domain_origin(origin);
        }
        if let Some(page) = env_opt("CSRF_NEW_TOKEN_LANDING_PAGE") {
            builder = builder.new_token_landing_page(page);
        }
        if let Some(algorithm) = env_opt("CSRF_PRNG") {
            builder = builder.prng_algorithm(algorithm);
        }
        if let Some(provider) = env_opt("CSRF_PRNG_PROVIDER") {
            builder = builder.prng_provider(provider);
        }
        if let Some(url) = env_opt("CSRF_TOKEN_STORE_URL") {
            builder = builder.token_store_url(url);
        }

        let action_names = env_list("CSRF_ACTIONS");
        if !action_names.is_empty() {
            builder = builder.actions(action_names.iter().map(|name| action_from_env(name)));
        }

        builder.build()
    }

    /// True when a dedicated landing page absorbs first-touch requests.
    pub fn use_new_token_landing_page(&self) -> bool {
        self.new_token_landing_page.is_some()
    }

    pub(crate) fn log(&self) {
        tracing::info!(
            enabled = self.enabled,
            token_name = %self.token_name,
            token_length = self.token_length,
            rotate = self.rotate,
            token_per_page = self.token_per_page,
            token_per_page_precreate = self.token_per_page_precreate,
            validate_when_no_session = self.validate_when_no_session,
            protect_by_default = self.protect_by_default,
            tolerance_seconds = self.tolerance_seconds,
            protected_pages = self.protected_pages.len(),
            unprotected_pages = self.unprotected_pages.len(),
            actions = self.actions.len(),
            token_store_type = %self.token_store_type,
            "Effective CSRF configuration"
        );
    }
}

/// Builds per-action parameters by scanning the environment for
/// `CSRF_ACTION_<NAME>_<PARAM>` keys, mirroring how the property-file layout
/// attaches parameters to named actions.
fn action_from_env(name: &str) -> ActionRecord {
    let prefix = format!("CSRF_ACTION_{}_", name.to_ascii_uppercase());
    let mut action = ActionRecord::new(name);

    let mut params: Vec<(String, String)> = env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(&prefix)
                .map(|param| (param.to_ascii_lowercase(), value))
        })
        .collect();
    params.sort();

    for (param, value) in params {
        action = action.with_parameter(param, value);
    }
    action
}

pub struct CsrfConfigBuilder {
    enabled: bool,
    token_name: String,
    token_length: usize,
    rotate: bool,
    token_per_page: bool,
    token_per_page_precreate: bool,
    validate_when_no_session: bool,
    domain_origin: Option<String>,
    tolerance_seconds: u64,
    prng_algorithm: Option<String>,
    prng_provider: Option<String>,
    protect_by_default: bool,
    protected_pages: Vec<String>,
    unprotected_pages: Vec<String>,
    protected_methods: Vec<String>,
    unprotected_methods: Vec<String>,
    banned_user_agents: Vec<String>,
    new_token_landing_page: Option<String>,
    context_path: String,
    ajax_enabled: bool,
    force_synchronous_ajax: bool,
    print_config: bool,
    actions: Vec<ActionRecord>,
    token_store_type: String,
    token_store_url: Option<String>,
}

impl Default for CsrfConfigBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            token_name: DEFAULT_TOKEN_NAME.to_string(),
            token_length: DEFAULT_TOKEN_LENGTH,
            rotate: false,
            token_per_page: false,
            token_per_page_precreate: false,
            validate_when_no_session: false,
            domain_origin: None,
            tolerance_seconds: DEFAULT_TOLERANCE_SECONDS,
            prng_algorithm: None,
            prng_provider: None,
            protect_by_default: true,
            protected_pages: Vec::new(),
            unprotected_pages: Vec::new(),
            protected_methods: Vec::new(),
            unprotected_methods: Vec::new(),
            banned_user_agents: Vec::new(),
            new_token_landing_page: None,
            context_path: String::new(),
            ajax_enabled: true,
            force_synchronous_ajax: false,
            print_config: false,
            actions: vec![ActionRecord::new("log")],
            token_store_type: DEFAULT_STORE_TYPE.to_string(),
            token_store_url: None,
        }
    }
}

impl CsrfConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = name.into();
        self
    }

    pub fn token_length(mut self, length: usize) -> Self {
        self.token_length = length;
        self
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.rotate = rotate;
        self
    }

    pub fn token_per_page(mut self, enabled: bool) -> Self {
        self.token_per_page = enabled;
        self
    }

    pub fn token_per_page_precreate(mut self, enabled: bool) -> Self {
        self.token_per_page_precreate = enabled;
        self
    }

    pub fn validate_when_no_session(mut self, enabled: bool) -> Self {
        self.validate_when_no_session = enabled;
        self
    }

    pub fn domain_origin(mut self, origin: impl Into<String>) -> Self {
        self.domain_origin = Some(origin.into());
        self
    }

    pub fn tolerance_seconds(mut self, seconds: u64) -> Self {
        self.tolerance_seconds = seconds;
        self
    }

    pub fn prng_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.prng_algorithm = Some(algorithm.into());
        self
    }

    pub fn prng_provider(mut self, provider: impl Into<String>) -> Self {
        self.prng_provider = Some(provider.into());
        self
    }

    pub fn protect_by_default(mut self, enabled: bool) -> Self {
        self.protect_by_default = enabled;
        self
    }

    pub fn protected_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_pages = pages.into_iter().map(Into::into).collect();
        self
    }

    pub fn unprotected_pages<I, S>(mut self, pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unprotected_pages = pages.into_iter().map(Into::into).collect();
        self
    }

    pub fn protected_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn unprotected_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unprotected_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn banned_user_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.banned_user_agents = agents.into_iter().map(Into::into).collect();
        self
    }

    pub fn new_token_landing_page(mut self, page: impl Into<String>) -> Self {
        self.new_token_landing_page = Some(page.into());
        self
    }

    pub fn context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = path.into();
        self
    }

    pub fn ajax_enabled(mut self, enabled: bool) -> Self {
        self.ajax_enabled = enabled;
        self
    }

    pub fn force_synchronous_ajax(mut self, enabled: bool) -> Self {
        self.force_synchronous_ajax = enabled;
        self
    }

    pub fn print_config(mut self, enabled: bool) -> Self {
        self.print_config = enabled;
        self
    }

    pub fn actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = ActionRecord>,
    {
        self.actions = actions.into_iter().collect();
        self
    }

    pub fn token_store_type(mut self, store_type: impl Into<String>) -> Self {
        self.token_store_type = store_type.into();
        self
    }

    pub fn token_store_url(mut self, url: impl Into<String>) -> Self {
        self.token_store_url = Some(url.into());
        self
    }

    /// Validate and freeze the configuration. Every error here aborts
    /// initialization.
    pub fn build(self) -> Result<CsrfConfig, ConfigError> {
        if self.token_length < MIN_TOKEN_LENGTH {
            return Err(ConfigError::TokenLength(self.token_length));
        }

        let protected_methods = parse_methods(&self.protected_methods)?;
        let unprotected_methods = parse_methods(&self.unprotected_methods)?;

        let overlap: Vec<&str> = protected_methods
            .intersection(&unprotected_methods)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            return Err(ConfigError::MethodOverlap(overlap.join(", ")));
        }

        if self.actions.is_empty() {
            return Err(ConfigError::NoActions);
        }

        let protected_pages = parse_pages(&self.protected_pages)?;
        let unprotected_pages = parse_pages(&self.unprotected_pages)?;

        if self.token_per_page {
            for rule in protected_pages.iter().chain(unprotected_pages.iter()) {
                if rule.is_wildcard() {
                    tracing::warn!(
                        "'Extension' and 'partial path wildcard' page rules are approximate with per-page tokens: \
                         every concrete resource under such a rule is assigned its own token. \
                         Consider regular expression rules for large rule sets."
                    );
                    break;
                }
            }
        }

        Ok(CsrfConfig {
            enabled: self.enabled,
            token_name: self.token_name,
            token_length: self.token_length,
            rotate: self.rotate,
            token_per_page: self.token_per_page,
            token_per_page_precreate: self.token_per_page_precreate,
            validate_when_no_session: self.validate_when_no_session,
            domain_origin: self.domain_origin,
            tolerance_seconds: self.tolerance_seconds,
            prng_algorithm: self.prng_algorithm,
            prng_provider: self.prng_provider,
            protect_by_default: self.protect_by_default,
            banned_user_agents: self.banned_user_agents,
            new_token_landing_page: self.new_token_landing_page,
            context_path: self.context_path,
            ajax_enabled: self.ajax_enabled,
            force_synchronous_ajax: self.force_synchronous_ajax,
            print_config: self.print_config,
            actions: self.actions,
            token_store_type: self.token_store_type,
            token_store_url: self.token_store_url,
            protected_pages,
            unprotected_pages,
            protected_methods,
            unprotected_methods,
        })
    }
}

fn parse_methods(methods: &[String]) -> Result<HashSet<String>, ConfigError> {
    let mut set = HashSet::new();
    for method in methods {
        let method = method.trim().to_ascii_uppercase();
        if method.is_empty() {
            continue;
        }
        if !HTTP_METHODS.contains(&method.as_str()) {
            return Err(ConfigError::InvalidMethod(method));
        }
        set.insert(method);
    }
    Ok(set)
}

fn parse_pages(pages: &[String]) -> Result<Vec<PageRule>, ConfigError> {
    pages.iter().map(|page| PageRule::parse(page)).collect()
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).ok().unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_list(name: &str) -> Vec<String> {
    env::var(name)
        .ok()
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
