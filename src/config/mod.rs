//! Configuration types for the NationBuilder client.

use crate::auth::Authenticator;
use crate::errors::{NationBuilderError, NationBuilderResult};
use crate::logging::DEFAULT_LOG_LEVEL;
use crate::pagination::PaginationStyle;
use crate::request::resource_pattern;
use secrecy::SecretString;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

/// Placeholder for the nation slug in [`DEFAULT_BASE_URL_FORMAT`].
pub const SLUG_PLACEHOLDER: &str = "{slug}";

/// Default base URL template.
pub const DEFAULT_BASE_URL_FORMAT: &str = "https://{slug}.nationbuilder.com";

/// Default API version.
pub const DEFAULT_API_VERSION: &str = "v1";

/// Default name of the query parameter carrying the access token.
pub const DEFAULT_API_KEY_PARAMETER: &str = "access_token";

/// Key the payload is nested under unless overridden.
pub const DEFAULT_RESULTS_KEY: &str = "results";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "integrations-nationbuilder/0.1.0";

/// How the client authenticates its requests.
#[derive(Debug, Clone)]
pub enum ClientAuth {
    /// Use the authenticator's current credential.
    Authenticator(Authenticator),
    /// Use a static API key (test token).
    ApiKey(SecretString),
}

/// NationBuilder client configuration.
#[derive(Debug, Clone)]
pub struct NationBuilderConfig {
    /// Nation slug, the tenant part of the host name.
    pub nation_slug: String,
    /// Base URL template containing [`SLUG_PLACEHOLDER`].
    pub base_url_format: String,
    /// Explicit base URL. Only honoured with [`ClientAuth::ApiKey`].
    pub base_url: Option<String>,
    /// API version path segment.
    pub api_version: String,
    /// Authentication.
    pub auth: Option<ClientAuth>,
    /// Query parameter name for the access token.
    pub api_key_parameter: String,
    /// Pagination scheme of list endpoints.
    pub pagination_style: PaginationStyle,
    /// Results keys by resource pattern, e.g. `people/:id` to `person`.
    pub results_key_overrides: BTreeMap<String, String>,
    /// Statuses that count as success with an empty body.
    pub successful_empty_statuses: BTreeSet<u16>,
    /// Request timeout.
    pub timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
    /// Log level of the client's components.
    pub log_level: LevelFilter,
}

impl Default for NationBuilderConfig {
    fn default() -> Self {
        Self {
            nation_slug: String::new(),
            base_url_format: DEFAULT_BASE_URL_FORMAT.to_string(),
            base_url: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            auth: None,
            api_key_parameter: DEFAULT_API_KEY_PARAMETER.to_string(),
            pagination_style: PaginationStyle::default(),
            results_key_overrides: BTreeMap::new(),
            successful_empty_statuses: [204].into_iter().collect(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_level: DEFAULT_LOG_LEVEL,
        }
    }
}

impl NationBuilderConfig {
    /// Creates a new configuration builder.
    pub fn builder(nation_slug: impl Into<String>) -> NationBuilderConfigBuilder {
        NationBuilderConfigBuilder::new(nation_slug)
    }

    /// Creates configuration from environment variables.
    ///
    /// Reads `NATIONBUILDER_NATION_SLUG` and `NATIONBUILDER_API_KEY` (both required),
    /// plus the optional `NATIONBUILDER_BASE_URL_FORMAT` and `NATIONBUILDER_API_VERSION`.
    pub fn from_env() -> NationBuilderResult<Self> {
        let slug = std::env::var("NATIONBUILDER_NATION_SLUG").map_err(|_| {
            NationBuilderError::configuration("NATIONBUILDER_NATION_SLUG is not set")
        })?;
        let api_key = std::env::var("NATIONBUILDER_API_KEY")
            .map_err(|_| NationBuilderError::configuration("NATIONBUILDER_API_KEY is not set"))?;

        let mut builder = NationBuilderConfigBuilder::new(slug).api_key(api_key);
        if let Ok(format) = std::env::var("NATIONBUILDER_BASE_URL_FORMAT") {
            builder = builder.base_url_format(format);
        }
        if let Ok(version) = std::env::var("NATIONBUILDER_API_VERSION") {
            builder = builder.api_version(version);
        }
        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> NationBuilderResult<()> {
        if self.nation_slug.is_empty() {
            return Err(NationBuilderError::configuration("Nation slug cannot be empty"));
        }
        if !self
            .nation_slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(NationBuilderError::configuration(format!(
                "Invalid nation slug '{}'",
                self.nation_slug
            )));
        }

        if !self.base_url_format.contains(SLUG_PLACEHOLDER) {
            return Err(NationBuilderError::configuration(format!(
                "Base URL format must contain {}",
                SLUG_PLACEHOLDER
            )));
        }
        let base_url = self.resolved_base_url();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(NationBuilderError::configuration(
                "Base URL must start with http:// or https://",
            ));
        }
        url::Url::parse(&base_url).map_err(|e| {
            NationBuilderError::configuration(format!("Invalid base URL '{}': {}", base_url, e))
                .with_cause(e)
        })?;

        if self.api_version.trim_matches('/').is_empty() {
            return Err(NationBuilderError::configuration("API version cannot be empty"));
        }
        if self.api_key_parameter.is_empty() {
            return Err(NationBuilderError::configuration(
                "API key parameter cannot be empty",
            ));
        }
        if self.user_agent.is_empty() {
            return Err(NationBuilderError::configuration("User-Agent cannot be empty"));
        }
        if self.successful_empty_statuses.iter().any(|s| !(100..=599).contains(s)) {
            return Err(NationBuilderError::configuration(
                "Successful empty statuses must be HTTP status codes",
            ));
        }
        Ok(())
    }

    /// Gets the base URL requests are made against.
    ///
    /// The explicit base URL wins only when authenticating with an API key.
    pub fn resolved_base_url(&self) -> String {
        match (&self.auth, &self.base_url) {
            (Some(ClientAuth::ApiKey(_)), Some(base_url)) => {
                base_url.trim_end_matches('/').to_string()
            }
            _ => self
                .base_url_format
                .replace(SLUG_PLACEHOLDER, &self.nation_slug)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    /// Gets the results key for `sub_path`.
    ///
    /// An override registered for the path's resource pattern wins over
    /// [`DEFAULT_RESULTS_KEY`].
    pub fn results_key_for(&self, sub_path: &str) -> &str {
        self.results_key_overrides
            .get(&resource_pattern(sub_path))
            .map(String::as_str)
            .unwrap_or(DEFAULT_RESULTS_KEY)
    }
}

/// Builder for NationBuilderConfig.
#[derive(Debug)]
pub struct NationBuilderConfigBuilder {
    config: NationBuilderConfig,
}

impl NationBuilderConfigBuilder {
    /// Creates a new builder for a nation.
    pub fn new(nation_slug: impl Into<String>) -> Self {
        Self {
            config: NationBuilderConfig {
                nation_slug: nation_slug.into(),
                ..Default::default()
            },
        }
    }

    /// Sets the base URL template.
    pub fn base_url_format(mut self, format: impl Into<String>) -> Self {
        self.config.base_url_format = format.into();
        self
    }

    /// Sets an explicit base URL, used together with an API key.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Sets the API version.
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    /// Authenticates with an authenticator's credential.
    pub fn authenticator(mut self, authenticator: Authenticator) -> Self {
        self.config.auth = Some(ClientAuth::Authenticator(authenticator));
        self
    }

    /// Authenticates with a static API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.auth = Some(ClientAuth::ApiKey(SecretString::new(key.into())));
        self
    }

    /// Sets the access token query parameter name.
    pub fn api_key_parameter(mut self, name: impl Into<String>) -> Self {
        self.config.api_key_parameter = name.into();
        self
    }

    /// Sets the pagination scheme.
    pub fn pagination_style(mut self, style: PaginationStyle) -> Self {
        self.config.pagination_style = style;
        self
    }

    /// Uses page-number pagination.
    pub fn legacy_pagination(self) -> Self {
        self.pagination_style(PaginationStyle::Legacy)
    }

    /// Registers a results key for a resource pattern such as `people/:id`.
    pub fn results_key_override(mut self, pattern: impl Into<String>, key: impl Into<String>) -> Self {
        self.config
            .results_key_overrides
            .insert(resource_pattern(&pattern.into()), key.into());
        self
    }

    /// Adds a status that counts as success with an empty body.
    pub fn successful_empty_status(mut self, status: u16) -> Self {
        self.config.successful_empty_statuses.insert(status);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Sets the log level.
    pub fn log_level(mut self, level: LevelFilter) -> Self {
        self.config.log_level = level;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> NationBuilderResult<NationBuilderConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
