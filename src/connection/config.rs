//! Connection configuration.
//!
//! A [`ConnectionConfig`] can be built in code, parsed from a connect string,
//! read from `FRAMESTREAM_*` environment variables, or deserialized with serde.
//!
//! # Connect string format
//!
//! ```text
//! [jdbc:<driver>:remote:]key=value;key=value;...
//! ```
//!
//! Recognized keys (case-insensitive):
//!
//! | Key                  | Meaning                                            |
//! |----------------------|----------------------------------------------------|
//! | `url`                | Endpoint used without client-side load balancing   |
//! | `use_client_side_lb` | Pick the endpoint from `lb_urls` (`true`/`false`)  |
//! | `lb_urls`            | Comma separated endpoint list                      |
//! | `lb_strategy`        | `round_robin`, `shuffled_round_robin` or `random`  |
//! | `fetch_size`         | Maximum rows per page                              |
//! | `frame_max_millis`   | Maximum time spent filling one page                |
//! | `prefetch_pages`     | Pages decoded ahead of the consumer                |
//!
//! Unknown keys are ignored.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::frame::{FrameLimiter, FrameLimiters};
use crate::ha::{parse_endpoint_list, EndpointRegistry, LbStrategy};
use crate::query::FetchOptions;
use crate::stream::DEFAULT_PREFETCH_PAGES;

/// Rows per page unless configured otherwise.
pub const DEFAULT_FETCH_SIZE: usize = 100;

/// Prefix of the environment variables read by [`ConnectionConfig::from_env`].
pub const ENV_PREFIX: &str = "FRAMESTREAM_";

const KEYS: [&str; 7] = [
    "url",
    "use_client_side_lb",
    "lb_urls",
    "lb_strategy",
    "fetch_size",
    "frame_max_millis",
    "prefetch_pages",
];

/// Settings for opening a connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Endpoint used when client-side load balancing is off.
    pub url: Option<String>,

    /// Select the endpoint from `lb_urls` (default: false).
    pub use_client_side_lb: bool,

    /// Comma separated endpoints for client-side load balancing (default: empty).
    pub lb_urls: String,

    /// Endpoint selection strategy (default: shuffled round-robin).
    pub lb_strategy: LbStrategy,

    /// Maximum rows per page; `None` for no row bound (default: 100).
    pub fetch_size: Option<usize>,

    /// Maximum milliseconds spent filling one page; `None` for no time bound (default: None).
    pub frame_max_millis: Option<u64>,

    /// Pages decoded ahead of the consumer (default: 8).
    pub prefetch_pages: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: None,
            use_client_side_lb: false,
            lb_urls: String::new(),
            lb_strategy: LbStrategy::default(),
            fetch_size: Some(DEFAULT_FETCH_SIZE),
            frame_max_millis: None,
            prefetch_pages: DEFAULT_PREFETCH_PAGES,
        }
    }
}

impl ConnectionConfig {
    // ========================================================================
    // Builder
    // ========================================================================

    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    #[must_use]
    pub fn use_client_side_lb(mut self, enabled: bool) -> Self {
        self.use_client_side_lb = enabled;
        self
    }

    #[must_use]
    pub fn lb_urls(mut self, urls: impl Into<String>) -> Self {
        self.lb_urls = urls.into();
        self
    }

    #[must_use]
    pub fn lb_strategy(mut self, strategy: LbStrategy) -> Self {
        self.lb_strategy = strategy;
        self
    }

    #[must_use]
    pub fn fetch_size(mut self, rows: Option<usize>) -> Self {
        self.fetch_size = rows;
        self
    }

    #[must_use]
    pub fn frame_max_millis(mut self, millis: Option<u64>) -> Self {
        self.frame_max_millis = millis;
        self
    }

    #[must_use]
    pub fn prefetch_pages(mut self, pages: usize) -> Self {
        self.prefetch_pages = pages;
        self
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    /// Parse a `key=value;...` connect string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for unparseable values and any
    /// error of [`ConnectionConfig::validate`].
    pub fn parse(connect_string: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for part in strip_driver_prefix(connect_string).split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (key, value) = part.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                key: part.to_string(),
                value: String::new(),
            })?;
            config.apply(key.trim(), value.trim())?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Read the configuration from `FRAMESTREAM_*` environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionConfig::parse`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from a variable lookup, using the
    /// `FRAMESTREAM_` prefixed upper-case key names.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionConfig::parse`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        for key in KEYS {
            let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
            if let Some(value) = lookup(&var) {
                config.apply(key, value.trim())?;
            }
        }
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key.to_ascii_lowercase().as_str() {
            "url" => self.url = Some(value.to_string()),
            "use_client_side_lb" => self.use_client_side_lb = parse_bool(value).ok_or_else(invalid)?,
            "lb_urls" => self.lb_urls = value.to_string(),
            "lb_strategy" => self.lb_strategy = value.parse()?,
            "fetch_size" => {
                self.fetch_size = parse_optional(value).map_err(|_| invalid())?;
            }
            "frame_max_millis" => {
                self.frame_max_millis = parse_optional(value).map_err(|_| invalid())?;
            }
            "prefetch_pages" => self.prefetch_pages = value.parse().map_err(|_| invalid())?,
            other => debug!(key = other, "Ignoring unknown connection property"),
        }
        Ok(())
    }

    // ========================================================================
    // Derived settings
    // ========================================================================

    /// Check the settings for consistency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRowCountLimit` for a zero fetch size,
    /// `ConfigError::MissingProperty` if no endpoint is configured, and
    /// endpoint list errors when client-side load balancing is on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_size == Some(0) {
            return Err(ConfigError::InvalidRowCountLimit(0));
        }
        if self.use_client_side_lb {
            parse_endpoint_list(&self.lb_urls)?;
        } else if self.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            return Err(ConfigError::MissingProperty("url".to_string()));
        }
        Ok(())
    }

    /// Endpoint to connect to.
    ///
    /// With client-side load balancing the configured strategy picks from
    /// `lb_urls`, advancing the rotation in `registry`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if no usable endpoint is configured.
    pub fn resolve_url(&self, registry: &EndpointRegistry) -> Result<String, ConfigError> {
        if self.use_client_side_lb {
            return self.lb_strategy.select(registry, &self.lb_urls);
        }
        self.url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingProperty("url".to_string()))
    }

    /// Page limiter for the configured row and time bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidRowCountLimit` for a zero fetch size.
    pub fn frame_limiter(&self) -> Result<Arc<dyn FrameLimiter>, ConfigError> {
        FrameLimiters::from_config(self.fetch_size, self.frame_max_millis)
    }

    #[must_use]
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default().prefetch_pages(self.prefetch_pages)
    }
}

/// Drop a leading `jdbc:<driver>:...:` prefix.
fn strip_driver_prefix(connect_string: &str) -> &str {
    let trimmed = connect_string.trim();
    if !trimmed.starts_with("jdbc:") {
        return trimmed;
    }
    let first_eq = trimmed.find('=').unwrap_or(trimmed.len());
    match trimmed[..first_eq].rfind(':') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Empty values and `none` clear a bound.
fn parse_optional<T: std::str::FromStr>(value: &str) -> Result<Option<T>, T::Err> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    value.parse().map(Some)
}
