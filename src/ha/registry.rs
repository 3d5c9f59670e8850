//! Shared rotation state for client-side load balancing.

use dashmap::DashMap;

use super::strategy::LbStrategy;
use crate::error::ConfigError;

/// Separator between endpoints of a load-balanced URL list.
pub const URL_SEPARATOR: char = ',';

#[derive(Debug)]
struct SelectorState {
    urls: Vec<String>,
    next: usize,
}

/// Rotation state of every URL list seen so far, per strategy.
///
/// Lists are keyed by their literal configuration string. Share one registry
/// (behind an `Arc`) between all connections that should rotate together.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    states: DashMap<(LbStrategy, String), SelectorState>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of URL lists with rotation state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Current rotation order of a list, if it has been used with `strategy`.
    #[must_use]
    pub fn rotation(&self, strategy: LbStrategy, lb_urls: &str) -> Option<Vec<String>> {
        self.states
            .get(&(strategy, lb_urls.to_string()))
            .map(|state| state.urls.clone())
    }

    /// Return the next URL of the rotation for `lb_urls` and advance it.
    ///
    /// On first use the parsed list is passed through `arrange` to fix the
    /// rotation order. Reading and advancing happen under the entry lock.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `lb_urls` is empty or malformed.
    pub(crate) fn next_url<F>(
        &self,
        strategy: LbStrategy,
        lb_urls: &str,
        arrange: F,
    ) -> Result<String, ConfigError>
    where
        F: FnOnce(Vec<String>) -> Vec<String>,
    {
        let urls = parse_endpoint_list(lb_urls)?;
        let mut state = self
            .states
            .entry((strategy, lb_urls.to_string()))
            .or_insert_with(|| SelectorState {
                urls: arrange(urls),
                next: 0,
            });

        let url = state
            .urls
            .get(state.next)
            .cloned()
            .ok_or(ConfigError::EmptyEndpointList)?;
        state.next = (state.next + 1) % state.urls.len();
        Ok(url)
    }
}

/// Split a comma separated URL list.
///
/// # Errors
///
/// Returns `ConfigError::EmptyEndpointList` for a blank list and
/// `ConfigError::MalformedEndpointList` if any element is blank.
pub fn parse_endpoint_list(lb_urls: &str) -> Result<Vec<String>, ConfigError> {
    if lb_urls.trim().is_empty() {
        return Err(ConfigError::EmptyEndpointList);
    }
    lb_urls
        .split(URL_SEPARATOR)
        .map(|url| {
            let url = url.trim();
            if url.is_empty() {
                Err(ConfigError::MalformedEndpointList(lb_urls.to_string()))
            } else {
                Ok(url.to_string())
            }
        })
        .collect()
}
