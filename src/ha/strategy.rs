//! Endpoint selection strategies.

use std::fmt;
use std::str::FromStr;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::info;

use super::registry::{parse_endpoint_list, EndpointRegistry};
use crate::error::ConfigError;

/// How a connection picks its endpoint from a load-balanced URL list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum LbStrategy {
    /// Cycle through the list in configured order.
    RoundRobin,
    /// Shuffle the list once, then cycle through it.
    #[default]
    ShuffledRoundRobin,
    /// Pick uniformly at random on every call.
    Random,
}

impl LbStrategy {
    /// Configuration name of the strategy.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LbStrategy::RoundRobin => "round_robin",
            LbStrategy::ShuffledRoundRobin => "shuffled_round_robin",
            LbStrategy::Random => "random",
        }
    }

    /// Select an endpoint from `lb_urls`.
    ///
    /// # Arguments
    ///
    /// * `registry` - Rotation state shared by the connections that balance together
    /// * `lb_urls` - Comma separated endpoint list
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `lb_urls` is empty or malformed.
    pub fn select(self, registry: &EndpointRegistry, lb_urls: &str) -> Result<String, ConfigError> {
        let url = match self {
            LbStrategy::RoundRobin => registry.next_url(self, lb_urls, |urls| urls)?,
            LbStrategy::ShuffledRoundRobin => registry.next_url(self, lb_urls, |mut urls| {
                urls.shuffle(&mut rand::thread_rng());
                urls
            })?,
            LbStrategy::Random => parse_endpoint_list(lb_urls)?
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or(ConfigError::EmptyEndpointList)?,
        };
        info!(strategy = %self, url = %url, "Selected URL");
        Ok(url)
    }
}

impl fmt::Display for LbStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LbStrategy {
    type Err = ConfigError;

    /// Accepts the configuration names as well as the strategy class names
    /// used by other drivers, e.g. `RoundRobinLBStrategy`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let simple = s.trim().rsplit('.').next().unwrap_or_default();
        match simple.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "roundrobin" | "roundrobinlbstrategy" => Ok(LbStrategy::RoundRobin),
            "shuffledroundrobin" | "shuffledroundrobinlbstrategy" => {
                Ok(LbStrategy::ShuffledRoundRobin)
            }
            "random" | "randomselectorlbstrategy" => Ok(LbStrategy::Random),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

impl TryFrom<String> for LbStrategy {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
