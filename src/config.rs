//! Configuration management

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::CachePaths;
use crate::engine::EngineConfig;
use crate::nominatim::NominatimConfig;
use crate::osrm::OsrmConfig;

#[derive(Debug, Error)]
#[error("environment variable {name} has invalid value {value:?}")]
pub struct ConfigError {
    pub name: &'static str,
    pub value: String,
}

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub osrm: OsrmConfig,
    pub nominatim: NominatimConfig,
}

impl AppConfig {
    /// Load configuration from environment variables, after a `.env` file if
    /// one is present. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("OSRM_URL") {
            config.osrm.base_url = url;
        }
        if let Some(profile) = lookup("OSRM_PROFILE") {
            config.osrm.profile = profile;
        }
        if let Some(url) = lookup("NOMINATIM_URL") {
            config.nominatim.base_url = url;
        }
        if let Some(agent) = lookup("NOMINATIM_USER_AGENT") {
            config.nominatim.user_agent = agent;
        }
        if let Some(secs) = parse(&lookup, "HTTP_TIMEOUT_SECS")? {
            config.osrm.timeout_secs = secs;
            config.nominatim.timeout_secs = secs;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, "RATE_LIMIT_DELAY_MS")? {
            config.engine.rate_limit_delay = Duration::from_millis(ms);
        }
        if let Some(seed) = parse(&lookup, "AUGMENT_SEED")? {
            config.engine.seed = seed;
        }
        if let Some(region) = lookup("GEOCODE_REGION") {
            config.engine.geocode_region = region;
        }

        let defaults = CachePaths::default();
        config.engine.cache_paths = CachePaths::new(
            lookup("GEOCODE_CACHE_PATH").unwrap_or_else(|| defaults.geocode.display().to_string()),
            lookup("ROUTE_CACHE_PATH").unwrap_or_else(|| defaults.route.display().to_string()),
        );

        Ok(config)
    }
}

fn parse<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError { name, value }),
    }
}
