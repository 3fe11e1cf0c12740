use std::{env, time::Duration};

use crate::datasource::CacheOptions;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether data sources cache reads (default: true)
    pub cache_enabled: bool,
    /// Cache TTL in milliseconds (default: 30,000)
    pub cache_ttl_milliseconds: u64,
    /// Maximum number of cache entries (default: 10,000)
    pub cache_max_entries: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CACHE_ENABLED` - `true`/`false`, `1`/`0` (default: true)
    /// - `CACHE_TTL_MILLISECONDS` - Cache TTL in milliseconds (default: 30,000)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 10,000)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self {
            cache_enabled: env::var("CACHE_ENABLED")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),
            cache_ttl_milliseconds: env::var("CACHE_TTL_MILLISECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30_000),
            cache_max_entries: env::var("CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(10_000),
        }
    }

    /// Get cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_milliseconds)
    }

    /// Cache settings for a new data source, `None` when caching is off.
    pub fn cache_options(&self) -> Option<CacheOptions> {
        self.cache_enabled.then(|| CacheOptions {
            ttl: self.cache_ttl(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(cache_enabled: bool) -> Config {
        Config {
            cache_enabled,
            cache_ttl_milliseconds: 1_500,
            cache_max_entries: 10_000,
        }
    }

    #[test]
    fn test_cache_ttl_conversion() {
        assert_eq!(config(true).cache_ttl(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_cache_options_follow_enabled_flag() {
        assert_eq!(
            config(true).cache_options(),
            Some(CacheOptions::from_millis(1_500))
        );
        assert_eq!(config(false).cache_options(), None);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    // Env vars are process-global, so every env-dependent assertion lives in
    // this one test.
    #[test]
    fn test_from_env() {
        env::remove_var("CACHE_ENABLED");
        env::remove_var("CACHE_TTL_MILLISECONDS");
        env::remove_var("CACHE_MAX_ENTRIES");

        let defaults = Config::from_env();
        assert!(defaults.cache_enabled);
        assert_eq!(defaults.cache_ttl_milliseconds, 30_000);
        assert_eq!(defaults.cache_max_entries, 10_000);

        env::set_var("CACHE_ENABLED", "false");
        env::set_var("CACHE_TTL_MILLISECONDS", "250");
        env::set_var("CACHE_MAX_ENTRIES", "0");

        let custom = Config::from_env();
        assert!(!custom.cache_enabled);
        assert_eq!(custom.cache_ttl(), Duration::from_millis(250));
        assert_eq!(custom.cache_max_entries, 10_000);

        env::remove_var("CACHE_ENABLED");
        env::remove_var("CACHE_TTL_MILLISECONDS");
        env::remove_var("CACHE_MAX_ENTRIES");
    }
}
