//! Process configuration loaded from environment variables.
//!
//! - `SPY_CATS_HOST` / `SPY_CATS_PORT` - Listen address (default `127.0.0.1:8000`)
//! - `SPY_CATS_DATABASE` - SQLite file (default: platform data directory)
//! - `SPY_CATS_BREEDS_URL` - Breed catalog base URL (default: TheCatAPI)
//! - `SPY_CATS_BREEDS_API_KEY` - Breed catalog key, sent as `x-api-key` (optional)
//! - `SPY_CATS_BREEDS_TIMEOUT_SECS` - Breed catalog request timeout (default 10)
//! - `SPY_CATS_CORS_ORIGINS` - Allowed CORS origins, comma-separated (default: any)

use std::path::PathBuf;
use std::time::Duration;

/// Default breed catalog.
pub const DEFAULT_BREEDS_URL: &str = "https://api.thecatapi.com/v1";

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BREEDS_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Database file. `None` uses the platform data directory.
    pub database: Option<PathBuf>,
    pub breeds: BreedCatalogConfig,
    /// Allowed CORS origins. `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

/// Where and how to reach the breed catalog.
#[derive(Debug, Clone)]
pub struct BreedCatalogConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for BreedCatalogConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BREEDS_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_BREEDS_TIMEOUT_SECS),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: None,
            breeds: BreedCatalogConfig::default(),
            cors_origins: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = lookup("SPY_CATS_PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let timeout = lookup("SPY_CATS_BREEDS_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.breeds.timeout);

        let cors_origins = lookup("SPY_CATS_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            host: lookup("SPY_CATS_HOST").unwrap_or(defaults.host),
            port,
            database: lookup("SPY_CATS_DATABASE").map(PathBuf::from),
            breeds: BreedCatalogConfig {
                url: lookup("SPY_CATS_BREEDS_URL").unwrap_or(defaults.breeds.url),
                api_key: lookup("SPY_CATS_BREEDS_API_KEY").filter(|k| !k.is_empty()),
                timeout,
            },
            cors_origins,
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
