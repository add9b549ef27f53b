//! Configuration Module
//!
//! Loads endpoints, credentials and the cache location from environment
//! variables.

use std::env;
use std::path::PathBuf;

const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_MARKET_URL: &str = "https://financialmodelingprep.com";
const DEFAULT_PREDICT_URL: &str = "http://localhost:8000";

/// Client configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base URL of the portfolio backend
    pub api_url: String,
    /// Base URL of the market-data API
    pub market_url: String,
    /// API key sent to the market-data API
    pub market_api_key: String,
    /// Base URL of the prediction service
    pub predict_url: String,
    /// Bearer token for the portfolio backend
    pub token: Option<String>,
    /// Overrides the XDG cache directory
    pub cache_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `STOCKFOLIO_API_URL` - Portfolio backend (default: http://localhost:5000)
    /// - `STOCKFOLIO_MARKET_URL` - Market-data API (default: https://financialmodelingprep.com)
    /// - `STOCKFOLIO_MARKET_KEY` - Market-data API key (default: empty)
    /// - `STOCKFOLIO_PREDICT_URL` - Prediction service (default: http://localhost:8000)
    /// - `STOCKFOLIO_TOKEN` - Backend bearer token (default: none)
    /// - `STOCKFOLIO_CACHE_DIR` - Cache directory (default: XDG cache dir)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            api_url: var("STOCKFOLIO_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            market_url: var("STOCKFOLIO_MARKET_URL").unwrap_or_else(|| DEFAULT_MARKET_URL.to_string()),
            market_api_key: var("STOCKFOLIO_MARKET_KEY").unwrap_or_default(),
            predict_url: var("STOCKFOLIO_PREDICT_URL").unwrap_or_else(|| DEFAULT_PREDICT_URL.to_string()),
            token: var("STOCKFOLIO_TOKEN"),
            cache_dir: var("STOCKFOLIO_CACHE_DIR").map(PathBuf::from),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
