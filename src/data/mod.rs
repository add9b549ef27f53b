//! Data models and API clients for Stockfolio
//!
//! This module contains the types returned by the market-data provider, the
//! prediction service and the application backend, plus the clients that
//! fetch them. Every cached read goes through [`crate::cache::CacheManager`].

pub mod backend;
pub mod market;
pub mod portfolio;
pub mod prediction;

pub use backend::{BackendClient, BackendError};
pub use market::{MarketClient, MarketError};
pub use portfolio::PortfolioService;
pub use prediction::{PredictionClient, PredictionError};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A symbol matching a search query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub stock_exchange: Option<String>,
    #[serde(default)]
    pub exchange_short_name: Option<String>,
}

/// A single dividend payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dividend {
    /// Ex-dividend date
    pub date: NaiveDate,
    #[serde(default)]
    pub label: Option<String>,
    /// Split-adjusted amount per share
    #[serde(default)]
    pub adj_dividend: Option<f64>,
    /// Amount per share as declared
    #[serde(default)]
    pub dividend: Option<f64>,
    #[serde(default)]
    pub record_date: Option<String>,
    #[serde(default)]
    pub payment_date: Option<String>,
    #[serde(default)]
    pub declaration_date: Option<String>,
}

/// Company profile as reported by the market-data provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default, rename = "mktCap")]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub last_div: Option<f64>,
    #[serde(default)]
    pub beta: Option<f64>,
}

/// Current quote for one symbol, used to compare holdings side by side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    /// Change over the last session, in percent
    #[serde(default)]
    pub changes_percentage: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub pe: Option<f64>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub year_high: Option<f64>,
    #[serde(default)]
    pub year_low: Option<f64>,
}

/// A stock held in the user's portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub symbol: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub purchase: Option<f64>,
    #[serde(default)]
    pub last_div: Option<f64>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

/// A stock record managed through the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub id: i64,
    pub symbol: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub purchase: f64,
    #[serde(default)]
    pub last_div: f64,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub market_cap: f64,
}

/// Field used to order stock listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StockSortBy {
    #[default]
    Symbol,
    CompanyName,
}

impl StockSortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockSortBy::Symbol => "symbol",
            StockSortBy::CompanyName => "companyName",
        }
    }
}

/// Filters and paging for listing stocks
#[derive(Debug, Clone, PartialEq)]
pub struct StockQuery {
    pub symbol: String,
    pub company_name: String,
    pub sort_by: StockSortBy,
    pub descending: bool,
    /// 1-based page number
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for StockQuery {
    fn default() -> Self {
        Self {
            symbol: String::new(),
            company_name: String::new(),
            sort_by: StockSortBy::Symbol,
            descending: false,
            page_number: 1,
            page_size: 5,
        }
    }
}

/// Fields sent when creating or updating a stock record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockForm {
    pub symbol: String,
    pub company_name: String,
    pub purchase: f64,
    pub last_div: f64,
    pub industry: String,
    pub market_cap: f64,
}

/// Fields sent when creating or updating a note
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteForm {
    pub title: String,
    pub content: String,
    /// Comma-separated attachment paths already stored by the file service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// A note attached to a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_on: Option<NaiveDateTime>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
}

/// A portfolio holding merged with its cached market data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub item: PortfolioItem,
    /// Latest price from the company profile, if it could be loaded
    pub price: Option<f64>,
    /// Recent dividends, oldest first; empty if they could not be loaded
    pub dividends: Vec<Dividend>,
}

/// The user's portfolio with market data attached to every holding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioOverview {
    pub holdings: Vec<Holding>,
}

impl PortfolioOverview {
    /// Sum of the known prices of all holdings
    pub fn total_value(&self) -> f64 {
        self.holdings.iter().filter_map(|h| h.price).sum()
    }
}

/// Extracts a human-readable message from an error response body
///
/// APIs report failures as `{"message": "..."}`; anything else is returned
/// trimmed as-is.
pub(crate) fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Percent-encodes a value for use as a single URL path segment
pub(crate) fn encode_path_segment(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b'.' | b'~') {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}
