//! Market-data API client
//!
//! Fetches symbol search results, dividend history, company profiles and
//! quotes from a Financial Modeling Prep compatible API. Every read is served
//! through the fetch-through cache, one namespace per kind of data.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{api_message, encode_path_segment, CompanyProfile, Dividend, Quote, SearchResult};
use crate::cache::{
    symbols_key, CacheManager, Clock, FileSlotStore, SlotStore, SystemClock, Ttl,
    COMPANY_PROFILE_CACHE, DIVIDEND_CACHE, PORTFOLIO_COMPARISON_CACHE, SEARCH_CACHE,
};

/// Base URL for the market-data API
const DEFAULT_BASE_URL: &str = "https://financialmodelingprep.com";

/// Maximum number of search results requested
const SEARCH_LIMIT: &str = "100";

/// Number of most recent dividends kept per symbol
const DIVIDEND_HISTORY_LEN: usize = 18;

/// Search results stay fresh for 5 hours
pub const SEARCH_CACHE_TTL: Ttl = Ttl::from_hours(5);

/// Dividend history stays fresh for 5 hours
pub const DIVIDEND_CACHE_TTL: Ttl = Ttl::from_hours(5);

/// Company profiles stay fresh for 5 hours
pub const COMPANY_PROFILE_CACHE_TTL: Ttl = Ttl::from_hours(5);

/// Quote comparisons stay fresh for 1 hour
pub const PORTFOLIO_COMPARISON_CACHE_TTL: Ttl = Ttl::from_hours(1);

/// Errors that can occur when fetching market data
#[derive(Debug, Error)]
pub enum MarketError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Market API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Dividend endpoint response
#[derive(Debug, Deserialize)]
struct DividendHistory {
    #[serde(default)]
    historical: Vec<Dividend>,
}

/// Client for the market-data API
#[derive(Debug, Clone)]
pub struct MarketClient<S = FileSlotStore, C = SystemClock> {
    http_client: Client,
    cache: CacheManager<S, C>,
    base_url: String,
    api_key: String,
}

impl<S: SlotStore, C: Clock> MarketClient<S, C> {
    /// Creates a client for the default API endpoint
    pub fn new(cache: CacheManager<S, C>, api_key: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Points the client at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// The cache this client reads through
    pub fn cache(&self) -> &CacheManager<S, C> {
        &self.cache
    }

    /// Searches symbols and company names
    ///
    /// The query is trimmed before it is sent and used as the cache key, so
    /// `" apple "` and `"apple"` share an entry. An empty query returns no
    /// results without touching the network.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, MarketError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.cache
            .get_cached_or_fetch(
                SEARCH_CACHE,
                query,
                || async {
                    self.get_json("/api/v3/search", &[("query", query), ("limit", SEARCH_LIMIT)])
                        .await
                },
                SEARCH_CACHE_TTL,
            )
            .await
    }

    /// Fetches the most recent dividends for a symbol, oldest first
    pub async fn dividends(&self, symbol: &str) -> Result<Vec<Dividend>, MarketError> {
        self.cache
            .get_cached_or_fetch(
                DIVIDEND_CACHE,
                symbol,
                || async {
                    let path = format!(
                        "/api/v3/historical-price-full/stock_dividend/{}",
                        encode_path_segment(symbol)
                    );
                    let history: DividendHistory = self.get_json(&path, &[]).await?;
                    Ok::<_, MarketError>(recent_dividends(history.historical))
                },
                DIVIDEND_CACHE_TTL,
            )
            .await
    }

    /// Fetches the company profile for a symbol
    ///
    /// Unknown symbols yield an empty profile rather than an error.
    pub async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile, MarketError> {
        self.cache
            .get_cached_or_fetch(
                COMPANY_PROFILE_CACHE,
                symbol,
                || async {
                    let path = format!("/api/v3/profile/{}", encode_path_segment(symbol));
                    let profiles: Vec<CompanyProfile> = self.get_json(&path, &[]).await?;
                    Ok::<_, MarketError>(profiles.into_iter().next().unwrap_or_default())
                },
                COMPANY_PROFILE_CACHE_TTL,
            )
            .await
    }

    /// Fetches current quotes for several symbols at once
    pub async fn compare<T: AsRef<str>>(&self, symbols: &[T]) -> Result<Vec<Quote>, MarketError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let key = symbols_key(symbols);
        self.cache
            .get_cached_or_fetch(
                PORTFOLIO_COMPARISON_CACHE,
                &key,
                || async {
                    let encoded: Vec<String> = symbols
                        .iter()
                        .map(|s| encode_path_segment(s.as_ref()))
                        .collect();
                    let path = format!("/api/v3/quote/{}", encoded.join(","));
                    self.get_json(&path, &[]).await
                },
                PORTFOLIO_COMPARISON_CACHE_TTL,
            )
            .await
    }

    /// Issues a GET request and decodes the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MarketError> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!(%url, "Requesting market data");

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(MarketError::Api {
                status: status.as_u16(),
                message: api_message(&text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Keeps the newest dividends (the API lists newest first) in date order
fn recent_dividends(mut history: Vec<Dividend>) -> Vec<Dividend> {
    history.truncate(DIVIDEND_HISTORY_LEN);
    history.sort_by_key(|d| d.date);
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemorySlotStore};
    use chrono::NaiveDate;
    use mockito::Matcher;

    const T0: i64 = 1_700_000_000_000;

    fn create_test_client(base_url: &str) -> (MarketClient<MemorySlotStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(T0);
        let cache = CacheManager::with_parts(MemorySlotStore::new(), clock.clone());
        let client = MarketClient::new(cache, "test-key").with_base_url(base_url);
        (client, clock)
    }

    fn dividend(date: &str) -> Dividend {
        Dividend {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            label: None,
            adj_dividend: Some(0.25),
            dividend: Some(0.25),
            record_date: None,
            payment_date: None,
            declaration_date: None,
        }
    }

    #[test]
    fn test_recent_dividends_keeps_newest_in_date_order() {
        // API order: newest first
        let history: Vec<Dividend> = (0..24)
            .map(|i| {
                let date = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap() - chrono::Duration::days(30 * i);
                dividend(&date.format("%Y-%m-%d").to_string())
            })
            .collect();
        let newest = history[0].date;
        let oldest_kept = history[DIVIDEND_HISTORY_LEN - 1].date;

        let recent = recent_dividends(history);

        assert_eq!(recent.len(), DIVIDEND_HISTORY_LEN);
        assert_eq!(recent.first().unwrap().date, oldest_kept);
        assert_eq!(recent.last().unwrap().date, newest);
        assert!(recent.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn test_client_defaults() {
        let client = MarketClient::new(CacheManager::in_memory(), "key");
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
        assert_eq!(client.api_key, "key");
    }

    #[tokio::test]
    async fn test_empty_search_skips_network() {
        let (client, _clock) = create_test_client("http://127.0.0.1:9");
        let results = client.search("   ").await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "apple".into()),
                Matcher::UrlEncoded("limit".into(), "100".into()),
                Matcher::UrlEncoded("apikey".into(), "test-key".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"symbol": "AAPL", "name": "Apple Inc.", "currency": "USD", "stockExchange": "NASDAQ", "exchangeShortName": "NASDAQ"}]"#)
            .expect(1)
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        let first = client.search("apple").await.unwrap();
        let second = client.search("apple").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].symbol, "AAPL");
        assert_eq!(first[0].stock_exchange.as_deref(), Some("NASDAQ"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_query_is_trimmed_for_request_and_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/search")
            .match_query(Matcher::UrlEncoded("query".into(), "apple".into()))
            .with_status(200)
            .with_body(r#"[{"symbol": "AAPL"}]"#)
            .expect(1)
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        client.search("  apple ").await.unwrap();
        client.search("apple").await.unwrap();

        assert!(client.cache().peek(SEARCH_CACHE, "apple").is_some());
        assert!(client.cache().peek(SEARCH_CACHE, "  apple ").is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dividends_are_sorted_and_cached_by_symbol() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/historical-price-full/stock_dividend/AAPL")
            .match_query(Matcher::UrlEncoded("apikey".into(), "test-key".into()))
            .with_status(200)
            .with_body(
                r#"{"symbol": "AAPL", "historical": [
                    {"date": "2024-08-12", "dividend": 0.25},
                    {"date": "2024-05-10", "dividend": 0.25},
                    {"date": "2024-02-09", "dividend": 0.24}
                ]}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        let dividends = client.dividends("AAPL").await.unwrap();
        let dates: Vec<String> = dividends.iter().map(|d| d.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-02-09", "2024-05-10", "2024-08-12"]);

        let cached = client.dividends("AAPL").await.unwrap();
        assert_eq!(cached, dividends);
        assert!(client.cache().peek(DIVIDEND_CACHE, "AAPL").is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dividends_for_unknown_symbol_are_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/historical-price-full/stock_dividend/ZZZZ")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        assert!(client.dividends("ZZZZ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_company_profile_takes_first_entry() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/profile/AAPL")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"symbol": "AAPL", "price": 190.5, "companyName": "Apple Inc.", "mktCap": 2950000000000}]"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v3/profile/NONE")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        let profile = client.company_profile("AAPL").await.unwrap();
        assert_eq!(profile.price, Some(190.5));
        assert_eq!(profile.company_name.as_deref(), Some("Apple Inc."));

        let empty = client.company_profile("NONE").await.unwrap();
        assert_eq!(empty, CompanyProfile::default());
    }

    #[tokio::test]
    async fn test_api_error_propagates_and_is_not_cached() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/profile/AAPL")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_body(r#"{"message": "Limit Reach"}"#)
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        match client.company_profile("AAPL").await {
            Err(MarketError::Api { status, message }) => {
                assert_eq!(status, 429);
                assert_eq!(message, "Limit Reach");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
        assert!(client.cache().peek(COMPANY_PROFILE_CACHE, "AAPL").is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/v3/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"Error Message": "Invalid API KEY."}"#)
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        assert!(matches!(client.search("apple").await, Err(MarketError::ParseError(_))));
        assert!(client.cache().entries(SEARCH_CACHE).is_empty());
    }

    #[tokio::test]
    async fn test_compare_keys_by_joined_symbols_and_expires_after_an_hour() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/quote/AAPL,MSFT")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"[{"symbol": "AAPL", "price": 190.5, "changesPercentage": 1.2, "pe": 29.1},
                    {"symbol": "MSFT", "price": 410.0, "changesPercentage": -0.4, "pe": 35.7}]"#,
            )
            .expect(2)
            .create_async()
            .await;

        let (client, clock) = create_test_client(&server.url());

        let quotes = client.compare(&["AAPL", "MSFT"]).await.unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[1].changes_percentage, Some(-0.4));
        assert!(client.cache().peek(PORTFOLIO_COMPARISON_CACHE, "AAPL,MSFT").is_some());

        clock.advance(PORTFOLIO_COMPARISON_CACHE_TTL.as_millis() - 1);
        client.compare(&["AAPL", "MSFT"]).await.unwrap();

        clock.advance(2);
        client.compare(&["AAPL", "MSFT"]).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_compare_with_no_symbols_is_empty() {
        let (client, _clock) = create_test_client("http://127.0.0.1:9");
        let quotes = client.compare::<&str>(&[]).await.unwrap();
        assert!(quotes.is_empty());
    }
}
