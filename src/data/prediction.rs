//! Price prediction service client
//!
//! Requests model predictions for a set of symbols in one call. Results are
//! cached for an hour under the comma-joined symbol list.

use reqwest::Client;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

use super::api_message;
use crate::cache::{symbols_key, CacheManager, Clock, FileSlotStore, SlotStore, SystemClock, Ttl, PREDICTIONS_CACHE};

/// Predictions stay fresh for 1 hour
pub const PREDICTIONS_CACHE_TTL: Ttl = Ttl::from_hours(1);

/// Model output keyed by symbol
///
/// The shape of each prediction is owned by the model service, so it is kept
/// as raw JSON.
pub type Predictions = BTreeMap<String, serde_json::Value>;

/// Errors that can occur when fetching predictions
#[derive(Debug, Error)]
pub enum PredictionError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Prediction service returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Client for the prediction service
#[derive(Debug, Clone)]
pub struct PredictionClient<S = FileSlotStore, C = SystemClock> {
    http_client: Client,
    cache: CacheManager<S, C>,
    base_url: String,
}

impl<S: SlotStore, C: Clock> PredictionClient<S, C> {
    pub fn new(cache: CacheManager<S, C>, base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            cache,
            base_url: base_url.into(),
        }
    }

    /// Fetches predictions for all `symbols` in one request
    pub async fn predictions<T: AsRef<str>>(&self, symbols: &[T]) -> Result<Predictions, PredictionError> {
        let key = symbols_key(symbols);
        self.cache
            .get_cached_or_fetch(
                PREDICTIONS_CACHE,
                &key,
                || async {
                    self.fetch_predictions(&key).await.inspect_err(|e| {
                        error!(symbols = %key, error = %e, "Error fetching predictions");
                    })
                },
                PREDICTIONS_CACHE_TTL,
            )
            .await
    }

    async fn fetch_predictions(&self, symbols: &str) -> Result<Predictions, PredictionError> {
        let url = format!("{}/predict-lstm-multi", self.base_url.trim_end_matches('/'));

        let response = self
            .http_client
            .get(&url)
            .query(&[("symbols", symbols)])
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(PredictionError::Api {
                status: status.as_u16(),
                message: api_message(&text),
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemorySlotStore};
    use mockito::Matcher;
    use serde_json::json;

    const T0: i64 = 1_700_000_000_000;

    fn create_test_client(base_url: &str) -> (PredictionClient<MemorySlotStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(T0);
        let cache = CacheManager::with_parts(MemorySlotStore::new(), clock.clone());
        (PredictionClient::new(cache, base_url), clock)
    }

    #[tokio::test]
    async fn test_predictions_cached_for_an_hour() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/predict-lstm-multi")
            .match_query(Matcher::UrlEncoded("symbols".into(), "AAPL,MSFT".into()))
            .with_status(200)
            .with_body(r#"{"AAPL": {"next_close": 192.1}, "MSFT": {"next_close": 412.3}}"#)
            .expect(2)
            .create_async()
            .await;

        let (client, clock) = create_test_client(&server.url());

        let predictions = client.predictions(&["AAPL", "MSFT"]).await.unwrap();
        assert_eq!(predictions["AAPL"], json!({"next_close": 192.1}));
        assert!(client.cache.peek(PREDICTIONS_CACHE, "AAPL,MSFT").is_some());

        clock.advance(30 * 60 * 1000);
        let cached = client.predictions(&["AAPL", "MSFT"]).await.unwrap();
        assert_eq!(cached, predictions);

        clock.advance(31 * 60 * 1000);
        client.predictions(&["AAPL", "MSFT"]).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_symbol_order_is_part_of_the_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/predict-lstm-multi")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("{}")
            .expect(2)
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        client.predictions(&["AAPL", "MSFT"]).await.unwrap();
        client.predictions(&["MSFT", "AAPL"]).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_service_failure_propagates() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/predict-lstm-multi")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("model loading")
            .create_async()
            .await;

        let (client, _clock) = create_test_client(&server.url());

        match client.predictions(&["AAPL"]).await {
            Err(PredictionError::Api { status, message }) => {
                assert_eq!(status, 503);
                assert_eq!(message, "model loading");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
        assert!(client.cache.entries(PREDICTIONS_CACHE).is_empty());
    }
}
