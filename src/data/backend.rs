//! Application backend client
//!
//! Talks to the portfolio backend for the user's holdings, stock records and
//! notes. These calls are authenticated with a bearer token and are never
//! cached.

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::{api_message, encode_path_segment, Note, NoteForm, PortfolioItem, Stock, StockForm, StockQuery};

/// Errors that can occur when talking to the backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// No bearer token was configured
    #[error("Not signed in: no API token configured")]
    MissingToken,

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The backend answered with a non-success status
    #[error("Backend returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Client for the portfolio backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    http_client: Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    /// Lists the holdings in the user's portfolio
    pub async fn list_portfolio(&self) -> Result<Vec<PortfolioItem>, BackendError> {
        let request = self.request(reqwest::Method::GET, "/api/portfolio")?;
        let items: Option<Vec<PortfolioItem>> = self.send_json(request).await?;
        Ok(items.unwrap_or_default())
    }

    /// Adds a symbol to the user's portfolio
    pub async fn add_to_portfolio(&self, symbol: &str) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::POST, "/api/portfolio/")?
            .query(&[("symbol", symbol)])
            .json(&serde_json::json!({}));
        self.send(request).await.map(|_| ())
    }

    /// Removes a symbol from the user's portfolio
    pub async fn remove_from_portfolio(&self, symbol: &str) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::DELETE, "/api/portfolio/")?
            .query(&[("symbol", symbol)]);
        self.send(request).await.map(|_| ())
    }

    /// Lists stock records matching the query
    pub async fn list_stocks(&self, query: &StockQuery) -> Result<Vec<Stock>, BackendError> {
        let page_number = query.page_number.to_string();
        let page_size = query.page_size.to_string();
        let request = self.request(reqwest::Method::GET, "/api/stock")?.query(&[
            ("Symbol", query.symbol.as_str()),
            ("CompanyName", query.company_name.as_str()),
            ("SortBy", query.sort_by.as_str()),
            ("IsDescending", bool_param(query.descending)),
            ("PageNumber", page_number.as_str()),
            ("PageSize", page_size.as_str()),
        ]);
        let stocks: Option<Vec<Stock>> = self.send_json(request).await?;
        Ok(stocks.unwrap_or_default())
    }

    /// Fetches one stock record
    pub async fn get_stock(&self, id: i64) -> Result<Stock, BackendError> {
        let request = self.request(reqwest::Method::GET, &format!("/api/stock/{}", id))?;
        self.send_json(request).await
    }

    /// Creates a stock record
    pub async fn create_stock(&self, stock: &StockForm) -> Result<(), BackendError> {
        let request = self.request(reqwest::Method::POST, "/api/stock")?.json(stock);
        self.send(request).await.map(|_| ())
    }

    /// Replaces the fields of an existing stock record
    pub async fn update_stock(&self, id: i64, stock: &StockForm) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::PUT, &format!("/api/stock/{}", id))?
            .json(stock);
        self.send(request).await.map(|_| ())
    }

    pub async fn delete_stock(&self, id: i64) -> Result<(), BackendError> {
        let request = self.request(reqwest::Method::DELETE, &format!("/api/stock/{}", id))?;
        self.send(request).await.map(|_| ())
    }

    /// Lists the notes attached to a symbol
    pub async fn list_notes(&self, symbol: &str, descending: bool) -> Result<Vec<Note>, BackendError> {
        let request = self
            .request(reqwest::Method::GET, "/api/comment")?
            .query(&[("Symbol", symbol), ("IsDescending", bool_param(descending))]);
        let notes: Option<Vec<Note>> = self.send_json(request).await?;
        Ok(notes.unwrap_or_default())
    }

    /// Fetches one note
    pub async fn get_note(&self, id: i64) -> Result<Note, BackendError> {
        let request = self.request(reqwest::Method::GET, &format!("/api/comment/{}", id))?;
        self.send_json(request).await
    }

    /// Attaches a new note to a symbol
    pub async fn create_note(&self, symbol: &str, note: &NoteForm) -> Result<(), BackendError> {
        let path = format!("/api/comment/{}", encode_path_segment(symbol));
        let request = self.request(reqwest::Method::POST, &path)?.json(note);
        self.send(request).await.map(|_| ())
    }

    /// Replaces the title, content and attachments of a note
    pub async fn update_note(&self, id: i64, note: &NoteForm) -> Result<(), BackendError> {
        let request = self
            .request(reqwest::Method::PUT, &format!("/api/comment/{}", id))?
            .json(note);
        self.send(request).await.map(|_| ())
    }

    /// Deletes a note record
    ///
    /// Attachment files live in a separate file service and are not removed.
    pub async fn delete_note(&self, id: i64) -> Result<(), BackendError> {
        let request = self.request(reqwest::Method::DELETE, &format!("/api/comment/{}", id))?;
        self.send(request).await.map(|_| ())
    }

    /// Builds an authenticated request
    fn request(&self, method: reqwest::Method, path: &str) -> Result<RequestBuilder, BackendError> {
        let token = self.token.as_deref().ok_or(BackendError::MissingToken)?;
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        debug!(%method, %url, "Backend request");
        Ok(self.http_client.request(method, url).bearer_auth(token))
    }

    /// Sends a request and returns the body of a successful response
    async fn send(&self, request: RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: api_message(&text),
            });
        }

        Ok(text)
    }

    /// Sends a request and decodes the JSON body; an empty body reads as `null`
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let text = self.send(request).await?;
        let body = if text.trim().is_empty() { "null" } else { text.as_str() };
        Ok(serde_json::from_str(body)?)
    }
}

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
