//! HTTP plumbing for a BrAPI v2 server using [`reqwest`].

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::envelope::{DataResult, Envelope, SearchAccepted};

/// Records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Polls of a pending asynchronous search before giving up.
const SEARCH_POLL_ATTEMPTS: u32 = 30;

const SEARCH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Client for a single BrAPI v2 server.
#[derive(Clone)]
pub struct BrapiClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    page_size: u32,
}

/// Errors from the BrAPI REST layer.
#[derive(Debug, thiserror::Error)]
pub enum BrapiClientError {
    /// The HTTP request itself failed (network, DNS, TLS, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("BrAPI API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// An asynchronous search never produced results.
    #[error("Search {search_id} on {entity} did not complete")]
    SearchPending { entity: String, search_id: String },
}

impl BrapiClient {
    /// Create a client for a BrAPI server.
    ///
    /// * `api_url` - Base URL including the version prefix, e.g.
    ///   `https://brapi.example.org/brapi/v2`.
    /// * `token` - Bearer token sent with every request, if any.
    pub fn new(api_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Run a search and collect every page of results.
    ///
    /// `POST /search/{entity}` answers either with results (`200`) or with a
    /// `searchResultsDbId` (`202`) whose pages are then fetched from
    /// `GET /search/{entity}/{id}`.
    pub async fn search<T: DeserializeOwned>(
        &self,
        entity: &str,
        criteria: Map<String, Value>,
    ) -> Result<Vec<T>, BrapiClientError> {
        let mut records = Vec::new();
        let mut search_id: Option<String> = None;
        let mut page = 0;

        loop {
            let envelope: Envelope<DataResult<T>> = match &search_id {
                Some(id) => self.search_results(entity, id, page).await?,
                None => {
                    let mut body = criteria.clone();
                    body.insert("page".to_string(), Value::from(page));
                    body.insert("pageSize".to_string(), Value::from(self.page_size));
                    let response = self
                        .request(Method::POST, &format!("search/{entity}"))
                        .json(&body)
                        .send()
                        .await?;

                    if response.status() == StatusCode::ACCEPTED {
                        let accepted: Envelope<SearchAccepted> =
                            Self::parse_response(response).await?;
                        let id = accepted.result.search_results_db_id;
                        tracing::debug!(entity, search_id = %id, "BrAPI search accepted");
                        let envelope = self.search_results(entity, &id, page).await?;
                        search_id = Some(id);
                        envelope
                    } else {
                        Self::parse_response(response).await?
                    }
                }
            };

            let more = envelope.has_more(page);
            let fetched = envelope.result.data.len();
            records.extend(envelope.result.data);
            if !more || fetched == 0 {
                break;
            }
            page += 1;
        }

        tracing::debug!(entity, records = records.len(), "BrAPI search complete");
        Ok(records)
    }

    /// Create records with `POST /{entity}`. The server echoes them back with
    /// db ids assigned, in request order.
    pub async fn create<T>(&self, entity: &str, items: &[T]) -> Result<Vec<T>, BrapiClientError>
    where
        T: Serialize + DeserializeOwned,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .request(Method::POST, entity)
            .json(items)
            .send()
            .await?;
        let envelope: Envelope<DataResult<T>> = Self::parse_response(response).await?;
        tracing::debug!(entity, created = envelope.result.data.len(), "BrAPI records created");
        Ok(envelope.result.data)
    }

    /// Replace records with `PUT /{entity}`, keyed by db id.
    pub async fn update<T>(
        &self,
        entity: &str,
        items: Map<String, Value>,
    ) -> Result<Vec<T>, BrapiClientError>
    where
        T: DeserializeOwned,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .request(Method::PUT, entity)
            .json(&items)
            .send()
            .await?;
        let envelope: Envelope<DataResult<T>> = Self::parse_response(response).await?;
        Ok(envelope.result.data)
    }

    // ---- private helpers ----

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.api_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fetch one page of an asynchronous search, waiting while the server
    /// still reports it as pending.
    async fn search_results<T: DeserializeOwned>(
        &self,
        entity: &str,
        search_id: &str,
        page: u32,
    ) -> Result<Envelope<DataResult<T>>, BrapiClientError> {
        for _ in 0..SEARCH_POLL_ATTEMPTS {
            let response = self
                .request(Method::GET, &format!("search/{entity}/{search_id}"))
                .query(&[("page", page), ("pageSize", self.page_size)])
                .send()
                .await?;
            if response.status() != StatusCode::ACCEPTED {
                return Self::parse_response(response).await;
            }
            tokio::time::sleep(SEARCH_POLL_INTERVAL).await;
        }
        Err(BrapiClientError::SearchPending {
            entity: entity.to_string(),
            search_id: search_id.to_string(),
        })
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`BrapiClientError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BrapiClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BrapiClientError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BrapiClientError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = BrapiClient::new("http://localhost:8080/brapi/v2/", None);
        assert_eq!(client.api_url(), "http://localhost:8080/brapi/v2");
    }

    #[test]
    fn blank_token_is_ignored() {
        let client = BrapiClient::new("http://localhost", Some(String::new()));
        assert!(client.token.is_none());
    }

    #[test]
    fn page_size_is_at_least_one() {
        let client = BrapiClient::new("http://localhost", None).with_page_size(0);
        assert_eq!(client.page_size, 1);
    }
}
