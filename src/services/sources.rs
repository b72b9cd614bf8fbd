//! Shared HTTP plumbing for the public data sources.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot build HTTP client: {0}")]
    Client(String),

    #[error("{source_name} request failed: {message}")]
    Request {
        source_name: &'static str,
        message: String,
    },

    #[error("{source_name} returned HTTP {status}")]
    Status {
        source_name: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("{source_name} JSON parse error: {message}")]
    Decode {
        source_name: &'static str,
        message: String,
    },
}

/// Build the client every source request goes through. Each request is
/// bounded by `timeout`.
pub fn http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, SourceError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .map_err(|e| SourceError::Client(format!("Invalid User-Agent: {}", e)))?,
    );
    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Client(e.to_string()))
}

/// GET `url` with `query` and decode the JSON body.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    source_name: &'static str,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, SourceError> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| SourceError::Request {
            source_name,
            message: e.to_string(),
        })?;

    if !response.status().is_success() {
        return Err(SourceError::Status {
            source_name,
            status: response.status(),
        });
    }

    response.json().await.map_err(|e| SourceError::Decode {
        source_name,
        message: e.to_string(),
    })
}
