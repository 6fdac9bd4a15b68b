//! HTTP client for the booking API.
//!
//! `ApiClient` turns JSON GET endpoints into `Fetcher`s, mapping transport
//! and status failures onto `ApiError`. The cache itself never sees HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::ApiError;
use crate::cache::{fetcher_fn, Fetcher};

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Same connection pool, different bearer token
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path` and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "GET");

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &body));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        decode_body(&body)
    }

    /// A `Fetcher` that GETs `path` on every fetch
    pub fn fetcher<T>(&self, path: impl Into<String>) -> impl Fetcher<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let client = self.clone();
        let path = path.into();
        fetcher_fn(move || {
            let client = client.clone();
            let path = path.clone();
            async move { client.get_json::<T>(&path).await }
        })
    }
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_connect() || err.is_timeout() {
        ApiError::Unreachable(err.to_string())
    } else if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
        ApiError::from_status(status.as_u16(), "")
    } else {
        ApiError::Unknown(err.to_string())
    }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        name: String,
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("https://api.example.com/v1/").unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/v1");
        assert_eq!(client.url("/client/profile"), "https://api.example.com/v1/client/profile");
        assert_eq!(client.url("services"), "https://api.example.com/v1/services");
        assert_eq!(client.url("https://other.example/x"), "https://other.example/x");
    }

    #[test]
    fn test_decode_body() {
        let profile: Profile = decode_body(br#"{"name": "Ann"}"#).unwrap();
        assert_eq!(profile, Profile { name: "Ann".to_string() });

        let err = decode_body::<Profile>(b"<html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[test]
    fn test_with_token_keeps_base_url() {
        let client = ApiClient::new("https://api.example.com").unwrap();
        let authed = client.with_token("secret".to_string());
        assert_eq!(authed.base_url(), client.base_url());
        assert!(!format!("{:?}", authed).contains("secret"));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        // Port 9 (discard) is not listening in test environments
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let err = client.get_json::<Profile>("/profile").await.unwrap_err();
        assert!(matches!(err, ApiError::Unreachable(_)), "got {:?}", err);
    }
}
