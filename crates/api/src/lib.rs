//! Content store client for docflow activities and data providers.
//!
//! This crate provides:
//!
//! - [`ClientSettings`], derived from the execution payload (`studio_url`, `store_url`, token)
//! - [`ContentStoreClient`], a `reqwest` client with bearer auth and a bounded request timeout
//! - [`StoreBackend`], the seam data providers fetch through
//! - [`ApiError`] and [`classify_status`], mapping HTTP failures onto the failure taxonomy
//!
//! # Example
//!
//! ```ignore
//! use docflow_api::{ClientSettings, ContentStoreClient, StoreQuery};
//!
//! let client = ContentStoreClient::new(ClientSettings {
//!     server_url: "https://studio.example.com".into(),
//!     store_url: "https://store.example.com".into(),
//!     api_key: token,
//! })?;
//! let documents = client.find("objects", &StoreQuery::default()).await?;
//! ```

mod error;
mod store;

use std::{env, fmt, time::Duration};

use async_trait::async_trait;
use docflow_types::ActivityFailure;
use reqwest::{Client, Method, header};
use serde_json::Value;
use tracing::debug;
use url::Url;

pub use error::{ApiError, classify_status};
pub use store::{StoreBackend, StoreQuery};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the content store.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Studio (API server) base URL.
    pub server_url: String,
    /// Content store base URL; collection endpoints live under `/api/v1`.
    pub store_url: String,
    pub api_key: String,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("server_url", &self.server_url)
            .field("store_url", &self.store_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Thin wrapper around a configured `reqwest::Client` for content store access.
#[derive(Debug, Clone)]
pub struct ContentStoreClient {
    server_url: Url,
    store_url: Url,
    http: Client,
    user_agent: String,
}

impl ContentStoreClient {
    /// Build a client, validating both base URLs before any request is made.
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let server_url = validate_base_url("config.studio_url", &settings.server_url)?;
        let store_url = validate_base_url("config.store_url", &settings.store_url)?;

        let mut authorization = header::HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|_| ApiError::InvalidToken {
                reason: "contains characters not allowed in a header".into(),
            })?;
        authorization.set_sensitive(true);

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::AUTHORIZATION, authorization);
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ApiError::Client(error.to_string()))?;

        Ok(Self {
            server_url,
            store_url,
            http,
            user_agent: format!("docflow/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    pub fn store_url(&self) -> &Url {
        &self.store_url
    }

    /// Resolve `{store_url}/api/v1/{segments...}`, percent-encoding each segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.store_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl {
                field: "config.store_url",
                url: self.store_url.to_string(),
                reason: "URL cannot be used as a base".into(),
            })?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        Ok(url)
    }

    /// Query a collection.
    pub async fn find(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Value>, ApiError> {
        let url = self.endpoint(&[collection, "find"])?;
        let body = serde_json::to_value(query).map_err(|error| ApiError::decode(url.as_str(), error))?;
        let response = self.send(Method::POST, url.clone(), Some(&body), None).await?;
        let records = extract_records(response).ok_or_else(|| ApiError::decode(url.as_str(), "expected an array of records"))?;
        debug!(collection, count = records.len(), "content store find");
        Ok(records)
    }

    /// Fetch a single record by identifier.
    pub async fn retrieve(&self, collection: &str, id: &str, select: Option<&str>) -> Result<Value, ApiError> {
        let url = self.endpoint(&[collection, id])?;
        self.send(Method::GET, url, None, select).await
    }

    /// Apply a partial update to a record and return the stored result.
    pub async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<Value, ApiError> {
        let url = self.endpoint(&[collection, id])?;
        self.send(Method::PUT, url, Some(patch), None).await
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>, select: Option<&str>) -> Result<Value, ApiError> {
        debug!(%method, %url, "content store request");
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(header::USER_AGENT, &self.user_agent);
        if let Some(select) = select {
            request = request.query(&[("select", select)]);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| ApiError::transport(url.as_str(), error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        response.json::<Value>().await.map_err(|error| ApiError::decode(url.as_str(), error))
    }
}

#[async_trait]
impl StoreBackend for ContentStoreClient {
    async fn find(&self, collection: &str, query: &StoreQuery) -> Result<Vec<Value>, ActivityFailure> {
        Ok(ContentStoreClient::find(self, collection, query).await?)
    }

    async fn retrieve(&self, collection: &str, id: &str, select: Option<&str>) -> Result<Value, ActivityFailure> {
        Ok(ContentStoreClient::retrieve(self, collection, id, select).await?)
    }

    async fn update(&self, collection: &str, id: &str, patch: &Value) -> Result<Value, ActivityFailure> {
        Ok(ContentStoreClient::update(self, collection, id, patch).await?)
    }
}

/// Accept either a bare array or an object wrapping it under `results`.
fn extract_records(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(records) => Some(records),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(records)) => Some(records),
            _ => None,
        },
        _ => None,
    }
}

/// Validate that a base URL is usable: http or https, with a host.
fn validate_base_url(field: &'static str, base: &str) -> Result<Url, ApiError> {
    let invalid = |reason: String| ApiError::InvalidUrl {
        field,
        url: base.to_string(),
        reason,
    };
    let parsed = Url::parse(base).map_err(|error| invalid(error.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("URL must include a host".into()));
    }
    Ok(parsed)
}
