//! Conditional HTTP fetching of favicon bytes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use reqwest::Client;
use tracing::{debug, trace};

use crate::config::AcquisitionConfig;
use crate::errors::{AppResult, FetchError, FetchResult};
use crate::models::Validators;

/// What came back from one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Empty unless the status is 200
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }

    /// Only a plain 200 carries an icon worth decoding
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Source of favicon bytes
///
/// Implementations must bound every call by a timeout and report timeouts
/// and transport failures as [`FetchError`]; HTTP error statuses are not
/// errors here, they are returned in [`FetchResponse::status`].
#[async_trait]
pub trait IconFetcher: Send + Sync {
    async fn fetch(&self, url: &str, validators: &Validators) -> FetchResult<FetchResponse>;
}

#[async_trait]
impl<T: IconFetcher + ?Sized> IconFetcher for Arc<T> {
    async fn fetch(&self, url: &str, validators: &Validators) -> FetchResult<FetchResponse> {
        (**self).fetch(url, validators).await
    }
}

/// reqwest-backed fetcher
///
/// The timeout covers the whole exchange, headers and body; on expiry the
/// in-flight request future is dropped, which aborts the connection.
pub struct HttpIconFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpIconFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &AcquisitionConfig) -> AppResult<Self> {
        Self::new(config.request_timeout(), &config.user_agent)
    }

    fn conditional_headers(validators: &Validators) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(etag) = &validators.etag {
            match HeaderValue::from_str(etag) {
                Ok(value) => {
                    headers.insert(IF_NONE_MATCH, value);
                }
                Err(_) => debug!("Ignoring unsendable ETag validator: {:?}", etag),
            }
        }
        if let Some(last_modified) = &validators.last_modified {
            match HeaderValue::from_str(last_modified) {
                Ok(value) => {
                    headers.insert(IF_MODIFIED_SINCE, value);
                }
                Err(_) => debug!("Ignoring unsendable Last-Modified validator: {:?}", last_modified),
            }
        }
        headers
    }

    async fn exchange(&self, url: &str, validators: &Validators) -> FetchResult<FetchResponse> {
        let response = self
            .client
            .get(url)
            .headers(Self::conditional_headers(validators))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status().as_u16();
        let headers = response.headers();
        let etag = header_string(headers, ETAG);
        let last_modified = header_string(headers, LAST_MODIFIED);
        let content_type = header_string(headers, CONTENT_TYPE);
        let declared_length = response.content_length();

        let body = if status == 200 {
            response
                .bytes()
                .await
                .map_err(|e| classify_reqwest_error(url, e))?
                .to_vec()
        } else {
            Vec::new()
        };

        let content_length = if body.is_empty() {
            declared_length
        } else {
            Some(body.len() as u64)
        };

        trace!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(FetchResponse {
            status,
            etag,
            last_modified,
            content_type,
            content_length,
            body,
        })
    }
}

#[async_trait]
impl IconFetcher for HttpIconFetcher {
    async fn fetch(&self, url: &str, validators: &Validators) -> FetchResult<FetchResponse> {
        match tokio::time::timeout(self.timeout, self.exchange(url, validators)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::timeout(url)),
        }
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn classify_reqwest_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::timeout(url)
    } else {
        FetchError::network(url, error.to_string())
    }
}
