use async_trait::async_trait;
use linkshelf_core::{FetchError, MetadataFetcher, PageMetadata};
use reqwest::header;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const DEFAULT_USER_AGENT: &str = concat!("linkshelf/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct FetchRequest<'a> {
    url: &'a str,
    /// Milliseconds the service may spend on the page.
    timeout: u64,
}

/// A [`MetadataFetcher`] backed by a remote metadata service.
///
/// Each fetch POSTs `{"url", "timeout"}` as JSON to the configured endpoint
/// and expects `{"title", "description", "image", "siteName", "success"}`.
#[derive(Debug, Clone)]
pub struct HttpMetadataFetcher {
    http: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpMetadataFetcher {
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|e| FetchError::Failure(format!("invalid metadata endpoint '{endpoint}': {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| FetchError::Failure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &reqwest::Url {
        &self.endpoint
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<PageMetadata, FetchError> {
        let start = Instant::now();
        trace!(url, endpoint = %self.endpoint, "requesting page metadata");

        let body = FetchRequest {
            url,
            timeout: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header(header::ACCEPT, "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(timeout)
                } else {
                    FetchError::Failure(format!("metadata request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "metadata service returned an error");
            return Err(FetchError::Failure(format!(
                "metadata service returned HTTP {}",
                status.as_u16()
            )));
        }

        let metadata = response.json::<PageMetadata>().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Malformed(format!("undecodable metadata response: {e}"))
            }
        })?;

        debug!(url, elapsed = ?start.elapsed(), success = metadata.success, "metadata received");
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_endpoint() {
        assert!(matches!(
            HttpMetadataFetcher::new("not a url"),
            Err(FetchError::Failure(_))
        ));
    }

    #[test]
    fn keeps_endpoint() {
        let fetcher = HttpMetadataFetcher::new("http://localhost:8787/metadata").unwrap();
        assert_eq!(fetcher.endpoint().path(), "/metadata");
    }

    #[test]
    fn request_body_uses_milliseconds() {
        let body = FetchRequest {
            url: "https://a.com",
            timeout: 20_000,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"url":"https://a.com","timeout":20000}"#
        );
    }
}
