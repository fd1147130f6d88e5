use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;

use crate::backoff::ExponentialBackoff;
use crate::error::{ExtractError, Result};

pub const DEFAULT_CLIENT_NAME: &str = "1";
pub const DEFAULT_CLIENT_VERSION: &str = "2.20200422.04.00";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// The transport capability the extraction core depends on.
///
/// A `body` turns the request into a form-encoded POST.
#[async_trait(?Send)]
pub trait Fetch {
    async fn fetch(&self, url: &str, body: Option<&[u8]>) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub client_name: String,
    pub client_version: String,
    pub user_agent: String,
    /// Pause before every request.
    pub delay_ms: u64,
    /// Retries for connect errors, timeouts, 429 and 5xx.
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            delay_ms: 500,
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Cookie-persisting HTTP client speaking to www.youtube.com.
pub struct HttpClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US"),
        );
        headers.insert(
            HeaderName::from_static("x-youtube-client-name"),
            header_value(&config.client_name)?,
        );
        headers.insert(
            HeaderName::from_static("x-youtube-client-version"),
            header_value(&config.client_version)?,
        );

        let client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| ExtractError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    async fn delay(&self) {
        if self.config.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
        }
    }

    async fn send(&self, url: &str, body: Option<&[u8]>) -> reqwest::Result<reqwest::Response> {
        let request = match body {
            Some(body) => self
                .client
                .post(url)
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body.to_vec()),
            None => self.client.get(url),
        };
        request.send().await
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ExtractError::HttpError(format!("Invalid header value {:?}: {}", value, e)))
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait(?Send)]
impl Fetch for HttpClient {
    async fn fetch(&self, url: &str, body: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_millis(self.config.backoff_base_ms),
            MAX_BACKOFF,
            self.config.max_retries,
        );

        loop {
            self.delay().await;
            log::debug!("{} {}", if body.is_some() { "POST" } else { "GET" }, url);

            let failure = match self.send(url, body).await {
                Ok(response) if response.status().is_success() => {
                    let bytes = response.bytes().await.map_err(|e| {
                        ExtractError::HttpError(format!("Failed to read response from {}: {}", url, e))
                    })?;
                    return Ok(bytes.to_vec());
                }
                Ok(response) => {
                    let status = response.status();
                    if !is_transient(status) || !backoff.should_retry() {
                        if status == StatusCode::TOO_MANY_REQUESTS {
                            return Err(ExtractError::RateLimited(url.to_string()));
                        }
                        return Err(ExtractError::HttpError(format!(
                            "HTTP {}: {} ({})",
                            status.as_u16(),
                            status.canonical_reason().unwrap_or("Unknown error"),
                            url
                        )));
                    }
                    format!("HTTP {}", status.as_u16())
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && backoff.should_retry() => e.to_string(),
                Err(e) => {
                    return Err(ExtractError::HttpError(format!("Failed to fetch {}: {}", url, e)));
                }
            };

            let wait = backoff.next_delay();
            log::warn!(
                "{} from {}, retry {} in {:?}",
                failure,
                url,
                backoff.attempt_count(),
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }
}
