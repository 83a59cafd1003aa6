use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, REFERER};

use crate::error::{RadarError, Result};

// The ranking page rejects obvious bots, so look like a desktop browser.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_ZH: &str = "zh-CN,zh;q=0.9";

/// Bounded retries with linearly growing pauses.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Pause after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(800),
        }
    }
}

pub struct Fetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl Fetcher {
    pub fn new(timeout: Duration, referer: &str, retry: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_ZH));
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer)
                .map_err(|e| RadarError::config(format!("invalid referer {referer:?}: {e}")))?,
        );

        // Accept-Encoding is left to reqwest so gzip bodies are decoded transparently.
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .build()?;

        Ok(Fetcher { client, retry })
    }

    /// GET `url` and return the body as text, retrying on any failure.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!("Fetched {} bytes from {url} on attempt {attempt}", body.len());
                    return Ok(body);
                }
                Err(e) if attempt < attempts => {
                    warn!("Fetching {url} failed (attempt {attempt}/{attempts}): {e}");
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("Fetching {url} failed (attempt {attempt}/{attempts}): {e}");
                    return Err(RadarError::FetchExhausted {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }

    async fn fetch_once(&self, url: &str) -> reqwest::Result<String> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}
