//! HTTP probing of vocabulary IDs
//!
//! Two fetch paths share one client and rate limiter:
//!
//! - [`Prober::probe`] - the hot path. One GET with a short timeout, the
//!   status code classified into a [`ProbeOutcome`]. Never retries and never
//!   fails; every failure mode collapses into [`ProbeStatus::Error`] so the
//!   pipeline keeps moving.
//! - [`Prober::fetch_page`] - the moderation path. Fetches the full page body
//!   with a longer timeout, retries with exponential backoff, and decodes
//!   windows-1251 responses (klavogonki serves legacy-encoded pages).

use encoding_rs::{UTF_8, WINDOWS_1251};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT},
    Client, Response,
};
use std::num::NonZeroU32;
use std::time::Duration;

use crate::config::Config;
use crate::error::FetchError;
use crate::models::{ProbeOutcome, ProbeStatus, VocabId};

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
];

/// Vocabulary page prober and fetcher
pub struct Prober {
    /// HTTP client; per-request timeouts are set on each call
    client: Client,

    /// Rate limiter shared by probes and page fetches
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// URL prefix; requests go to `{base_url}{id}`
    base_url: String,

    /// Timeout for existence probes
    probe_timeout: Duration,

    /// Timeout for full page fetches
    page_timeout: Duration,

    /// Maximum retry attempts for page fetches
    max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    base_delay_ms: u64,
}

impl Prober {
    /// Create a prober from the scan configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = Client::builder().gzip(true).cookie_store(true).build()?;

        let rate = NonZeroU32::new(config.http.rate_limit)
            .unwrap_or_else(|| NonZeroU32::new(1).expect("1 is non-zero"));
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            base_url: config.scanner.base_url.clone(),
            probe_timeout: config.probe_timeout(),
            page_timeout: config.page_timeout(),
            max_retries: config.http.max_retries,
            base_delay_ms: 1000,
        })
    }

    /// Page URL for a vocabulary ID
    pub fn url_for(&self, id: VocabId) -> String {
        format!("{}{}", self.base_url, id)
    }

    /// Probe one ID for existence.
    ///
    /// 200 maps to Found, 404/403 to Absent, everything else - unexpected
    /// status, timeout, connection failure - to Error. Errors are logged
    /// distinctly but never propagate; the aggregator treats them like Absent.
    pub async fn probe(&self, id: VocabId) -> ProbeOutcome {
        self.rate_limiter.until_ready().await;

        let url = self.url_for(id);
        let request = self
            .client
            .get(&url)
            .headers(self.build_headers())
            .timeout(self.probe_timeout);

        let status = match request.send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let status = ProbeStatus::from_http_status(code);
                if status == ProbeStatus::Error {
                    tracing::warn!(id, code, "unexpected probe status");
                }
                status
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(id, "probe timed out");
                ProbeStatus::Error
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "probe failed");
                ProbeStatus::Error
            }
        };

        ProbeOutcome::new(id, status)
    }

    /// Fetch the full page body for moderation, with retry and backoff
    ///
    /// # Errors
    ///
    /// Returns `FetchError::MaxRetriesExceeded` once all attempts fail, or the
    /// terminal error for non-retryable statuses.
    pub async fn fetch_page(&self, id: VocabId) -> Result<String, FetchError> {
        let url = self.url_for(id);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(self.backoff_delay(attempt))).await;
            }

            self.rate_limiter.until_ready().await;

            let request = self
                .client
                .get(&url)
                .headers(self.build_headers())
                .timeout(self.page_timeout);

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.decode_response(response).await;
                    } else if Self::should_retry(status.as_u16()) {
                        last_error = Some(FetchError::ServerError(status.as_u16()));
                        continue;
                    } else {
                        return Err(FetchError::ServerError(status.as_u16()));
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(FetchError::Timeout);
                    } else {
                        last_error = Some(FetchError::Http(e));
                    }
                }
            }
        }

        tracing::warn!(id, error = ?last_error, "page fetch exhausted retries");
        Err(FetchError::MaxRetriesExceeded)
    }

    /// Exponential backoff delay in milliseconds for retry `attempt` (1-based).
    /// The exponent is capped so oversized retry settings cannot overflow.
    fn backoff_delay(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(1_u64 << attempt.saturating_sub(1).min(10))
    }

    /// Retry on rate-limit and transient server statuses.
    ///
    /// 403 is included: klavogonki intermittently answers 403 to page fetches
    /// that succeed on a later attempt.
    fn should_retry(status: u16) -> bool {
        matches!(status, 403 | 429 | 500 | 502 | 503 | 504)
    }

    /// Decode response body handling both UTF-8 and windows-1251 encodings
    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await?;
        self.decode_bytes(&bytes, &content_type)
    }

    /// Decode bytes to a UTF-8 string with encoding detection
    ///
    /// Strategies, in order: charset from the Content-Type header, plain
    /// UTF-8, windows-1251 fallback, charset from an HTML meta tag.
    pub fn decode_bytes(&self, bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
        let content_type = content_type.to_lowercase();

        if content_type.contains("charset=windows-1251") {
            return decode_windows_1251(bytes);
        }

        if content_type.contains("charset=utf-8") {
            return decode_utf8(bytes);
        }

        if let Ok(text) = decode_utf8(bytes) {
            if !text.starts_with('\u{FFFD}') {
                return Ok(text);
            }
        }

        if let Ok(partial) = std::str::from_utf8(&bytes[..bytes.len().min(1024)]) {
            if partial.to_lowercase().contains("charset=windows-1251") {
                return decode_windows_1251(bytes);
            }
        }

        decode_windows_1251(bytes)
    }

    /// Build request headers with a rotating user agent
    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(self.random_user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
        );

        headers
    }

    /// Get a random user agent from the pool
    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).unwrap_or(&USER_AGENTS[0])
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, FetchError> {
    let (cow, _encoding, had_errors) = UTF_8.decode(bytes);

    if had_errors {
        return Err(FetchError::Decode("UTF-8 decoding errors".to_string()));
    }

    Ok(cow.into_owned())
}

fn decode_windows_1251(bytes: &[u8]) -> Result<String, FetchError> {
    let (cow, _encoding, had_errors) = WINDOWS_1251.decode(bytes);

    if had_errors {
        return Err(FetchError::Decode("windows-1251 decoding errors".to_string()));
    }

    Ok(cow.into_owned())
}
