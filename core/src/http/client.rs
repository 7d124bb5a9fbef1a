use log::debug;
use rand::prelude::IndexedRandom;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect, Client, ClientBuilder, Proxy};
use std::time::{Duration, Instant};

use super::{is_transient_status, HttpRequest, ProbeResponse, RetryPolicy};
use crate::core::state::AbortSignal;
use crate::core::throttle::RateLimiter;
use crate::error::{FetchError, ScanError};

const MAX_BACKOFF_MS: u64 = 5000;
const MAX_REDIRECTS: usize = 10;

/// Follows redirects only while they stay on the origin of the first request.
/// A hop to another origin is not taken; the 3xx answer itself is returned.
fn same_origin_redirects() -> redirect::Policy {
    redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let leaves_origin = attempt
            .previous()
            .first()
            .map_or(false, |first| first.origin() != attempt.url().origin());
        if leaves_origin {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

/// Outbound HTTP for crawl fetches and injection probes.
///
/// Holds no per-call state beyond reqwest's connection pool, so one instance is
/// shared by every task of a scan.
pub struct HttpClient {
    inner: Client,
    user_agents: Vec<&'static str>,
    default_timeout: Duration,
    default_headers: HeaderMap,
    max_retries: u32,
    retry_backoff: Duration,
}

impl HttpClient {
    pub fn new(
        timeout_seconds: u64,
        proxy_url: Option<&str>,
        custom_headers: &[(String, String)],
    ) -> Result<Self, ScanError> {
        let timeout = Duration::from_secs(timeout_seconds.max(1));

        let mut builder = ClientBuilder::new()
            .timeout(timeout)
            .redirect(same_origin_redirects())
            .danger_accept_invalid_certs(true);

        if let Some(proxy) = proxy_url {
            builder = builder.proxy(Proxy::all(proxy)?);
        }

        let inner = builder.build()?;

        let mut default_headers = HeaderMap::new();
        for (key, val) in custom_headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(val),
            ) {
                default_headers.insert(name, value);
            }
        }
        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) \
             Gecko/20100101 Firefox/120.0",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_0) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
        ];

        Ok(Self {
            inner,
            user_agents,
            default_timeout: timeout,
            default_headers,
            max_retries: 2,
            retry_backoff: Duration::from_millis(250),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, retry_backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = retry_backoff;
        self
    }

    /// One attempt, no admission control. Callers must have taken a token
    /// from the scan's `RateLimiter` first; `fetch` does that for you.
    pub async fn send(&self, req: &HttpRequest) -> Result<ProbeResponse, FetchError> {
        let url = req.url.to_string();
        let mut builder = self.inner.request(req.method.clone(), req.url.as_str());

        for (name, value) in self.default_headers.iter() {
            builder = builder.header(name, value);
        }

        for (name, value) in req.headers.iter() {
            builder = builder.header(name, value);
        }

        if !req.headers.contains_key(reqwest::header::USER_AGENT)
            && !self.default_headers.contains_key(reqwest::header::USER_AGENT)
        {
            builder = builder.header(reqwest::header::USER_AGENT, self.get_random_user_agent());
        }

        if !req.body.is_empty() {
            builder = builder.body(req.body.clone());
        }

        builder = builder.timeout(self.default_timeout);

        let start = Instant::now();
        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;
        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.clone() }
            } else {
                FetchError::Body {
                    url: url.clone(),
                    source: e,
                }
            }
        })?;

        Ok(ProbeResponse {
            url: final_url,
            status,
            headers,
            body,
            elapsed_ms: start.elapsed().as_millis(),
        })
    }

    /// Sends `req`, taking one token from `limiter` before every attempt.
    ///
    /// With `RetryPolicy::Automatic`, network errors and transient statuses are
    /// retried up to `max_retries` times with exponential backoff, and a
    /// transient status that outlives the retries is returned as
    /// `FetchError::TransientStatus`. With `RetryPolicy::Suppressed` the single
    /// answer is returned as-is, whatever its status.
    pub async fn fetch(
        &self,
        req: &HttpRequest,
        policy: RetryPolicy,
        limiter: &RateLimiter,
        abort: &AbortSignal,
    ) -> Result<ProbeResponse, FetchError> {
        let attempts = match policy {
            RetryPolicy::Automatic => self.max_retries + 1,
            RetryPolicy::Suppressed => 1,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            if !limiter.acquire_or_abort(abort).await {
                return Err(FetchError::Aborted);
            }

            let result = match self.send(req).await {
                Ok(resp) if policy == RetryPolicy::Automatic && is_transient_status(resp.status) => {
                    Err(FetchError::TransientStatus {
                        url: resp.url,
                        status: resp.status,
                    })
                }
                other => other,
            };

            match result {
                Err(e) if e.is_retryable() && attempt < attempts && !abort.is_cancelled() => {
                    let delay = self.backoff(attempt);
                    debug!("{} (attempt {}/{}), retrying in {:?}", e, attempt, attempts, delay);
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.retry_backoff.as_millis() as u64;
        let ms = base.saturating_mul(1u64 << (attempt - 1).min(6)).min(MAX_BACKOFF_MS);
        Duration::from_millis(ms)
    }

    fn get_random_user_agent(&self) -> &'static str {
        let mut rng = rand::rng();
        *self.user_agents.choose(&mut rng).unwrap_or(&"Mozilla/5.0")
    }
}
