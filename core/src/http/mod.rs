pub mod client;
pub mod security_headers;

pub use client::HttpClient;
pub use security_headers::{missing_security_headers, SecurityHeader};

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use url::Url;

/// Represents an HTTP request with all its components.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: String) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url, HeaderMap::new(), String::new())
    }

    /// POST with an `application/x-www-form-urlencoded` body.
    pub fn form_post(url: Url, body: String) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        Self::new(Method::POST, url, headers, body)
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    /// Final URL after any followed redirects.
    pub url: String,
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed_ms: u128,
}

impl ProbeResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// How `HttpClient::fetch` treats transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Retry network errors and 429/5xx answers. For passive crawl fetches.
    Automatic,
    /// Single attempt, answer returned whatever its status. For injection
    /// requests, which may have side effects.
    Suppressed,
}

/// 429 and the 5xx codes that usually clear up on their own.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}
