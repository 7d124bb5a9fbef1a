//! HttpClient behaviour against a live mock server.

use std::time::Duration;
use url::Url;
use webprobe_core::http::{HttpRequest, RetryPolicy};
use webprobe_core::{AbortSignal, FetchError, HttpClient, RateLimiter};
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(retries: u32) -> HttpClient {
    HttpClient::new(2, None, &[])
        .expect("client")
        .with_retries(retries, Duration::from_millis(10))
}

fn limiter() -> RateLimiter {
    RateLimiter::new(100, Duration::from_secs(1))
}

fn url(server: &MockServer, p: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), p)).unwrap()
}

#[tokio::test]
async fn test_automatic_policy_retries_transient_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let resp = client(2)
        .fetch(&HttpRequest::get(url(&server, "/flaky")), RetryPolicy::Automatic, &limiter(), &AbortSignal::new())
        .await
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "recovered");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_automatic_policy_gives_up_after_retries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let err = client(2)
        .fetch(&HttpRequest::get(url(&server, "/down")), RetryPolicy::Automatic, &limiter(), &AbortSignal::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::TransientStatus { status: 502, .. }));
}

#[tokio::test]
async fn test_suppressed_policy_single_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let req = HttpRequest::form_post(url(&server, "/submit"), "q=%27".to_string());
    let resp = client(3)
        .fetch(&req, RetryPolicy::Suppressed, &limiter(), &AbortSignal::new())
        .await
        .unwrap();

    assert_eq!(resp.status, 500);
    assert_eq!(resp.body, "boom");
}

#[tokio::test]
async fn test_form_post_encoding_and_custom_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(header("x-scan", "webprobe"))
        .and(body_string("user=%27"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(2, None, &[("X-Scan".to_string(), "webprobe".to_string())]).unwrap();
    let req = HttpRequest::form_post(url(&server, "/login"), "user=%27".to_string());
    let resp = client
        .fetch(&req, RetryPolicy::Suppressed, &limiter(), &AbortSignal::new())
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
}

#[tokio::test]
async fn test_response_headers_exposed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("X-Frame-Options", "DENY"))
        .mount(&server)
        .await;

    let resp = client(0)
        .fetch(&HttpRequest::get(url(&server, "/")), RetryPolicy::Automatic, &limiter(), &AbortSignal::new())
        .await
        .unwrap();
    assert_eq!(resp.header("x-frame-options"), Some("DENY"));
}

#[tokio::test]
async fn test_timeout_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(4)))
        .mount(&server)
        .await;

    let client = HttpClient::new(1, None, &[]).unwrap();
    let err = client
        .fetch(&HttpRequest::get(url(&server, "/slow")), RetryPolicy::Suppressed, &limiter(), &AbortSignal::new())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Timeout { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_every_attempt_takes_a_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let limiter = RateLimiter::new(5, Duration::from_secs(60));
    let _ = client(2)
        .fetch(&HttpRequest::get(url(&server, "/")), RetryPolicy::Automatic, &limiter, &AbortSignal::new())
        .await;

    assert!(limiter.available() < 2.1);
}

#[tokio::test]
async fn test_no_request_once_aborted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let limiter = RateLimiter::new(1, Duration::from_secs(60));
    assert!(limiter.try_acquire());

    let abort = AbortSignal::new();
    abort.cancel();
    let err = client(0)
        .fetch(&HttpRequest::get(url(&server, "/")), RetryPolicy::Automatic, &limiter, &abort)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Aborted));
}

#[tokio::test]
async fn test_redirects_followed_only_within_origin() {
    let server = MockServer::start().await;
    let other = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/away"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/landing", other.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&other)
        .await;

    let client = client(0);
    let moved = client
        .fetch(&HttpRequest::get(url(&server, "/old")), RetryPolicy::Automatic, &limiter(), &AbortSignal::new())
        .await
        .unwrap();
    assert_eq!(moved.status, 200);
    assert_eq!(moved.body, "moved here");
    assert!(moved.url.ends_with("/new"));

    let away = client
        .fetch(&HttpRequest::get(url(&server, "/away")), RetryPolicy::Automatic, &limiter(), &AbortSignal::new())
        .await
        .unwrap();
    assert_eq!(away.status, 302);
    assert!(away.url.ends_with("/away"));
}
