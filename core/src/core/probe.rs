//! Injection probing of a single surface, and the passive audits run once per
//! fetched page.
//!
//! Probe strategies and page audits are registered at compile time in a
//! `ProbeRegistry`; adding a class means adding an implementation here.

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::core::mutator;
use crate::core::result_aggregator::{Finding, ScanRecord};
use crate::core::state::AbortSignal;
use crate::core::surface::{Surface, Target};
use crate::core::throttle::RateLimiter;
use crate::core::VulnerabilityClass;
use crate::error::FetchError;
use crate::http::{missing_security_headers, HttpClient, HttpRequest, ProbeResponse, RetryPolicy};
use crate::utils::payload_loader::PayloadCatalog;

/// Session-scoped handles every probe and crawl task works through.
pub struct ProbeContext {
    pub client: Arc<HttpClient>,
    pub limiter: Arc<RateLimiter>,
    pub catalog: Arc<PayloadCatalog>,
    pub abort: AbortSignal,
    pub records: mpsc::Sender<ScanRecord>,
    /// Stop at the first hit per (surface, class).
    pub stop_on_first_match: bool,
}

impl ProbeContext {
    pub async fn record(&self, record: ScanRecord) {
        // The aggregator only stops once every sender is gone, so this cannot
        // fail while `self` is alive.
        let _ = self.records.send(record).await;
    }
}

#[derive(Debug)]
pub enum ProbeOutcome {
    Detected(Vec<Finding>),
    /// Every attempt got an answer and none matched.
    Clean,
    /// No match, and `failures` attempts got no usable answer.
    Inconclusive { failures: usize },
    Aborted,
}

/// Drives every payload of `class` through `surface`.
///
/// Forms are tried field by field, payload by payload; parameters payload by
/// payload. With `stop_on_first_match` the first hit ends probing of the
/// surface, so at most one finding is produced per (surface, class).
/// Injection requests are never retried: a failed attempt is logged and the
/// next payload is tried.
pub async fn probe_surface(ctx: &ProbeContext, surface: &Surface, class: VulnerabilityClass) -> ProbeOutcome {
    let payloads = ctx.catalog.payloads_for(class);
    if payloads.is_empty() {
        return ProbeOutcome::Clean;
    }

    let requests: Vec<(String, HttpRequest)> = match surface {
        Surface::Form(form) => form
            .fields
            .iter()
            .flat_map(|field| {
                payloads
                    .iter()
                    .map(move |p| (p.clone(), mutator::form_request(form, field, p)))
            })
            .collect(),
        Surface::Param(param) => payloads
            .iter()
            .map(|p| (p.clone(), mutator::param_request(param, p)))
            .collect(),
    };

    let mut findings = Vec::new();
    let mut failures = 0;

    for (payload, request) in requests {
        if ctx.abort.is_cancelled() {
            return ProbeOutcome::Aborted;
        }

        let response = match ctx
            .client
            .fetch(&request, RetryPolicy::Suppressed, &ctx.limiter, &ctx.abort)
            .await
        {
            Ok(resp) => resp,
            Err(FetchError::Aborted) => return ProbeOutcome::Aborted,
            Err(e) => {
                debug!("Inconclusive {} attempt on {}: {}", class, surface.describe(), e);
                failures += 1;
                continue;
            }
        };

        if let Some(evidence) = ctx.catalog.evidence(class, &response.body, &payload) {
            findings.push(Finding {
                class,
                surface: Some(surface.clone()),
                payload: Some(payload),
                evidence,
                url: request.url.to_string(),
                method: request.method.to_string(),
                status_code: response.status,
                request_body: if request.body.is_empty() { None } else { Some(request.body) },
                timestamp: Utc::now(),
            });
            if ctx.stop_on_first_match {
                break;
            }
        }
    }

    if !findings.is_empty() {
        ProbeOutcome::Detected(findings)
    } else if failures > 0 {
        ProbeOutcome::Inconclusive { failures }
    } else {
        ProbeOutcome::Clean
    }
}

/// An injection strategy run against each discovered surface.
#[async_trait]
pub trait ProbeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn class(&self) -> VulnerabilityClass;
    async fn run(&self, ctx: &ProbeContext, surface: &Surface) -> ProbeOutcome;
}

pub struct ReflectedInjectionProbe;

#[async_trait]
impl ProbeStrategy for ReflectedInjectionProbe {
    fn name(&self) -> &'static str {
        "reflected-injection"
    }

    fn class(&self) -> VulnerabilityClass {
        VulnerabilityClass::ReflectedInjection
    }

    async fn run(&self, ctx: &ProbeContext, surface: &Surface) -> ProbeOutcome {
        probe_surface(ctx, surface, self.class()).await
    }
}

pub struct DatabaseErrorProbe;

#[async_trait]
impl ProbeStrategy for DatabaseErrorProbe {
    fn name(&self) -> &'static str {
        "database-error"
    }

    fn class(&self) -> VulnerabilityClass {
        VulnerabilityClass::DatabaseError
    }

    async fn run(&self, ctx: &ProbeContext, surface: &Surface) -> ProbeOutcome {
        probe_surface(ctx, surface, self.class()).await
    }
}

/// A passive check over a page response; needs no extra requests.
pub trait PageAudit: Send + Sync {
    fn name(&self) -> &'static str;
    fn audit(&self, page: &Target, response: &ProbeResponse) -> Vec<Finding>;
}

/// One finding per tracked security header the page response lacks.
pub struct HeaderAuditProbe;

impl PageAudit for HeaderAuditProbe {
    fn name(&self) -> &'static str {
        "header-audit"
    }

    fn audit(&self, page: &Target, response: &ProbeResponse) -> Vec<Finding> {
        missing_security_headers(&response.headers)
            .into_iter()
            .map(|header| page_finding(
                VulnerabilityClass::MissingSecurityHeader,
                page,
                response,
                format!("Missing {} header: {}", header.header_name(), header.rationale()),
            ))
            .collect()
    }
}

/// Flags risky inline-script constructs in the page body.
pub struct ScriptAuditProbe;

impl PageAudit for ScriptAuditProbe {
    fn name(&self) -> &'static str {
        "script-audit"
    }

    fn audit(&self, page: &Target, response: &ProbeResponse) -> Vec<Finding> {
        let detector = crate::utils::detector::VulnerabilityDetector::new();
        detector
            .script_signals(&response.body)
            .into_iter()
            .map(|(needle, reason)| page_finding(
                VulnerabilityClass::UnsafeScript,
                page,
                response,
                format!("{} found in page: {}", needle, reason),
            ))
            .collect()
    }
}

fn page_finding(class: VulnerabilityClass, page: &Target, response: &ProbeResponse, evidence: String) -> Finding {
    Finding {
        class,
        surface: None,
        payload: None,
        evidence,
        url: page.to_string(),
        method: "GET".to_string(),
        status_code: response.status,
        request_body: None,
        timestamp: Utc::now(),
    }
}

/// Compile-time set of strategies and audits a scan runs.
#[derive(Clone)]
pub struct ProbeRegistry {
    strategies: Vec<Arc<dyn ProbeStrategy>>,
    audits: Vec<Arc<dyn PageAudit>>,
}

impl Default for ProbeRegistry {
    fn default() -> Self {
        Self::new()
            .with_strategy(ReflectedInjectionProbe)
            .with_strategy(DatabaseErrorProbe)
            .with_audit(HeaderAuditProbe)
            .with_audit(ScriptAuditProbe)
    }
}

impl ProbeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            audits: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl ProbeStrategy + 'static) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn with_audit(mut self, audit: impl PageAudit + 'static) -> Self {
        self.audits.push(Arc::new(audit));
        self
    }

    pub fn strategies(&self) -> &[Arc<dyn ProbeStrategy>] {
        &self.strategies
    }

    pub fn audits(&self) -> &[Arc<dyn PageAudit>] {
        &self.audits
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies
            .iter()
            .map(|s| s.name())
            .chain(self.audits.iter().map(|a| a.name()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    fn response(headers: HeaderMap, body: &str) -> ProbeResponse {
        ProbeResponse {
            url: "http://example.com/".to_string(),
            status: 200,
            headers,
            body: body.to_string(),
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = ProbeRegistry::default();
        assert_eq!(
            registry.names(),
            vec!["reflected-injection", "database-error", "header-audit", "script-audit"]
        );
        assert!(registry.strategies().iter().all(|s| s.class().is_injection()));
    }

    #[test]
    fn test_header_audit_all_missing() {
        let page = Target::parse("http://example.com/").unwrap();
        let findings = HeaderAuditProbe.audit(&page, &response(HeaderMap::new(), ""));
        assert_eq!(findings.len(), 4);
        assert!(findings.iter().all(|f| f.class == VulnerabilityClass::MissingSecurityHeader));
        assert!(findings.iter().all(|f| f.surface.is_none()));
    }

    #[test]
    fn test_header_audit_all_present() {
        let mut headers = HeaderMap::new();
        headers.insert("X-XSS-Protection", HeaderValue::from_static("1"));
        headers.insert("Strict-Transport-Security", HeaderValue::from_static("max-age=1"));
        headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
        headers.insert("Content-Security-Policy", HeaderValue::from_static("default-src 'self'"));
        let page = Target::parse("http://example.com/").unwrap();
        assert!(HeaderAuditProbe.audit(&page, &response(headers, "")).is_empty());
    }

    #[test]
    fn test_script_audit() {
        let page = Target::parse("http://example.com/").unwrap();
        let body = "<script>document.write(location.hash)</script>";
        let findings = ScriptAuditProbe.audit(&page, &response(HeaderMap::new(), body));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].class, VulnerabilityClass::UnsafeScript);
        assert!(findings[0].evidence.starts_with("document.write("));
    }
}
