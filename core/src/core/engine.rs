use chrono::Utc;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::core::crawler::CrawlCoordinator;
use crate::core::probe::{ProbeContext, ProbeRegistry};
use crate::core::result_aggregator::{ResultAggregator, ScanReport};
use crate::core::state::{AbortSignal, CrawlState};
use crate::core::surface::Target;
use crate::core::throttle::RateLimiter;
use crate::error::ScanError;
use crate::http::HttpClient;
use crate::utils::payload_loader::PayloadCatalog;
use crate::{NullSink, ScanConfig, SinkRef};

const RECORD_BUFFER: usize = 256;

/// One scan of one seed URL.
///
/// Owns every piece of per-scan state: the rate limiter, the visited set, the
/// HTTP client and the abort signal. Nothing is shared between sessions.
pub struct ScanSession {
    config: ScanConfig,
    client: Arc<HttpClient>,
    catalog: Arc<PayloadCatalog>,
    registry: ProbeRegistry,
    sink: SinkRef,
    abort: AbortSignal,
}

impl ScanSession {
    /// Builds the HTTP client and loads payload files. Fails only on
    /// configuration errors.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        let client = HttpClient::new(config.timeout, config.proxy_ref(), &config.parsed_headers())?
            .with_retries(config.max_retries, Duration::from_millis(config.retry_backoff_ms));

        let catalog = PayloadCatalog::load_from_paths(config.xss_payloads_ref(), config.sqli_payloads_ref())?;

        Ok(Self {
            config,
            client: Arc::new(client),
            catalog: Arc::new(catalog),
            registry: ProbeRegistry::default(),
            sink: NullSink::new_ref(),
            abort: AbortSignal::new(),
        })
    }

    pub fn with_catalog(mut self, catalog: PayloadCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn with_registry(mut self, registry: ProbeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_sink(mut self, sink: SinkRef) -> Self {
        self.sink = sink;
        self
    }

    /// Handle that stops the scan when cancelled. In-flight requests finish;
    /// no new fetch or probe is dispatched.
    pub fn abort_signal(&self) -> AbortSignal {
        self.abort.clone()
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Crawls and probes the seed. Returns `Err` only when the seed itself is
    /// unusable; every other failure is reported inside the `ScanReport`.
    pub async fn run(self) -> Result<ScanReport, ScanError> {
        let seed = parse_seed(&self.config.target)?;
        let started_at = Utc::now();

        self.sink.on_log(
            "phase",
            &format!(
                "[*] Scanning {} (depth {}, {} req / {} ms, concurrency {})",
                seed,
                self.config.max_depth,
                self.config.effective_rate_limit(),
                self.config.rate_period_ms,
                self.config.effective_concurrency()
            ),
        );

        let deadline = self.spawn_deadline();

        let (tx, rx) = mpsc::channel(RECORD_BUFFER);
        let limiter = RateLimiter::new(
            self.config.effective_rate_limit(),
            Duration::from_millis(self.config.rate_period_ms.max(1)),
        );
        let ctx = ProbeContext {
            client: Arc::clone(&self.client),
            limiter: Arc::new(limiter),
            catalog: Arc::clone(&self.catalog),
            abort: self.abort.clone(),
            records: tx,
            stop_on_first_match: self.config.stop_on_first_match,
        };
        let coordinator = Arc::new(CrawlCoordinator::new(
            seed.clone(),
            CrawlState::new(self.config.max_depth, self.config.max_pages.max(1)),
            ctx,
            self.registry.clone(),
            self.config.effective_concurrency(),
            Arc::clone(&self.sink),
        ));

        // The coordinator owns the only sender; moving it into the crawl
        // future lets the aggregator finish once the crawl is done.
        let crawl = async move {
            coordinator.crawl(seed, 0).await;
            coordinator.pages_visited()
        };
        let aggregate = ResultAggregator::run(rx, self.config.output_ref(), Arc::clone(&self.sink));

        let (pages_visited, collected) = tokio::join!(crawl, aggregate);

        if let Some(handle) = deadline {
            handle.abort();
        }

        let aborted = self.abort.is_cancelled();
        if aborted {
            warn!("Scan of {} stopped early", self.config.target);
        }
        info!(
            "Scan of {} finished: {} page(s), {} finding(s), {} error(s)",
            self.config.target,
            pages_visited,
            collected.findings.len(),
            collected.errors.len()
        );

        let report = ScanReport {
            target: self.config.target.clone(),
            findings: collected.findings,
            errors: collected.errors,
            pages_visited,
            aborted,
            started_at,
            finished_at: Utc::now(),
            narrative: None,
        };
        ResultAggregator::report_summary(&report, &self.sink);
        Ok(report)
    }

    fn spawn_deadline(&self) -> Option<tokio::task::JoinHandle<()>> {
        if self.config.scan_timeout == 0 {
            return None;
        }
        let abort = self.abort.clone();
        let limit = Duration::from_secs(self.config.scan_timeout);
        Some(tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            warn!("Scan deadline of {:?} reached, stopping", limit);
            abort.cancel();
        }))
    }
}

/// Absolute http(s) URL or a configuration error.
pub fn parse_seed(raw: &str) -> Result<Target, ScanError> {
    let target = Target::parse(raw).map_err(|source| ScanError::InvalidTarget {
        url: raw.to_string(),
        source,
    })?;
    if !target.is_http() {
        return Err(ScanError::UnsupportedScheme {
            url: raw.to_string(),
            scheme: target.url().scheme().to_string(),
        });
    }
    Ok(target)
}
