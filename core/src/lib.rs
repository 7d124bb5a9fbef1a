pub mod core;
pub mod error;
pub mod http;
pub mod modules;
pub mod utils;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::core::engine::{parse_seed, ScanSession};
pub use crate::core::probe::{ProbeOutcome, ProbeRegistry};
pub use crate::core::result_aggregator::{findings_as_text, FetchFailure, Finding, ResultAggregator, ScanReport};
pub use crate::core::state::AbortSignal;
pub use crate::core::surface::{Surface, Target};
pub use crate::core::throttle::RateLimiter;
pub use crate::core::VulnerabilityClass;
pub use crate::error::{FetchError, ScanError};
pub use crate::http::HttpClient;
pub use crate::modules::narrator::{narrate, DisabledNarrator, Narrator};
pub use crate::modules::notifier::{notify_report, Notifier, WebhookNotifier};
pub use crate::modules::report::{write_report, HtmlReport, JsonReport, ReportRenderer};
pub use crate::utils::payload_loader::PayloadCatalog;
pub use crate::utils::read_lines;

/// Scan configuration shared by the library and the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanConfig {
    pub target: String,
    pub max_depth: u32,
    pub timeout: u64,
    /// Tokens per `rate_period_ms`.
    pub rate_limit: u32,
    pub rate_period_ms: u64,
    pub concurrency: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub max_pages: usize,
    pub stop_on_first_match: bool,
    /// Seconds; 0 disables the deadline.
    pub scan_timeout: u64,
    pub proxy: String,
    /// `Name: value` entries.
    pub headers: Vec<String>,
    pub xss_payloads: String,
    pub sqli_payloads: String,
    pub output: String,
    pub verbose: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            max_depth: 3,
            timeout: 30,
            rate_limit: 10,
            rate_period_ms: 1000,
            concurrency: 10,
            max_retries: 2,
            retry_backoff_ms: 250,
            max_pages: 200,
            stop_on_first_match: true,
            scan_timeout: 0,
            proxy: String::new(),
            headers: Vec::new(),
            xss_payloads: String::new(),
            sqli_payloads: String::new(),
            output: String::new(),
            verbose: false,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

impl ScanConfig {
    pub fn header_list(&self) -> Vec<String> {
        self.headers
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn parsed_headers(&self) -> Vec<(String, String)> {
        parse_custom_headers(&self.header_list())
    }

    pub fn proxy_ref(&self) -> Option<&str> {
        non_empty(&self.proxy)
    }

    pub fn output_ref(&self) -> Option<&str> {
        non_empty(&self.output)
    }

    pub fn xss_payloads_ref(&self) -> Option<&str> {
        non_empty(&self.xss_payloads)
    }

    pub fn sqli_payloads_ref(&self) -> Option<&str> {
        non_empty(&self.sqli_payloads)
    }

    /// Never 0, so token acquisition always terminates.
    pub fn effective_rate_limit(&self) -> u32 {
        self.rate_limit.max(1)
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

pub fn parse_custom_headers(raw: &[String]) -> Vec<(String, String)> {
    raw.iter().filter_map(|h| {
        let mut parts = h.splitn(2, ':');
        let key = parts.next()?.trim().to_string();
        let val = parts.next().unwrap_or("").trim().to_string();
        if key.is_empty() { return None; }
        Some((key, val))
    }).collect()
}

/// Output abstraction for the scan pipeline.
/// The CLI prints through it; library callers can collect or discard.
pub trait ScanEventSink: Send + Sync {
    fn on_log(&self, level: &str, message: &str);
    fn on_finding(&self, finding: &Finding);
    fn on_progress(&self, phase: &str, current: usize, total: usize);
}

pub type SinkRef = Arc<dyn ScanEventSink>;

/// Terminal output sink.
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self)
    }
}

impl ScanEventSink for ConsoleSink {
    fn on_log(&self, level: &str, message: &str) {
        use colored::*;
        let colored = match level {
            "success" => message.green().to_string(),
            "error"   => message.red().to_string(),
            "warn"    => message.yellow().to_string(),
            "phase"   => message.bright_cyan().bold().to_string(),
            _         => message.to_string(),
        };
        println!("{}", colored);
    }

    fn on_finding(&self, finding: &Finding) {
        println!("{}", format_finding(finding));
    }

    fn on_progress(&self, phase: &str, current: usize, total: usize) {
        use colored::*;
        if total > 0 {
            println!("{}", format!("[*] {} ({}/{})", phase, current, total).bright_cyan());
        } else {
            println!("{}", format!("[*] {}", phase).bright_cyan());
        }
    }
}

/// Multi-line colored rendering of a finding, as printed by `ConsoleSink`.
pub fn format_finding(finding: &Finding) -> String {
    use colored::*;
    let mut lines = vec![
        format!("\n{} {} detected!", "[+]".green().bold(), finding.class.to_string().red().bold()),
        format!("    Where:    {}", finding.location().white()),
    ];
    if let Some(ref payload) = finding.payload {
        lines.push(format!("    Payload:  {}", payload.bright_yellow()));
    }
    lines.push(format!("    Evidence: {}", finding.evidence));
    lines.push(format!("    Status:   [{}]", finding.status_code.to_string().cyan()));
    if finding.surface.is_some() {
        lines.push(format!("    curl:     {}", finding.to_curl().dimmed()));
    }
    lines.push("──────────────────────────────────────────".dimmed().to_string());
    lines.join("\n")
}

/// Discards everything.
pub struct NullSink;

impl NullSink {
    pub fn new_ref() -> SinkRef {
        Arc::new(Self)
    }
}

impl ScanEventSink for NullSink {
    fn on_log(&self, _level: &str, _message: &str) {}
    fn on_finding(&self, _finding: &Finding) {}
    fn on_progress(&self, _phase: &str, _current: usize, _total: usize) {}
}
