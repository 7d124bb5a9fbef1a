use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use tokio::sync::mpsc;

use crate::core::surface::Surface;
use crate::core::VulnerabilityClass;
use crate::SinkRef;

/// A recorded signal. Never mutated once sent to the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub class: VulnerabilityClass,
    /// `None` for page-level findings such as missing headers.
    pub surface: Option<Surface>,
    pub payload: Option<String>,
    pub evidence: String,
    pub url: String,
    pub method: String,
    pub status_code: u16,
    pub request_body: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Finding {
    /// Builds a curl command that reproduces this finding.
    pub fn to_curl(&self) -> String {
        let mut parts = vec![format!("curl -X {} '{}'", self.method, self.url)];
        if let Some(ref body) = self.request_body {
            if !body.is_empty() {
                parts.push(format!("-d '{}'", body));
            }
        }
        parts.push("--insecure".to_string());
        parts.join(" ")
    }

    pub fn location(&self) -> String {
        match self.surface {
            Some(ref surface) => surface.describe(),
            None => format!("page {}", self.url),
        }
    }
}

/// A page or link that could not be processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFailure {
    pub url: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl FetchFailure {
    pub fn new(url: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            url: url.into(),
            error: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// What crawl and probe tasks send to the aggregator.
#[derive(Debug, Clone)]
pub enum ScanRecord {
    Finding(Finding),
    Failure(FetchFailure),
}

/// Final structured result of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub target: String,
    pub findings: Vec<Finding>,
    pub errors: Vec<FetchFailure>,
    pub pages_visited: usize,
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Advisory prose from the narrator, if one ran and succeeded.
    pub narrative: Option<String>,
}

impl ScanReport {
    pub fn findings_of(&self, class: VulnerabilityClass) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.class == class)
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Collects findings and failures as they stream in from concurrent tasks.
pub struct ResultAggregator;

/// Everything the aggregator collected once all senders are gone.
#[derive(Debug, Default)]
pub struct Collected {
    pub findings: Vec<Finding>,
    pub errors: Vec<FetchFailure>,
}

impl ResultAggregator {
    /// Runs until every sender is dropped. Each finding is reported to `sink`
    /// and, when `output_path` is set, appended to it as one JSON line.
    pub async fn run(
        mut receiver: mpsc::Receiver<ScanRecord>,
        output_path: Option<&str>,
        sink: SinkRef,
    ) -> Collected {
        let mut file = match output_path {
            Some(path) => match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                Ok(f) => Some(f),
                Err(e) => {
                    sink.on_log("error", &format!("[!] Failed to open output file '{}': {}", path, e));
                    None
                }
            },
            None => None,
        };

        let mut collected = Collected::default();

        while let Some(record) = receiver.recv().await {
            match record {
                ScanRecord::Finding(finding) => {
                    sink.on_finding(&finding);
                    if let Some(ref mut f) = file {
                        append_line(f, &finding);
                    }
                    collected.findings.push(finding);
                }
                ScanRecord::Failure(failure) => {
                    sink.on_log("warn", &format!("[!] {}: {}", failure.url, failure.error));
                    collected.errors.push(failure);
                }
            }
        }
        collected
    }

    pub fn report_summary(report: &ScanReport, sink: &SinkRef) {
        if report.findings.is_empty() {
            sink.on_log("success", "[+] No vulnerabilities found.");
        } else {
            sink.on_log("warn", &format!("[+] {} finding(s) discovered:", report.findings.len()));
            for (i, f) in report.findings.iter().enumerate() {
                sink.on_log("error", &format!(
                    "  #{} {} -> {} ({})",
                    i + 1, f.class, f.location(), f.evidence
                ));
            }
        }
        if !report.errors.is_empty() {
            sink.on_log("warn", &format!("[!] {} URL(s) could not be scanned.", report.errors.len()));
        }
        if report.aborted {
            sink.on_log("warn", "[!] Scan was aborted before the crawl completed.");
        }
    }
}

fn append_line(file: &mut File, finding: &Finding) {
    if let Ok(line) = serde_json::to_string(finding) {
        let _ = writeln!(file, "{}", line);
    }
}

/// Plain-text summary of a report, used as narrator input.
pub fn findings_as_text(report: &ScanReport) -> String {
    let mut summary = format!("Vulnerability scan summary for {}:\n", report.target);
    if report.findings.is_empty() {
        summary.push_str("No vulnerabilities detected.\n");
    } else {
        summary.push_str(&format!(
            "Found {} potential vulnerabilities:\n",
            report.findings.len()
        ));
        for f in &report.findings {
            summary.push_str(&format!("- {} at {}: {}\n", f.class, f.location(), f.evidence));
        }
    }
    if !report.errors.is_empty() {
        summary.push_str(&format!("{} URL(s) failed to load.\n", report.errors.len()));
    }
    summary
}
