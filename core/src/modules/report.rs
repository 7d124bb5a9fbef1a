//! Report rendering from a finished `ScanReport`.
//!
//! The HTML report is a single self-contained file with embedded CSS and a
//! small filter script, no external assets.

use anyhow::Context;
use std::path::Path;

use crate::core::result_aggregator::ScanReport;
use crate::core::VulnerabilityClass;

pub trait ReportRenderer {
    fn render(&self, report: &ScanReport) -> anyhow::Result<String>;
}

/// The structured report as pretty-printed JSON.
pub struct JsonReport;

impl ReportRenderer for JsonReport {
    fn render(&self, report: &ScanReport) -> anyhow::Result<String> {
        serde_json::to_string_pretty(report).context("serializing scan report")
    }
}

pub struct HtmlReport;

pub fn severity(class: VulnerabilityClass) -> &'static str {
    match class {
        VulnerabilityClass::DatabaseError => "Critical",
        VulnerabilityClass::ReflectedInjection => "High",
        VulnerabilityClass::UnsafeScript => "Medium",
        VulnerabilityClass::MissingSecurityHeader => "Low",
    }
}

impl ReportRenderer for HtmlReport {
    fn render(&self, report: &ScanReport) -> anyhow::Result<String> {
        let count = |sev: &str| report.findings.iter().filter(|f| severity(f.class) == sev).count();

        let mut rows = String::new();
        for (i, f) in report.findings.iter().enumerate() {
            let sev = severity(f.class);
            rows.push_str(&format!(
                r#"<tr>
                <td>{}</td>
                <td><span class="sev-{}">{}</span></td>
                <td>{}</td>
                <td class="mono">{}</td>
                <td class="mono">{}</td>
                <td>{}</td>
                <td>{}</td>
                <td class="mono curl-cell">{}</td>
            </tr>"#,
                i + 1,
                sev.to_lowercase(),
                sev,
                html_escape(&f.class.to_string()),
                html_escape(&f.location()),
                html_escape(f.payload.as_deref().unwrap_or("-")),
                html_escape(&f.evidence),
                f.status_code,
                html_escape(&f.to_curl()),
            ));
        }

        let mut error_rows = String::new();
        for e in &report.errors {
            error_rows.push_str(&format!(
                "<tr><td class=\"mono\">{}</td><td>{}</td></tr>",
                html_escape(&e.url),
                html_escape(&e.error)
            ));
        }

        let narrative = match report.narrative {
            Some(ref text) => format!(
                r#"<div class="panel"><div class="panel-header">Summary</div><div class="narrative">{}</div></div>"#,
                html_escape(text)
            ),
            None => String::new(),
        };

        let elapsed = report.elapsed();
        let total = report.findings.len();

        Ok(format!(r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>webprobe report: {target}</title>
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
body {{ background: #0a0a0c; color: #e1e1e6; font-family: system-ui, sans-serif; padding: 2rem; }}
h1 {{ font-size: 1.5rem; font-weight: 700; margin-bottom: 2rem; }}
.meta {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr)); gap: 1rem; margin-bottom: 2rem; }}
.meta-card {{ background: rgba(255,255,255,0.035); border: 1px solid rgba(255,255,255,0.08); border-radius: 12px; padding: 1.25rem; }}
.meta-card .label {{ font-size: 0.7rem; text-transform: uppercase; letter-spacing: 0.08em; color: #64647a; margin-bottom: 0.5rem; }}
.meta-card .value {{ font-size: 1.5rem; font-weight: 700; font-family: monospace; word-break: break-all; }}
table {{ width: 100%; border-collapse: collapse; font-size: 0.85rem; }}
thead th {{ text-align: left; padding: 0.75rem 1rem; border-bottom: 1px solid rgba(255,255,255,0.08); color: #64647a; font-size: 0.7rem; text-transform: uppercase; }}
tbody td {{ padding: 0.75rem 1rem; border-bottom: 1px solid rgba(255,255,255,0.04); }}
.mono {{ font-family: monospace; font-size: 0.8rem; }}
.curl-cell {{ max-width: 300px; overflow: hidden; text-overflow: ellipsis; white-space: nowrap; color: #94949e; }}
.sev-critical {{ color: #f43f5e; font-weight: 700; }}
.sev-high {{ color: #f97316; font-weight: 700; }}
.sev-medium {{ color: #eab308; font-weight: 700; }}
.sev-low {{ color: #38bdf8; font-weight: 700; }}
.panel {{ background: rgba(255,255,255,0.02); border: 1px solid rgba(255,255,255,0.08); border-radius: 12px; overflow: hidden; margin-bottom: 2rem; }}
.panel-header {{ padding: 1rem 1.25rem; border-bottom: 1px solid rgba(255,255,255,0.08); font-weight: 600; }}
.filter-bar {{ padding: 0.75rem 1.25rem; }}
.filter-bar input {{ background: #151518; border: 1px solid rgba(255,255,255,0.08); border-radius: 8px; padding: 0.5rem 0.75rem; color: #e1e1e6; width: 300px; }}
.narrative {{ padding: 1.25rem; white-space: pre-wrap; }}
.empty {{ padding: 3rem; text-align: center; color: #64647a; }}
</style>
</head>
<body>
<h1>webprobe scan report</h1>

<div class="meta">
    <div class="meta-card"><div class="label">Target</div><div class="value">{target}</div></div>
    <div class="meta-card"><div class="label">Pages</div><div class="value">{pages}</div></div>
    <div class="meta-card"><div class="label">Findings</div><div class="value">{total}</div></div>
    <div class="meta-card"><div class="label">Critical / High</div><div class="value">{crit} / {high}</div></div>
    <div class="meta-card"><div class="label">Medium / Low</div><div class="value">{med} / {low}</div></div>
    <div class="meta-card"><div class="label">Elapsed</div><div class="value">{elapsed}s</div></div>
</div>

{narrative}

<div class="panel">
    <div class="panel-header">Findings{aborted}</div>
    <div class="filter-bar"><input type="text" id="filter" placeholder="Filter findings..." oninput="filterTable()"></div>
    {findings_table}
</div>

<div class="panel">
    <div class="panel-header">Errors ({error_count})</div>
    {errors_table}
</div>

<script>
function filterTable() {{
    const q = document.getElementById('filter').value.toLowerCase();
    document.querySelectorAll('#findings tbody tr').forEach(r => {{
        r.style.display = r.textContent.toLowerCase().includes(q) ? '' : 'none';
    }});
}}
</script>
</body>
</html>"#,
            target = html_escape(&report.target),
            pages = report.pages_visited,
            total = total,
            crit = count("Critical"),
            high = count("High"),
            med = count("Medium"),
            low = count("Low"),
            elapsed = elapsed.num_seconds(),
            narrative = narrative,
            aborted = if report.aborted { " (scan aborted, results partial)" } else { "" },
            findings_table = if total == 0 {
                r#"<div class="empty">No findings to display.</div>"#.to_string()
            } else {
                format!(
                    r#"<table id="findings"><thead><tr><th>#</th><th>Severity</th><th>Type</th><th>Location</th><th>Payload</th><th>Evidence</th><th>Status</th><th>Reproduce</th></tr></thead><tbody>{}</tbody></table>"#,
                    rows
                )
            },
            error_count = report.errors.len(),
            errors_table = if report.errors.is_empty() {
                r#"<div class="empty">No errors.</div>"#.to_string()
            } else {
                format!(
                    r#"<table><thead><tr><th>URL</th><th>Error</th></tr></thead><tbody>{}</tbody></table>"#,
                    error_rows
                )
            },
        ))
    }
}

/// Renders `report` and writes it to `path`.
pub fn write_report(renderer: &dyn ReportRenderer, report: &ScanReport, path: &Path) -> anyhow::Result<()> {
    let document = renderer.render(report)?;
    std::fs::write(path, document).with_context(|| format!("writing report to {}", path.display()))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::result_aggregator::{FetchFailure, Finding};
    use chrono::Utc;

    fn report() -> ScanReport {
        let now = Utc::now();
        ScanReport {
            target: "http://example.com/".to_string(),
            findings: vec![Finding {
                class: VulnerabilityClass::ReflectedInjection,
                surface: None,
                payload: Some("<script>alert('XSS')</script>".to_string()),
                evidence: "payload reflected".to_string(),
                url: "http://example.com/?q=x".to_string(),
                method: "GET".to_string(),
                status_code: 200,
                request_body: None,
                timestamp: now,
            }],
            errors: vec![FetchFailure::new("http://example.com/down", "timed out")],
            pages_visited: 2,
            aborted: false,
            started_at: now,
            finished_at: now,
            narrative: Some("One reflected payload.".to_string()),
        }
    }

    #[test]
    fn test_json_report_round_trips() {
        let text = JsonReport.render(&report()).unwrap();
        let parsed: ScanReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.findings.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_html_report_escapes_payloads() {
        let html = HtmlReport.render(&report()).unwrap();
        assert!(html.contains("&lt;script&gt;alert(&#39;XSS&#39;)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert('XSS')</script>"));
        assert!(html.contains("sev-high"));
        assert!(html.contains("http://example.com/down"));
        assert!(html.contains("One reflected payload."));
    }

    #[test]
    fn test_html_report_empty() {
        let mut r = report();
        r.findings.clear();
        r.errors.clear();
        let html = HtmlReport.render(&r).unwrap();
        assert!(html.contains("No findings to display."));
        assert!(html.contains("No errors."));
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&JsonReport, &report(), &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("example.com"));
    }

    #[test]
    fn test_write_report_bad_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.html");
        assert!(write_report(&HtmlReport, &report(), &path).is_err());
    }
}
