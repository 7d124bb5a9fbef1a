use clap::{CommandFactory, Parser};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use webprobe_core::{
    format_finding, notify_report, read_lines, write_report, ConsoleSink, Finding, HtmlReport,
    JsonReport, ScanConfig, ScanEventSink, ScanReport, ScanSession, SinkRef, WebhookNotifier,
};

#[derive(Parser, Debug)]
#[command(
    name = "webprobe",
    version,
    about = "Crawling web vulnerability prober (reflected XSS, SQL errors, missing headers)",
    override_usage = "webprobe <target> <options>",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  Quick scan:                     webprobe http://target.com
  Verbose, deeper crawl:          webprobe http://target.com -v -d 5
  Gentle rate:                    webprobe http://target.com --rate-limit 2
  Through Burp:                   webprobe http://target.com --proxy http://127.0.0.1:8080
  Authenticated headers:          webprobe http://target.com -H \"Cookie: sess=abc\"
  Every hit, not just the first:  webprobe http://target.com --exhaustive
  Reports:                        webprobe http://target.com -o findings.jsonl --html report.html
  Scan from file:                 webprobe -l targets.txt
  Dry-run test:                   webprobe http://target.com --dry-run"
)]
pub struct Args {
    #[arg(required_unless_present = "list")]
    pub target: Option<String>,

    #[arg(short = 'l', long = "list", help = "File containing target URLs (one per line)")]
    pub list: Option<String>,

    #[arg(short = 'd', long, default_value_t = 3, help = "Maximum crawl depth (seed page is depth 0)")]
    pub depth: u32,

    #[arg(long, default_value_t = 30, help = "Request timeout in seconds")]
    pub timeout: u64,

    #[arg(long, default_value_t = 10, help = "Requests allowed per rate period")]
    pub rate_limit: u32,

    #[arg(long, default_value_t = 1000, help = "Rate period in milliseconds")]
    pub rate_period_ms: u64,

    #[arg(short = 'c', long, default_value_t = 10, help = "Pages processed concurrently")]
    pub concurrency: usize,

    #[arg(long, default_value_t = 200, help = "Maximum number of pages to fetch")]
    pub max_pages: usize,

    #[arg(long, default_value_t = 2, help = "Retries for failed page fetches")]
    pub max_retries: u32,

    #[arg(long, help = "Keep probing a surface after its first finding")]
    pub exhaustive: bool,

    #[arg(long, default_value_t = 0, help = "Stop the scan after this many seconds (0 = no limit)")]
    pub scan_timeout: u64,

    #[arg(long, help = "Proxy URL (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(short = 'H', long = "header", help = "Custom header (e.g. \"Authorization: Bearer TOKEN\")")]
    pub headers: Vec<String>,

    #[arg(long, help = "File of XSS payloads, one per line")]
    pub xss_payloads: Option<String>,

    #[arg(long, help = "File of SQL injection payloads, one per line")]
    pub sqli_payloads: Option<String>,

    #[arg(short = 'o', long, help = "Append findings to this file as JSON lines")]
    pub output: Option<String>,

    #[arg(long, help = "Write the full JSON report to this file")]
    pub report: Option<String>,

    #[arg(long, help = "Write an HTML report to this file")]
    pub html: Option<String>,

    #[arg(long, help = "Discord, Slack or generic webhook to notify when done")]
    pub webhook: Option<String>,

    #[arg(short = 'v', long, default_value_t = false, help = "Debug logging")]
    pub verbose: bool,

    #[arg(long, help = "Print what would be scanned without sending requests")]
    pub dry_run: bool,
}

impl Args {
    fn scan_config(&self, target: &str) -> ScanConfig {
        ScanConfig {
            target: target.to_string(),
            max_depth: self.depth,
            timeout: self.timeout,
            rate_limit: self.rate_limit,
            rate_period_ms: self.rate_period_ms,
            concurrency: self.concurrency,
            max_retries: self.max_retries,
            max_pages: self.max_pages,
            stop_on_first_match: !self.exhaustive,
            scan_timeout: self.scan_timeout,
            proxy: self.proxy.clone().unwrap_or_default(),
            headers: self.headers.clone(),
            xss_payloads: self.xss_payloads.clone().unwrap_or_default(),
            sqli_payloads: self.sqli_payloads.clone().unwrap_or_default(),
            output: self.output.clone().unwrap_or_default(),
            verbose: self.verbose,
            ..ScanConfig::default()
        }
    }
}

/// Prints through a spinner so progress lines don't tear findings.
struct SpinnerSink {
    bar: ProgressBar,
}

impl SpinnerSink {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl ScanEventSink for SpinnerSink {
    fn on_log(&self, level: &str, message: &str) {
        let colored = match level {
            "success" => message.green().to_string(),
            "error"   => message.red().to_string(),
            "warn"    => message.yellow().to_string(),
            "phase"   => message.bright_cyan().bold().to_string(),
            _         => message.to_string(),
        };
        self.bar.println(colored);
    }

    fn on_finding(&self, finding: &Finding) {
        self.bar.println(format_finding(finding));
    }

    fn on_progress(&self, phase: &str, current: usize, _total: usize) {
        self.bar.set_message(format!("{} [{} page(s) claimed]", phase, current));
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    print_banner();

    let mut targets: Vec<String> = Vec::new();

    if let Some(ref list_path) = args.list {
        match read_lines(list_path) {
            Ok(lines) => {
                println!(
                    "{}",
                    format!("[+] Loaded {} target(s) from {}", lines.len(), list_path).green().bold()
                );
                targets.extend(lines);
            }
            Err(e) => {
                eprintln!("{}", format!("[!] Failed to read '{}': {}", list_path, e).red());
                process::exit(1);
            }
        }
    }

    if let Some(ref t) = args.target {
        targets.push(t.clone());
    }

    if targets.is_empty() {
        eprintln!("{}", "[!] No targets specified. Provide a URL or use -l <file>.".red());
        let _ = Args::command().print_help();
        process::exit(1);
    }

    let total = targets.len();
    let mut failed = false;
    for (i, target) in targets.iter().enumerate() {
        if total > 1 {
            println!(
                "\n{}",
                format!("━━━ Target {}/{}: {} ━━━", i + 1, total, target).bright_white().bold()
            );
        }
        if !run_scan(target, &args).await {
            failed = true;
        }
    }

    if failed {
        process::exit(1);
    }
}

fn print_banner() {
    let banner = r#"
                 _                     _
 __      _____| |__  _ __  _ __ ___ | |__   ___
 \ \ /\ / / _ \ '_ \| '_ \| '__/ _ \| '_ \ / _ \
  \ V  V /  __/ |_) | |_) | | | (_) | |_) |  __/
   \_/\_/ \___|_.__/| .__/|_|  \___/|_.__/ \___|
                    |_|
    "#;
    println!("{}", banner.bright_cyan().bold());
    println!("{}", "──────────────────────────────────────────────────".dimmed());
}

/// Runs one target end to end. Returns false only if the target could not be
/// scanned at all.
async fn run_scan(target: &str, args: &Args) -> bool {
    if args.dry_run {
        println!("[DRY RUN] Would scan target: {}", target);
        return true;
    }

    let config = args.scan_config(target);
    print_scan_config(&config);

    // Debug logs go straight to stderr, which a spinner would keep overdrawing.
    let spinner = (!args.verbose).then(|| Arc::new(SpinnerSink::new()));
    let sink: SinkRef = match spinner {
        Some(ref s) => Arc::clone(s) as SinkRef,
        None => ConsoleSink::new_ref(),
    };

    let session = match ScanSession::new(config) {
        Ok(s) => s.with_sink(sink),
        Err(e) => {
            eprintln!("{}", format!("[!] {}", e).red());
            return false;
        }
    };

    let abort = session.abort_signal();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "\n[!] Interrupted, finishing in-flight requests...".yellow());
            abort.cancel();
        }
    });

    let result = session.run().await;
    ctrl_c.abort();
    if let Some(s) = spinner {
        s.bar.finish_and_clear();
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", format!("[!] {}", e).red());
            return false;
        }
    };

    write_outputs(&report, args).await;
    true
}

async fn write_outputs(report: &ScanReport, args: &Args) {
    if let Some(ref path) = args.report {
        match write_report(&JsonReport, report, Path::new(path)) {
            Ok(()) => println!("{}", format!("[+] JSON report written to {}", path).green()),
            Err(e) => eprintln!("{}", format!("[!] JSON report failed: {:#}", e).red()),
        }
    }

    let mut html_written = None;
    if let Some(ref path) = args.html {
        match write_report(&HtmlReport, report, Path::new(path)) {
            Ok(()) => {
                println!("{}", format!("[+] HTML report written to {}", path).green());
                html_written = Some(Path::new(path));
            }
            Err(e) => eprintln!("{}", format!("[!] HTML report failed: {:#}", e).red()),
        }
    }

    if let Some(ref url) = args.webhook {
        match WebhookNotifier::new(url) {
            Ok(notifier) => {
                if notify_report(&notifier, report, html_written).await {
                    println!("{}", "[+] Webhook notified.".green());
                }
            }
            Err(e) => eprintln!("{}", format!("[!] Webhook setup failed: {:#}", e).red()),
        }
    }
}

fn print_scan_config(config: &ScanConfig) {
    println!("{}", format!("[+] Target:      {}", config.target).green().bold());
    println!("{}", format!("[+] Depth:       {}", config.max_depth).blue());
    println!("{}", format!("[+] Concurrency: {}", config.effective_concurrency()).blue());
    println!("{}", format!("[+] Timeout:     {}s", config.timeout).blue());
    println!(
        "{}",
        format!("[+] Rate Limit:  {} req / {} ms", config.effective_rate_limit(), config.rate_period_ms).blue()
    );
    println!(
        "{}",
        format!(
            "[+] Mode:        {}",
            if config.stop_on_first_match { "first match per surface" } else { "exhaustive" }
        )
        .magenta()
    );
    if let Some(proxy) = config.proxy_ref() {
        println!("{}", format!("[+] Proxy:       {}", proxy).yellow());
    }
    let headers = config.header_list();
    if !headers.is_empty() {
        println!("{}", format!("[+] Headers:     {} custom", headers.len()).yellow());
    }
    if let Some(output) = config.output_ref() {
        println!("{}", format!("[+] Output:      {}", output).blue());
    }
    println!("{}", "──────────────────────────────────────────────────".dimmed());
}
