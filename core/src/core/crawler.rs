use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::core::probe::{ProbeContext, ProbeOutcome, ProbeRegistry};
use crate::core::result_aggregator::{FetchFailure, ScanRecord};
use crate::core::state::{CrawlState, Visit};
use crate::core::surface::{Surface, Target};
use crate::error::FetchError;
use crate::http::{HttpRequest, RetryPolicy};
use crate::modules::extractor;
use crate::SinkRef;

/// Recursive, depth-bounded, de-duplicated traversal of one origin.
///
/// Each page goes fetch, audit, extract, probe, then recurse. All probes of a
/// page finish before its links are followed. At most `concurrency` pages are
/// being processed at once across the whole tree; the slot is released before
/// recursing so parents never hold capacity their children need.
pub struct CrawlCoordinator {
    seed: Target,
    state: CrawlState,
    ctx: ProbeContext,
    registry: ProbeRegistry,
    page_slots: Semaphore,
    concurrency: usize,
    sink: SinkRef,
}

impl CrawlCoordinator {
    pub fn new(
        seed: Target,
        state: CrawlState,
        ctx: ProbeContext,
        registry: ProbeRegistry,
        concurrency: usize,
        sink: SinkRef,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            seed,
            state,
            ctx,
            registry,
            page_slots: Semaphore::new(concurrency),
            concurrency,
            sink,
        }
    }

    pub fn pages_visited(&self) -> usize {
        self.state.visited_count()
    }

    /// Crawls `target` and everything reachable from it within bounds.
    /// Resolves once every transitive child is done or skipped.
    pub fn crawl(self: &Arc<Self>, target: Target, depth: u32) -> BoxFuture<'static, ()> {
        let this = Arc::clone(self);
        async move { this.visit(target, depth).await }.boxed()
    }

    async fn visit(self: Arc<Self>, target: Target, depth: u32) {
        if self.ctx.abort.is_cancelled() {
            return;
        }
        if self.state.exceeds_depth(depth) {
            debug!("Skipping {} (depth {} > {})", target, depth, self.state.max_depth());
            return;
        }
        match self.state.mark_visited(&target) {
            Visit::New => {}
            Visit::AlreadyVisited => return,
            Visit::Capped => {
                debug!("Page cap reached, not fetching {}", target);
                return;
            }
        }

        let children = {
            let _slot = match self.page_slots.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            match self.process_page(&target, depth).await {
                Some(links) => links,
                None => return,
            }
        };

        if children.is_empty() || self.ctx.abort.is_cancelled() {
            return;
        }

        stream::iter(children)
            .map(|child| self.crawl(child, depth + 1))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<()>>()
            .await;
    }

    /// Fetches, audits, extracts and probes one page. Returns the links worth
    /// following, or `None` when the page could not be fetched.
    async fn process_page(&self, target: &Target, depth: u32) -> Option<Vec<Target>> {
        if self.ctx.abort.is_cancelled() {
            return None;
        }

        self.sink.on_progress(
            &format!("Crawling {} (depth {})", target, depth),
            self.state.visited_count(),
            0,
        );

        let request = HttpRequest::get(target.url().clone());
        let response = match self
            .ctx
            .client
            .fetch(&request, RetryPolicy::Automatic, &self.ctx.limiter, &self.ctx.abort)
            .await
        {
            Ok(resp) => resp,
            Err(FetchError::Aborted) => return None,
            Err(e) => {
                warn!("Failed to fetch {}: {}", target, e);
                self.ctx
                    .record(ScanRecord::Failure(FetchFailure::new(target.as_str(), &e)))
                    .await;
                return None;
            }
        };

        // Redirects off the origin are not taken, so a 3xx ends the page here.
        if (300..400).contains(&response.status) {
            debug!("{} answered {}, not following the redirect", target, response.status);
            return Some(Vec::new());
        }

        // Same-origin redirects were followed; findings and links belong to
        // the page actually served.
        let page = Target::parse(&response.url).unwrap_or_else(|_| target.clone());
        if !page.same_origin(&self.seed) {
            debug!("{} was served from {}, outside the scan origin", target, page);
            return Some(Vec::new());
        }

        for audit in self.registry.audits() {
            for finding in audit.audit(&page, &response) {
                self.ctx.record(ScanRecord::Finding(finding)).await;
            }
        }

        let extracted = extractor::extract(&page, &response.body);
        for (href, reason) in &extracted.rejected_links {
            self.ctx
                .record(ScanRecord::Failure(FetchFailure::new(
                    href.clone(),
                    format!("invalid link on {}: {}", page, reason),
                )))
                .await;
        }

        let surfaces = self.in_scope(extracted.surfaces());
        info!(
            "{}: {} form(s), {} param(s), {} link(s)",
            page,
            extracted.forms.len(),
            extracted.params.len(),
            extracted.links.len()
        );
        self.probe_all(&surfaces).await;

        Some(self.follow_links(extracted.links, depth))
    }

    /// Runs every registered strategy against every surface of the page,
    /// at most `concurrency` at a time.
    async fn probe_all(&self, surfaces: &[Surface]) {
        let strategies = self.registry.strategies().len();
        let jobs: Vec<(usize, usize)> = (0..surfaces.len())
            .flat_map(|si| (0..strategies).map(move |pi| (si, pi)))
            .collect();

        stream::iter(jobs)
            .map(|(si, pi)| async move {
                let surface = &surfaces[si];
                let strategy = &self.registry.strategies()[pi];
                if self.ctx.abort.is_cancelled() {
                    return;
                }
                match strategy.run(&self.ctx, surface).await {
                    ProbeOutcome::Detected(findings) => {
                        for finding in findings {
                            self.ctx.record(ScanRecord::Finding(finding)).await;
                        }
                    }
                    ProbeOutcome::Inconclusive { failures } => {
                        debug!(
                            "{} on {}: inconclusive ({} failed attempt(s))",
                            strategy.name(),
                            surface.describe(),
                            failures
                        );
                    }
                    ProbeOutcome::Clean | ProbeOutcome::Aborted => {}
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<()>>()
            .await;
    }

    /// Drops forms whose action points at another origin; injection traffic
    /// stays on the scanned site.
    fn in_scope(&self, surfaces: Vec<Surface>) -> Vec<Surface> {
        surfaces
            .into_iter()
            .filter(|surface| match surface {
                Surface::Form(form) if !form.action.same_origin(&self.seed) => {
                    debug!("Not probing off-origin form action {}", form.action);
                    false
                }
                _ => true,
            })
            .collect()
    }

    /// Same-origin links, deduplicated within the page, that are still
    /// within depth.
    fn follow_links(&self, links: Vec<Target>, depth: u32) -> Vec<Target> {
        if self.state.exceeds_depth(depth + 1) {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        links
            .into_iter()
            .filter(|link| link.same_origin(&self.seed))
            .filter(|link| seen.insert(link.clone()))
            .collect()
    }
}
