//! Per-scan crawl bookkeeping: the visited set and the abort signal.
//!
//! Nothing here is persisted; a `CrawlState` lives exactly as long as the
//! `ScanSession` that created it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::surface::Target;

/// Cooperative stop flag shared by everything a scan spawns.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    cancelled: Arc<AtomicBool>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of trying to claim a target for fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// First claim; the caller owns the fetch.
    New,
    AlreadyVisited,
    /// The page budget is spent.
    Capped,
}

pub struct CrawlState {
    visited: Mutex<HashSet<Target>>,
    max_depth: u32,
    max_pages: usize,
}

impl CrawlState {
    pub fn new(max_depth: u32, max_pages: usize) -> Self {
        Self {
            visited: Mutex::new(HashSet::new()),
            max_depth,
            max_pages,
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn exceeds_depth(&self, depth: u32) -> bool {
        depth > self.max_depth
    }

    /// Check-and-mark in one critical section: of any number of concurrent
    /// callers with the same target, exactly one sees `Visit::New`.
    pub fn mark_visited(&self, target: &Target) -> Visit {
        let mut visited = match self.visited.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if visited.contains(target) {
            return Visit::AlreadyVisited;
        }
        if visited.len() >= self.max_pages {
            return Visit::Capped;
        }
        visited.insert(target.clone());
        Visit::New
    }

    pub fn visited_count(&self) -> usize {
        match self.visited.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str) -> Target {
        Target::parse(url).unwrap()
    }

    #[test]
    fn test_mark_visited_once() {
        let state = CrawlState::new(3, 10);
        let t = target("http://example.com/a");

        assert_eq!(state.mark_visited(&t), Visit::New);
        assert_eq!(state.mark_visited(&t), Visit::AlreadyVisited);
        assert_eq!(state.visited_count(), 1);
    }

    #[test]
    fn test_page_cap() {
        let state = CrawlState::new(3, 2);
        assert_eq!(state.mark_visited(&target("http://example.com/1")), Visit::New);
        assert_eq!(state.mark_visited(&target("http://example.com/2")), Visit::New);
        assert_eq!(state.mark_visited(&target("http://example.com/3")), Visit::Capped);
        assert_eq!(state.mark_visited(&target("http://example.com/1")), Visit::AlreadyVisited);
    }

    #[test]
    fn test_depth_bound() {
        let state = CrawlState::new(2, 10);
        assert!(!state.exceeds_depth(2));
        assert!(state.exceeds_depth(3));
    }

    #[tokio::test]
    async fn test_concurrent_claims_single_winner() {
        let state = Arc::new(CrawlState::new(3, 100));
        let t = target("http://example.com/shared");

        let mut handles = Vec::new();
        for _ in 0..32 {
            let state = Arc::clone(&state);
            let t = t.clone();
            handles.push(tokio::spawn(async move { state.mark_visited(&t) }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() == Visit::New {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_abort_signal_shared() {
        let signal = AbortSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_cancelled());
        signal.cancel();
        assert!(clone.is_cancelled());
    }
}
