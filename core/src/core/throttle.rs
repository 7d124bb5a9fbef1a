//! Token-bucket admission control shared by every outbound request of a scan.
//!
//! The bucket starts full with `rate_limit` tokens and refills continuously at
//! `rate_limit / time_period`. Refill and debit happen inside one critical
//! section so concurrent callers can never both spend the same token.
//! Waiting callers poll every `POLL_INTERVAL` instead of being woken on refill.

use std::sync::{Mutex, MutexGuard};
use tokio::time::{sleep, Duration, Instant};

use crate::core::state::AbortSignal;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    capacity: f64,
    refill_per_sec: f64,
    poll_interval: Duration,
}

impl RateLimiter {
    /// `rate_limit` tokens per `time_period`. A zero rate is clamped to one so
    /// `acquire` always terminates.
    pub fn new(rate_limit: u32, time_period: Duration) -> Self {
        let capacity = f64::from(rate_limit.max(1));
        let period = time_period.as_secs_f64().max(f64::EPSILON);
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: capacity / period,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Refills, then debits one token if available. Never waits.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.lock_bucket();
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Waits until one token is available and takes it.
    pub async fn acquire(&self) {
        while !self.try_acquire() {
            sleep(self.poll_interval).await;
        }
    }

    /// Like `acquire`, but gives up once `abort` trips. Returns whether a
    /// token was taken.
    pub async fn acquire_or_abort(&self, abort: &AbortSignal) -> bool {
        loop {
            if abort.is_cancelled() {
                return false;
            }
            if self.try_acquire() {
                return true;
            }
            sleep(self.poll_interval).await;
        }
    }

    /// Tokens currently in the bucket, after refill. Does not debit.
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn lock_bucket(&self) -> MutexGuard<'_, Bucket> {
        // The guarded section cannot panic halfway through an update.
        match self.bucket.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;
    }
}
