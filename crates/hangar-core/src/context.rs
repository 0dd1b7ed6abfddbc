// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

use crate::provider::ProviderError;
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Per-run shared state for every outbound provider call.
///
/// Collector and resolver calls all pass through [`RunContext::call`], which
/// enforces the minimum inter-call delay on a single clock and refuses to
/// issue anything once a provider has reported its quota as exhausted.
/// A fresh context is created at the start of each run, so the quota flag
/// never carries over.
#[derive(Debug)]
pub struct RunContext {
    min_interval: Duration,
    last_call_at: Mutex<Option<Instant>>,
    quota_exceeded: AtomicBool,
    calls: AtomicU64,
}

impl RunContext {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call_at: Mutex::new(None),
            quota_exceeded: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    pub fn quota_exceeded(&self) -> bool {
        self.quota_exceeded.load(Ordering::SeqCst)
    }

    pub fn mark_quota_exceeded(&self) {
        if !self.quota_exceeded.swap(true, Ordering::SeqCst) {
            warn!("Provider quota exceeded; remaining lookups for this run are skipped");
        }
    }

    /// Number of outbound calls actually issued so far.
    pub fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Runs one outbound call behind the shared limiter.
    pub fn call<T>(
        &self,
        label: &str,
        f: impl FnOnce() -> Result<T, ProviderError>,
    ) -> Result<T, ProviderError> {
        if self.quota_exceeded() {
            debug!("Skipping call, quota flag set — call={}", label);
            return Err(ProviderError::QuotaExceeded);
        }

        self.throttle();

        // Another worker may have tripped the flag while we waited.
        if self.quota_exceeded() {
            debug!("Skipping call, quota flag set — call={}", label);
            return Err(ProviderError::QuotaExceeded);
        }

        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Outbound call #{} — call={}", n, label);

        let result = f();
        if let Err(ProviderError::QuotaExceeded) = &result {
            self.mark_quota_exceeded();
        }
        result
    }

    /// Waits until `min_interval` has elapsed since the previous call, then
    /// stamps the clock. The lock is held across the wait so concurrent
    /// callers queue up behind each other.
    fn throttle(&self) {
        let mut last = self
            .last_call_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!("Rate limiting — wait_ms={}", wait.as_millis());
                thread::sleep(wait);
            }
        }

        *last = Some(Instant::now());
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(Duration::from_millis(1200))
    }
}
