//! Progress tracking utilities
//!
//! A thread-safe counter that logs each time the number of processed records crosses a
//! multiple of its interval. Extractors share one tracker across their partitions.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::logging::format_count;

/// Thread-safe progress tracker for logging progress at regular intervals.
///
/// # Example
/// ```
/// use nanoget_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Processed reads").with_interval(100);
/// for _ in 0..250 {
///     tracker.record(1); // logs at 100 and 200
/// }
/// assert_eq!(tracker.finish(), 250);
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Create a new progress tracker with a default interval of 100,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 100_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Set the logging interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `additional` to the count, logging every interval boundary crossed.
    pub fn record(&self, additional: u64) {
        if additional == 0 {
            return;
        }
        let prev = self.count.fetch_add(additional, Ordering::Relaxed);
        let new_count = prev + additional;
        for i in (prev / self.interval + 1)..=(new_count / self.interval) {
            info!("{} {}", self.message, format_count(i * self.interval));
        }
    }

    /// The current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Logs the final count unless it was just logged, and returns it.
    pub fn finish(&self) -> u64 {
        let count = self.count();
        if count % self.interval != 0 {
            info!("{} {} (complete)", self.message, format_count(count));
        }
        count
    }
}
