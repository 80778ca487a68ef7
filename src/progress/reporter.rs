//! Progress reporter implementation
//!
//! Uses indicatif for a trial progress bar with:
//! - Warm-up spinner phase
//! - Timed trial count
//! - Last trial throughput in the message

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Progress reporter for benchmark trials
pub struct ProgressReporter {
    /// Trial progress bar
    bar: ProgressBar,
    /// Start time
    start_time: Instant,
    /// Total timed trials
    total_trials: AtomicU64,
    /// Completed timed trials
    trials_done: AtomicU64,
    /// Completed warm-up multiplies
    warmups_done: AtomicU64,
    /// Is progress enabled
    enabled: AtomicBool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} {prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} trials {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix("Bench");
        bar.enable_steady_tick(Duration::from_millis(120));

        Self {
            bar,
            start_time: Instant::now(),
            total_trials: AtomicU64::new(0),
            trials_done: AtomicU64::new(0),
            warmups_done: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
        }
    }

    /// Create a disabled progress reporter (for quiet mode)
    pub fn disabled() -> Self {
        let reporter = Self::new();
        reporter.enabled.store(false, Ordering::SeqCst);
        reporter.bar.disable_steady_tick();
        reporter.bar.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Set total timed trials
    pub fn set_total_trials(&self, total: u64) {
        self.total_trials.store(total, Ordering::Relaxed);
        self.bar.set_length(total);
    }

    /// Record one finished warm-up multiply
    pub fn warmup_done(&self) {
        let n = self.warmups_done.fetch_add(1, Ordering::Relaxed) + 1;
        self.bar.set_message(format!("(warm-up {})", n));
    }

    /// Record one finished timed trial
    pub fn trial_done(&self, gflops: f64) {
        self.trials_done.fetch_add(1, Ordering::Relaxed);
        self.bar.set_message(format!("{:.2} GFLOPS", gflops));
        self.bar.inc(1);
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.bar.finish_with_message(format!("✓ {}", message));
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.bar.abandon_with_message(format!("✗ {}", message));
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get progress summary
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary {
            total_trials: self.total_trials.load(Ordering::Relaxed),
            trials_done: self.trials_done.load(Ordering::Relaxed),
            warmups_done: self.warmups_done.load(Ordering::Relaxed),
            elapsed: self.elapsed(),
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Progress summary
#[derive(Debug, Clone)]
pub struct ProgressSummary {
    /// Total timed trials
    pub total_trials: u64,
    /// Completed timed trials
    pub trials_done: u64,
    /// Completed warm-up multiplies
    pub warmups_done: u64,
    /// Elapsed time
    pub elapsed: Duration,
}

impl ProgressSummary {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total_trials == 0 {
            0.0
        } else {
            (self.trials_done as f64 / self.total_trials as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_reporter() {
        let reporter = ProgressReporter::disabled();
        assert!(!reporter.is_enabled());

        reporter.set_total_trials(4);
        reporter.warmup_done();
        reporter.warmup_done();
        reporter.trial_done(10.0);
        reporter.trial_done(12.5);

        let summary = reporter.summary();
        assert_eq!(summary.warmups_done, 2);
        assert_eq!(summary.trials_done, 2);
        assert_eq!(summary.percentage(), 50.0);
    }

    #[test]
    fn test_empty_progress_percentage() {
        let reporter = ProgressReporter::disabled();
        assert_eq!(reporter.summary().percentage(), 0.0);
    }
}
