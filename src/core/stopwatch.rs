use std::time::{Duration, Instant};

use tracing::info;

#[derive(Debug, Clone)]
pub struct Split {
    pub name: String,
    pub duration: Duration,
}

/// Wall-clock timer with named splits, used to report where a long
/// optimization campaign spends its time.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    pub splits: Vec<Split>,
    pub name: String,
    pub start_total: Instant,
    pub start_split: Instant,
}

impl Stopwatch {
    pub fn new(name: String) -> Stopwatch {
        let now = Instant::now();
        Stopwatch {
            splits: Vec::default(),
            name,
            start_total: now,
            start_split: now,
        }
    }

    pub fn total_elapsed(&self) -> Duration {
        self.start_total.elapsed()
    }

    pub fn split_elapsed(&self) -> Duration {
        self.start_split.elapsed()
    }

    pub fn record_split(&mut self, name: String) -> Duration {
        let duration = self.split_elapsed();
        self.start_split = Instant::now();
        self.splits.push(Split { name, duration });
        duration
    }

    /// Emits one `info` event for the total and one per split.
    pub fn log_summary(&self) {
        info!(
            stopwatch = %self.name,
            total = ?self.total_elapsed(),
            "stopwatch summary"
        );
        for split in self.splits.iter() {
            info!(stopwatch = %self.name, split = %split.name, duration = ?split.duration);
        }
    }
}
