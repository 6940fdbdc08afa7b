//! Scoring metrics: throughput, latency, class distribution and failures.

use crate::error::ErrorKind;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for a scoring run
pub struct ScoringMetrics {
    /// Records that produced a class index
    pub records_scored: AtomicU64,
    /// Scored records whose label was known
    pub records_labeled: AtomicU64,
    /// Labeled records predicted correctly
    pub correct_predictions: AtomicU64,
    /// Failed records by error kind
    failures: RwLock<BTreeMap<ErrorKind, u64>>,
    /// Predictions per class index
    predictions_by_class: RwLock<BTreeMap<usize, u64>>,
    /// End-to-end latency per record (in microseconds)
    latencies: RwLock<Vec<u64>>,
    start_time: Instant,
}

impl ScoringMetrics {
    pub fn new() -> Self {
        Self {
            records_scored: AtomicU64::new(0),
            records_labeled: AtomicU64::new(0),
            correct_predictions: AtomicU64::new(0),
            failures: RwLock::new(BTreeMap::new()),
            predictions_by_class: RwLock::new(BTreeMap::new()),
            latencies: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a successful prediction and, when known, its true class
    pub fn record_prediction(&self, latency: Duration, class: usize, truth: Option<usize>) {
        self.records_scored.fetch_add(1, Ordering::Relaxed);

        if let Some(truth) = truth {
            self.records_labeled.fetch_add(1, Ordering::Relaxed);
            if truth == class {
                self.correct_predictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Ok(mut by_class) = self.predictions_by_class.write() {
            *by_class.entry(class).or_insert(0) += 1;
        }

        if let Ok(mut times) = self.latencies.write() {
            times.push(latency.as_micros() as u64);
            // Keep only last 10000
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    pub fn record_failure(&self, kind: ErrorKind) {
        if let Ok(mut failures) = self.failures.write() {
            *failures.entry(kind).or_insert(0) += 1;
        }
    }

    pub fn failures(&self) -> BTreeMap<ErrorKind, u64> {
        self.failures.read().map(|f| f.clone()).unwrap_or_default()
    }

    pub fn failure_count(&self) -> u64 {
        self.failures().values().sum()
    }

    pub fn predictions_by_class(&self) -> BTreeMap<usize, u64> {
        self.predictions_by_class
            .read()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    /// Share of labeled records predicted correctly, if any were labeled
    pub fn accuracy(&self) -> Option<f64> {
        let labeled = self.records_labeled.load(Ordering::Relaxed);
        if labeled == 0 {
            return None;
        }
        Some(self.correct_predictions.load(Ordering::Relaxed) as f64 / labeled as f64)
    }

    /// Get latency statistics
    pub fn latency_stats(&self) -> LatencyStats {
        let mut sorted = match self.latencies.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return LatencyStats::default(),
        };
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        LatencyStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Records per second since creation
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.records_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let scored = self.records_scored.load(Ordering::Relaxed);
        let failed = self.failure_count();
        let latency = self.latency_stats();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║              MODEL SCORING - METRICS SUMMARY                 ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Records Scored: {:>8}  │  Throughput: {:>8.1} rec/s       ║",
            scored,
            self.throughput()
        );
        info!("║ Records Failed: {:>8}                                     ║", failed);
        if let Some(accuracy) = self.accuracy() {
            info!(
                "║ Accuracy: {:>6.2}% ({} of {} labeled)                   ║",
                accuracy * 100.0,
                self.correct_predictions.load(Ordering::Relaxed),
                self.records_labeled.load(Ordering::Relaxed)
            );
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Latency (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5}       ║",
            latency.mean_us, latency.p50_us, latency.p95_us, latency.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Predictions by Class:                                        ║");
        for (class, count) in self.predictions_by_class() {
            let pct = if scored > 0 {
                (count as f64 / scored as f64) * 100.0
            } else {
                0.0
            };
            let bar: String = "█".repeat(((pct / 5.0) as usize).min(20));
            info!("║   class {:>3}: {:>6} ({:>5.1}%) {}", class, count, pct, bar);
        }
        let failures = self.failures();
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by Kind:                                            ║");
            for (kind, count) in failures {
                info!("║   {:24}: {:>6}", kind.as_str(), count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for ScoringMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LatencyStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
