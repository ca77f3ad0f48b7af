//! Batch scoring metrics and periodic summaries.

use crate::pipeline::ScoredOutcome;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for the scoring pipeline
pub struct PipelineMetrics {
    /// Batches scored successfully
    pub batches_scored: AtomicU64,
    /// Rows across all successful batches
    pub rows_scored: AtomicU64,
    /// Batches rejected with an error
    pub failed_batches: AtomicU64,
    /// Rows the classifier labelled fraud
    pub model_flagged: AtomicU64,
    /// Rows the rule overlay flagged
    pub rule_flagged: AtomicU64,
    /// Failures by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Encoding fallbacks by column
    fallbacks_by_column: RwLock<HashMap<String, u64>>,
    /// Batch processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    pub batches_scored: u64,
    pub rows_scored: u64,
    pub failed_batches: u64,
    pub model_flagged: u64,
    pub rule_flagged: u64,
    pub fallbacks: u64,
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            batches_scored: AtomicU64::new(0),
            rows_scored: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
            model_flagged: AtomicU64::new(0),
            rule_flagged: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            fallbacks_by_column: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            probability_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a successfully scored batch
    pub fn record_batch(&self, processing_time: Duration, outcome: &ScoredOutcome) {
        let summary = &outcome.summary;
        self.batches_scored.fetch_add(1, Ordering::Relaxed);
        self.rows_scored
            .fetch_add(summary.total_rows as u64, Ordering::Relaxed);
        self.model_flagged
            .fetch_add(summary.model_fraud_count as u64, Ordering::Relaxed);
        self.rule_flagged.fetch_add(
            summary.rule_fraud_count.unwrap_or(0) as u64,
            Ordering::Relaxed,
        );

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Ok(mut buckets) = self.probability_buckets.write() {
            for record in &outcome.scored.records {
                let bucket = (record.fraud_probability * 10.0).clamp(0.0, 9.0) as usize;
                buckets[bucket] += 1;
            }
        }

        if !outcome.report.fallbacks.is_empty() {
            if let Ok(mut by_column) = self.fallbacks_by_column.write() {
                for fallback in &outcome.report.fallbacks {
                    *by_column.entry(fallback.column.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    /// Record a rejected batch
    pub fn record_failure(&self, kind: &str) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_scored: self.batches_scored.load(Ordering::Relaxed),
            rows_scored: self.rows_scored.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            model_flagged: self.model_flagged.load(Ordering::Relaxed),
            rule_flagged: self.rule_flagged.load(Ordering::Relaxed),
            fallbacks: self.get_fallbacks_by_column().values().sum(),
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let Ok(times) = self.processing_times.read() else {
            return ProcessingStats::default();
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let pct = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: pct(0.95),
            p99_us: pct(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Rows scored per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.rows_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    pub fn get_fallbacks_by_column(&self) -> HashMap<String, u64> {
        self.fallbacks_by_column
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let snap = self.snapshot();
        let processing = self.get_processing_stats();
        let rate = |n: u64| {
            if snap.rows_scored > 0 {
                n as f64 / snap.rows_scored as f64 * 100.0
            } else {
                0.0
            }
        };

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║            FRAUD BATCH SCORING - METRICS SUMMARY             ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Batches Scored: {:>8}  │  Failed: {:>8}                  ║",
            snap.batches_scored, snap.failed_batches
        );
        info!(
            "║ Rows Scored:    {:>8}  │  Throughput: {:>8.1} rows/s     ║",
            snap.rows_scored,
            self.get_throughput()
        );
        info!(
            "║ Model Flagged:  {:>8} ({:>5.1}%) │ Rule Flagged: {:>8} ({:>5.1}%) ║",
            snap.model_flagged,
            rate(snap.model_flagged),
            snap.rule_flagged,
            rate(snap.rule_flagged)
        );
        info!(
            "║ Batch Time (μs): mean={:>6} p50={:>6} p95={:>6} p99={:>6} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Encoding Fallbacks by Column:                                ║");
        for (column, count) in &self.get_fallbacks_by_column() {
            info!("║   {:20}: {:>8}                                ║", column, count);
        }
        for (kind, count) in &self.get_failures_by_kind() {
            info!("║ Failures ({}): {}", kind, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fraud Probability Distribution:                              ║");
        let dist = self.get_probability_distribution();
        let total: u64 = dist.iter().sum();
        for (i, &count) in dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic metrics summary task
pub struct MetricsReporter {
    metrics: std::sync::Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: std::sync::Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
