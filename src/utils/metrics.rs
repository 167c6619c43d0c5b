use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency percentiles are computed over the most recent samples only
const LATENCY_WINDOW: usize = 1024;

/// Metrics collector for the detect-filter-translate pipeline.
///
/// Cheap to clone; every clone shares the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Translator calls
    api_calls_total: AtomicUsize,
    api_calls_success: AtomicUsize,
    api_calls_failed: AtomicUsize,
    api_tokens_input: AtomicU64,
    api_tokens_output: AtomicU64,
    api_latency_ms: RwLock<VecDeque<u64>>,

    // Dispatcher cache
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,

    // Detector-filter
    detections_total: AtomicUsize,
    fragments_kept: AtomicUsize,
    rejections: DashMap<String, AtomicUsize>,

    // Pipeline runs
    pipeline_runs: AtomicUsize,
    pipeline_failures: AtomicUsize,
    pipeline_latency_ms: RwLock<VecDeque<u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                api_calls_total: AtomicUsize::new(0),
                api_calls_success: AtomicUsize::new(0),
                api_calls_failed: AtomicUsize::new(0),
                api_tokens_input: AtomicU64::new(0),
                api_tokens_output: AtomicU64::new(0),
                api_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                cache_hits: AtomicUsize::new(0),
                cache_misses: AtomicUsize::new(0),
                detections_total: AtomicUsize::new(0),
                fragments_kept: AtomicUsize::new(0),
                rejections: DashMap::new(),
                pipeline_runs: AtomicUsize::new(0),
                pipeline_failures: AtomicUsize::new(0),
                pipeline_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                start_time: Instant::now(),
            }),
        }
    }

    // Translator metrics
    pub fn record_api_call(&self, success: bool, duration: Duration, input_tokens: u64, output_tokens: u64) {
        self.inner.api_calls_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.api_calls_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.api_calls_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.api_tokens_input.fetch_add(input_tokens, Ordering::Relaxed);
        self.inner.api_tokens_output.fetch_add(output_tokens, Ordering::Relaxed);
        push_sample(&self.inner.api_latency_ms, duration);
    }

    // Cache metrics
    pub fn record_cache_hit(&self) {
        self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.inner.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    // Detection metrics
    pub fn record_detections(&self, detected: usize, kept: usize) {
        self.inner.detections_total.fetch_add(detected, Ordering::Relaxed);
        self.inner.fragments_kept.fetch_add(kept, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, rule: &str) {
        self.inner.rejections
            .entry(rule.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Pipeline metrics
    pub fn record_pipeline_run(&self, success: bool, duration: Duration) {
        self.inner.pipeline_runs.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.inner.pipeline_failures.fetch_add(1, Ordering::Relaxed);
        }
        push_sample(&self.inner.pipeline_latency_ms, duration);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let api_latency: Vec<u64> = self.inner.api_latency_ms.read().iter().copied().collect();
        let api_latency_avg = avg(&api_latency);
        let api_latency_p50 = percentile(&api_latency, 0.5);
        let api_latency_p95 = percentile(&api_latency, 0.95);
        let api_latency_p99 = percentile(&api_latency, 0.99);

        let pipeline_latency: Vec<u64> = self.inner.pipeline_latency_ms.read().iter().copied().collect();
        let pipeline_latency_avg = avg(&pipeline_latency);

        let cache_hits = self.inner.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.inner.cache_misses.load(Ordering::Relaxed);
        let cache_total = cache_hits + cache_misses;
        let cache_hit_rate = if cache_total > 0 {
            cache_hits as f64 / cache_total as f64
        } else {
            0.0
        };

        let rejections = self
            .inner
            .rejections
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            api_calls_total: self.inner.api_calls_total.load(Ordering::Relaxed),
            api_calls_success: self.inner.api_calls_success.load(Ordering::Relaxed),
            api_calls_failed: self.inner.api_calls_failed.load(Ordering::Relaxed),
            api_tokens_input: self.inner.api_tokens_input.load(Ordering::Relaxed),
            api_tokens_output: self.inner.api_tokens_output.load(Ordering::Relaxed),
            api_latency_avg_ms: api_latency_avg,
            api_latency_p50_ms: api_latency_p50,
            api_latency_p95_ms: api_latency_p95,
            api_latency_p99_ms: api_latency_p99,
            cache_hits,
            cache_misses,
            cache_hit_rate,
            detections_total: self.inner.detections_total.load(Ordering::Relaxed),
            fragments_kept: self.inner.fragments_kept.load(Ordering::Relaxed),
            rejections,
            pipeline_runs: self.inner.pipeline_runs.load(Ordering::Relaxed),
            pipeline_failures: self.inner.pipeline_failures.load(Ordering::Relaxed),
            pipeline_latency_avg_ms: pipeline_latency_avg,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP api_calls_total Total number of translation API calls made
# TYPE api_calls_total counter
api_calls_total {{}} {}

# HELP api_calls_success Number of successful translation API calls
# TYPE api_calls_success counter
api_calls_success {{}} {}

# HELP api_calls_failed Number of failed translation API calls
# TYPE api_calls_failed counter
api_calls_failed {{}} {}

# HELP api_tokens_input_total Total input tokens consumed
# TYPE api_tokens_input_total counter
api_tokens_input_total {{}} {}

# HELP api_tokens_output_total Total output tokens generated
# TYPE api_tokens_output_total counter
api_tokens_output_total {{}} {}

# HELP api_latency_avg_ms Average translation API latency in milliseconds
# TYPE api_latency_avg_ms gauge
api_latency_avg_ms {{}} {}

# HELP cache_hit_rate Share of translate calls answered from the previous frame (0.0 to 1.0)
# TYPE cache_hit_rate gauge
cache_hit_rate {{}} {}

# HELP detections_total Total text detections returned by the detector
# TYPE detections_total counter
detections_total {{}} {}

# HELP fragments_kept_total Detections that passed the noise filter
# TYPE fragments_kept_total counter
fragments_kept_total {{}} {}

# HELP pipeline_runs_total Total pipeline invocations
# TYPE pipeline_runs_total counter
pipeline_runs_total {{}} {}

# HELP pipeline_failures_total Pipeline invocations that returned an error
# TYPE pipeline_failures_total counter
pipeline_failures_total {{}} {}

# HELP pipeline_latency_avg_ms Average end-to-end pipeline latency in milliseconds
# TYPE pipeline_latency_avg_ms gauge
pipeline_latency_avg_ms {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.api_calls_total,
            snapshot.api_calls_success,
            snapshot.api_calls_failed,
            snapshot.api_tokens_input,
            snapshot.api_tokens_output,
            snapshot.api_latency_avg_ms,
            snapshot.cache_hit_rate,
            snapshot.detections_total,
            snapshot.fragments_kept,
            snapshot.pipeline_runs,
            snapshot.pipeline_failures,
            snapshot.pipeline_latency_avg_ms,
            snapshot.uptime_seconds,
        );

        if !snapshot.rejections.is_empty() {
            out.push_str("\n# HELP fragments_rejected_total Detections dropped by each noise rule\n");
            out.push_str("# TYPE fragments_rejected_total counter\n");
            for (rule, count) in &snapshot.rejections {
                out.push_str(&format!(
                    "fragments_rejected_total {{rule=\"{}\"}} {}\n",
                    rule, count
                ));
            }
        }

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub api_calls_total: usize,
    pub api_calls_success: usize,
    pub api_calls_failed: usize,
    pub api_tokens_input: u64,
    pub api_tokens_output: u64,
    pub api_latency_avg_ms: u64,
    pub api_latency_p50_ms: u64,
    pub api_latency_p95_ms: u64,
    pub api_latency_p99_ms: u64,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_hit_rate: f64,
    pub detections_total: usize,
    pub fragments_kept: usize,
    /// Rejection counts keyed by noise rule name
    pub rejections: BTreeMap<String, usize>,
    pub pipeline_runs: usize,
    pub pipeline_failures: usize,
    pub pipeline_latency_avg_ms: u64,
    pub uptime_seconds: u64,
}

fn push_sample(window: &RwLock<VecDeque<u64>>, duration: Duration) {
    let mut samples = window.write();
    if samples.len() == LATENCY_WINDOW {
        samples.pop_front();
    }
    samples.push_back(duration.as_millis() as u64);
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = Metrics::new();

        metrics.record_api_call(true, Duration::from_millis(100), 500, 200);
        metrics.record_api_call(false, Duration::from_millis(50), 0, 0);
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_detections(5, 3);
        metrics.record_rejection("digits_only");
        metrics.record_rejection("digits_only");
        metrics.record_rejection("word_like_token");
        metrics.record_pipeline_run(true, Duration::from_millis(300));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.api_calls_total, 2);
        assert_eq!(snapshot.api_calls_success, 1);
        assert_eq!(snapshot.api_calls_failed, 1);
        assert_eq!(snapshot.api_tokens_input, 500);
        assert_eq!(snapshot.api_tokens_output, 200);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.cache_hit_rate, 0.5);
        assert_eq!(snapshot.detections_total, 5);
        assert_eq!(snapshot.fragments_kept, 3);
        assert_eq!(snapshot.rejections.get("digits_only"), Some(&2));
        assert_eq!(snapshot.rejections.get("word_like_token"), Some(&1));
        assert_eq!(snapshot.pipeline_runs, 1);
        assert_eq!(snapshot.pipeline_failures, 0);
        assert_eq!(snapshot.pipeline_latency_avg_ms, 300);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_api_call(true, Duration::from_millis(100), 500, 200);
        metrics.record_rejection("separated_code");

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("api_calls_total {} 1"));
        assert!(prometheus.contains("api_tokens_input_total {} 500"));
        assert!(prometheus.contains("fragments_rejected_total {rule=\"separated_code\"} 1"));
    }

    #[test]
    fn test_percentile_empty_and_sorted() {
        assert_eq!(percentile(&[], 0.5), 0);
        assert_eq!(percentile(&[30, 10, 20], 0.5), 20);
        assert_eq!(avg(&[10, 20]), 15);
    }

    #[test]
    fn test_latency_window_keeps_recent_samples() {
        let metrics = Metrics::new();
        for _ in 0..LATENCY_WINDOW {
            metrics.record_pipeline_run(true, Duration::from_millis(1000));
            metrics.record_api_call(true, Duration::from_millis(1000), 0, 0);
        }
        for _ in 0..LATENCY_WINDOW {
            metrics.record_pipeline_run(true, Duration::from_millis(10));
            metrics.record_api_call(true, Duration::from_millis(10), 0, 0);
        }

        assert_eq!(metrics.inner.api_latency_ms.read().len(), LATENCY_WINDOW);
        assert_eq!(metrics.inner.pipeline_latency_ms.read().len(), LATENCY_WINDOW);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.pipeline_runs, 2 * LATENCY_WINDOW);
        assert_eq!(snapshot.pipeline_latency_avg_ms, 10);
        assert_eq!(snapshot.api_latency_p99_ms, 10);
    }
}
