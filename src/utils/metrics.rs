use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency samples kept for avg/percentiles; older samples are dropped
pub const LATENCY_WINDOW: usize = 1024;

/// In-process metrics collector.
///
/// Tracks generation outcomes, adapter latency and image materialization.
/// Thread-safe and cheap to clone; every clone shares the same counters.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Generation Metrics
    generations_total: AtomicUsize,
    generations_succeeded: AtomicUsize,
    generations_failed: AtomicUsize,
    validation_rejections: AtomicUsize,

    // Face swap Metrics
    face_swaps_total: AtomicUsize,
    face_swaps_succeeded: AtomicUsize,

    // Adapter Metrics
    adapter_latency_ms: RwLock<VecDeque<u64>>,

    // Materialization Metrics
    images_materialized: AtomicUsize,
    images_fallback: AtomicUsize,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                generations_total: AtomicUsize::new(0),
                generations_succeeded: AtomicUsize::new(0),
                generations_failed: AtomicUsize::new(0),
                validation_rejections: AtomicUsize::new(0),
                face_swaps_total: AtomicUsize::new(0),
                face_swaps_succeeded: AtomicUsize::new(0),
                adapter_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                images_materialized: AtomicUsize::new(0),
                images_fallback: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Generation Metrics
    pub fn record_generation(&self, success: bool, adapter_duration: Duration) {
        self.inner.generations_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.generations_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.generations_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.record_adapter_latency(adapter_duration);
    }

    pub fn record_validation_rejection(&self) {
        self.inner.validation_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_face_swap(&self, success: bool, adapter_duration: Duration) {
        self.inner.face_swaps_total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.inner.face_swaps_succeeded.fetch_add(1, Ordering::Relaxed);
        }
        self.record_adapter_latency(adapter_duration);
    }

    fn record_adapter_latency(&self, duration: Duration) {
        let mut samples = self.inner.adapter_latency_ms.write();
        if samples.len() == LATENCY_WINDOW {
            samples.pop_front();
        }
        samples.push_back(duration.as_millis() as u64);
    }

    // Materialization Metrics
    pub fn record_image_materialized(&self) {
        self.inner.images_materialized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_image_fallback(&self) {
        self.inner.images_fallback.fetch_add(1, Ordering::Relaxed);
    }

    // Endpoint Metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn endpoint_requests(&self, endpoint: &str) -> usize {
        self.inner
            .endpoint_counters
            .get(endpoint)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency: Vec<u64> = self.inner.adapter_latency_ms.read().iter().copied().collect();
        let adapter_latency_avg_ms = avg(&latency);
        let adapter_latency_p50_ms = percentile(&latency, 0.5);
        let adapter_latency_p95_ms = percentile(&latency, 0.95);

        MetricsSnapshot {
            generations_total: self.inner.generations_total.load(Ordering::Relaxed),
            generations_succeeded: self.inner.generations_succeeded.load(Ordering::Relaxed),
            generations_failed: self.inner.generations_failed.load(Ordering::Relaxed),
            validation_rejections: self.inner.validation_rejections.load(Ordering::Relaxed),
            face_swaps_total: self.inner.face_swaps_total.load(Ordering::Relaxed),
            face_swaps_succeeded: self.inner.face_swaps_succeeded.load(Ordering::Relaxed),
            adapter_latency_avg_ms,
            adapter_latency_p50_ms,
            adapter_latency_p95_ms,
            images_materialized: self.inner.images_materialized.load(Ordering::Relaxed),
            images_fallback: self.inner.images_fallback.load(Ordering::Relaxed),
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP generations_total Total number of generation requests that reached the API
# TYPE generations_total counter
generations_total {{}} {}

# HELP generations_succeeded Number of successful generations
# TYPE generations_succeeded counter
generations_succeeded {{}} {}

# HELP generations_failed Number of failed generations
# TYPE generations_failed counter
generations_failed {{}} {}

# HELP validation_rejections_total Uploads rejected before reaching the API
# TYPE validation_rejections_total counter
validation_rejections_total {{}} {}

# HELP face_swaps_total Total number of face swap requests that reached the API
# TYPE face_swaps_total counter
face_swaps_total {{}} {}

# HELP adapter_latency_avg_ms Average generation API latency in milliseconds
# TYPE adapter_latency_avg_ms gauge
adapter_latency_avg_ms {{}} {}

# HELP images_materialized_total Result images stored locally
# TYPE images_materialized_total counter
images_materialized_total {{}} {}

# HELP images_fallback_total Result images left as remote URLs after a failed download
# TYPE images_fallback_total counter
images_fallback_total {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.generations_total,
            snapshot.generations_succeeded,
            snapshot.generations_failed,
            snapshot.validation_rejections,
            snapshot.face_swaps_total,
            snapshot.adapter_latency_avg_ms,
            snapshot.images_materialized,
            snapshot.images_fallback,
            snapshot.uptime_seconds,
        );

        let mut endpoints: Vec<(String, usize)> = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        endpoints.sort();

        if !endpoints.is_empty() {
            out.push_str("\n# HELP endpoint_requests_total Requests per endpoint\n");
            out.push_str("# TYPE endpoint_requests_total counter\n");
            for (endpoint, count) in endpoints {
                out.push_str(&format!(
                    "endpoint_requests_total {{endpoint=\"{}\"}} {}\n",
                    endpoint, count
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
    pub generations_total: usize,
    pub generations_succeeded: usize,
    pub generations_failed: usize,
    pub validation_rejections: usize,
    pub face_swaps_total: usize,
    pub face_swaps_succeeded: usize,
    pub adapter_latency_avg_ms: u64,
    pub adapter_latency_p50_ms: u64,
    pub adapter_latency_p95_ms: u64,
    pub images_materialized: usize,
    pub images_fallback: usize,
    pub uptime_seconds: u64,
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

        metrics.record_generation(true, Duration::from_millis(100));
        metrics.record_generation(false, Duration::from_millis(300));
        metrics.record_validation_rejection();
        metrics.record_image_materialized();
        metrics.record_image_fallback();
        metrics.record_face_swap(true, Duration::from_millis(200));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.generations_total, 2);
        assert_eq!(snapshot.generations_succeeded, 1);
        assert_eq!(snapshot.generations_failed, 1);
        assert_eq!(snapshot.validation_rejections, 1);
        assert_eq!(snapshot.images_materialized, 1);
        assert_eq!(snapshot.images_fallback, 1);
        assert_eq!(snapshot.face_swaps_total, 1);
        assert_eq!(snapshot.face_swaps_succeeded, 1);
        assert_eq!(snapshot.adapter_latency_avg_ms, 200);
        assert_eq!(snapshot.adapter_latency_p50_ms, 200);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let metrics = Metrics::new();
        for _ in 0..LATENCY_WINDOW {
            metrics.record_generation(true, Duration::from_millis(10));
        }
        for _ in 0..LATENCY_WINDOW {
            metrics.record_generation(true, Duration::from_millis(50));
        }

        assert_eq!(metrics.inner.adapter_latency_ms.read().len(), LATENCY_WINDOW);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.adapter_latency_avg_ms, 50);
        assert_eq!(snapshot.adapter_latency_p50_ms, 50);
        assert_eq!(snapshot.generations_total, 2 * LATENCY_WINDOW);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = Metrics::new();
        let clone = metrics.clone();
        clone.record_endpoint_request("/generate");
        clone.record_endpoint_request("/generate");
        assert_eq!(metrics.endpoint_requests("/generate"), 2);
        assert_eq!(metrics.endpoint_requests("/stats"), 0);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_generation(true, Duration::from_millis(100));
        metrics.record_endpoint_request("/health");

        let prometheus = metrics.to_prometheus();
        assert!(prometheus.contains("generations_total {} 1"));
        assert!(prometheus.contains("generations_succeeded {} 1"));
        assert!(prometheus.contains("endpoint_requests_total {endpoint=\"/health\"} 1"));
    }
}
