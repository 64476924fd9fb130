//! Prometheus metrics for decision observability

use super::decision::Decision;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Engine decision metrics
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total number of point checks
    pub total_requests: u64,

    /// Number of allowed decisions
    pub allowed_decisions: u64,

    /// Number of denied decisions
    pub denied_decisions: u64,

    /// Decisions granted on the elevated path
    pub elevated_decisions: u64,

    /// Listing candidates evaluated
    pub rows_considered: u64,

    /// Listing rows that passed the final filter
    pub rows_visible: u64,

    /// Latency percentiles (p50, p90, p95, p99, p99.9)
    pub latency_p50_ms: f64,
    pub latency_p90_ms: f64,
    pub latency_p95_ms: f64,
    pub latency_p99_ms: f64,
    pub latency_p999_ms: f64,

    /// Average latency
    pub avg_latency_ms: f64,

    /// Fact gathering failures
    pub error_count: u64,
}

impl EngineMetrics {
    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Metrics collector with Prometheus-compatible export
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,

    /// Decision counts keyed by reason code
    reasons: DashMap<&'static str, u64>,

    /// Latency samples for percentile calculation
    latency_samples: Arc<RwLock<Vec<f64>>>,

    max_samples: usize,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EngineMetrics::default())),
            reasons: DashMap::new(),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(10_000))),
            max_samples: 10_000,
        }
    }

    /// Record a point-check decision
    pub async fn record_decision(&self, decision: &Decision) {
        *self.reasons.entry(decision.code()).or_insert(0) += 1;

        let mut metrics = self.metrics.write().await;
        metrics.total_requests += 1;

        if decision.allowed {
            metrics.allowed_decisions += 1;
        } else {
            metrics.denied_decisions += 1;
        }
        if decision.code() == "elevated" {
            metrics.elevated_decisions += 1;
        }
    }

    /// Record the outcome of one listing
    pub async fn record_listing(&self, considered: u64, visible: u64) {
        let mut metrics = self.metrics.write().await;
        metrics.rows_considered += considered;
        metrics.rows_visible += visible;
    }

    /// Record request latency
    pub async fn record_latency(&self, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        // Samples guard is released before the metrics lock is taken
        let mut sorted = {
            let mut samples = self.latency_samples.write().await;
            samples.push(latency_ms);

            if samples.len() > self.max_samples {
                samples.drain(0..1_000);
            }

            samples.clone()
        };
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut metrics = self.metrics.write().await;

        let sum: f64 = sorted.iter().sum();
        metrics.avg_latency_ms = sum / sorted.len() as f64;

        metrics.latency_p50_ms = Self::percentile(&sorted, 0.50);
        metrics.latency_p90_ms = Self::percentile(&sorted, 0.90);
        metrics.latency_p95_ms = Self::percentile(&sorted, 0.95);
        metrics.latency_p99_ms = Self::percentile(&sorted, 0.99);
        metrics.latency_p999_ms = Self::percentile(&sorted, 0.999);
    }

    /// Record a fact gathering failure
    pub async fn record_error(&self) {
        let mut metrics = self.metrics.write().await;
        metrics.error_count += 1;
    }

    /// Count of decisions with the given reason code
    pub fn reason_count(&self, code: &str) -> u64 {
        self.reasons.get(code).map(|count| *count).unwrap_or(0)
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> EngineMetrics {
        self.metrics.read().await.clone()
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        self.latency_samples.write().await.clear();
        self.reasons.clear();

        let mut metrics = self.metrics.write().await;
        *metrics = EngineMetrics::default();
    }

    /// Export metrics in Prometheus format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.metrics.read().await;

        let mut reasons: Vec<(&'static str, u64)> =
            self.reasons.iter().map(|entry| (*entry.key(), *entry.value())).collect();
        reasons.sort_unstable();
        let reason_lines: String = reasons
            .iter()
            .map(|(code, count)| format!("authz_decisions_total{{reason=\"{}\"}} {}\n", code, count))
            .collect();

        format!(
            r#"# HELP authz_requests_total Total number of authorization checks
# TYPE authz_requests_total counter
authz_requests_total {}

# HELP authz_allowed_total Number of allowed decisions
# TYPE authz_allowed_total counter
authz_allowed_total {}

# HELP authz_denied_total Number of denied decisions
# TYPE authz_denied_total counter
authz_denied_total {}

# HELP authz_elevated_total Decisions granted to trusted jobs
# TYPE authz_elevated_total counter
authz_elevated_total {}

# HELP authz_decisions_total Decisions by reason code
# TYPE authz_decisions_total counter
{}
# HELP authz_rows_considered_total Listing candidates evaluated
# TYPE authz_rows_considered_total counter
authz_rows_considered_total {}

# HELP authz_rows_visible_total Listing rows returned
# TYPE authz_rows_visible_total counter
authz_rows_visible_total {}

# HELP authz_latency_seconds Request latency percentiles
# TYPE authz_latency_seconds summary
authz_latency_seconds{{quantile="0.5"}} {}
authz_latency_seconds{{quantile="0.9"}} {}
authz_latency_seconds{{quantile="0.95"}} {}
authz_latency_seconds{{quantile="0.99"}} {}
authz_latency_seconds{{quantile="0.999"}} {}

# HELP authz_errors_total Fact gathering failures
# TYPE authz_errors_total counter
authz_errors_total {}
"#,
            metrics.total_requests,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.elevated_decisions,
            reason_lines,
            metrics.rows_considered,
            metrics.rows_visible,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p90_ms / 1000.0,
            metrics.latency_p95_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
            metrics.latency_p999_ms / 1000.0,
            metrics.error_count,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }

        let idx = ((sorted.len() as f64) * p) as usize;
        let idx = idx.min(sorted.len() - 1);
        sorted[idx]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
