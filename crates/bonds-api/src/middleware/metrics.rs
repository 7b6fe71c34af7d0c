//! Request counters reported on `/health`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide HTTP counters
#[derive(Debug, Default)]
pub struct ApiMetrics {
    pub requests_total: AtomicU64,
    pub requests_success: AtomicU64,
    pub client_errors: AtomicU64,
    pub server_errors: AtomicU64,
    pub rate_limited: AtomicU64,

    // Latency tracking
    pub total_latency_ms: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total: u64,
    pub success: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub rate_limited: u64,
    pub average_latency_ms: f64,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished request by its status code
    pub fn record_request(&self, status: u16, latency_ms: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        match status {
            500..=599 => self.server_errors.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.client_errors.fetch_add(1, Ordering::Relaxed),
            _ => self.requests_success.fetch_add(1, Ordering::Relaxed),
        };
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_rate_limit_rejection(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.requests_total.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total: self.requests_total.load(Ordering::Relaxed),
            success: self.requests_success.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            average_latency_ms: self.average_latency_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = ApiMetrics::new();
        metrics.record_request(200, 100);
        metrics.record_request(201, 200);
        metrics.record_request(404, 50);
        metrics.record_request(500, 10);

        let snap = metrics.snapshot();
        assert_eq!(snap.total, 4);
        assert_eq!(snap.success, 2);
        assert_eq!(snap.client_errors, 1);
        assert_eq!(snap.server_errors, 1);
    }

    #[test]
    fn test_average_latency() {
        let metrics = ApiMetrics::new();
        assert_eq!(metrics.average_latency_ms(), 0.0);
        metrics.record_request(200, 100);
        metrics.record_request(200, 300);
        assert!((metrics.average_latency_ms() - 200.0).abs() < 0.01);
    }
}
