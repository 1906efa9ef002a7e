//! # Prometheus Metrics
//!
//! HTTP metrics (request counts, latency, errors) are pushed by the
//! middleware. Inventory gauges (articles below minimum, requests per
//! status, enrolled staff) are refreshed from the stores on each scrape of
//! `/v1/metrics`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use crate::state::AppState;

const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    articles_low_stock: Gauge,
    material_requests: GaugeVec,
    staff_enrolled: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl Inner {
    fn build() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("inventa_http_requests_total", "HTTP requests served"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "inventa_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "path"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("inventa_http_errors_total", "HTTP responses with status 4xx or 5xx"),
            &["method", "path", "status"],
        )?;
        let articles_low_stock = Gauge::new(
            "inventa_articles_low_stock",
            "Active articles at or below their minimum stock",
        )?;
        let material_requests = GaugeVec::new(
            Opts::new("inventa_material_requests", "Material requests by status code"),
            &["status"],
        )?;
        let staff_enrolled = Gauge::new(
            "inventa_staff_fingerprint_enrolled",
            "Staff members with an enrolled fingerprint",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(articles_low_stock.clone()))?;
        registry.register(Box::new(material_requests.clone()))?;
        registry.register(Box::new(staff_enrolled.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_errors_total,
            articles_low_stock,
            material_requests,
            staff_enrolled,
        })
    }
}

impl ApiMetrics {
    /// Create a metrics instance with a fresh registry.
    pub fn new() -> Self {
        // Metric names and label sets are fixed above, so building cannot fail.
        let inner = Inner::build().expect("static metric definitions are valid");
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Total requests recorded, across all labels.
    pub fn requests(&self) -> u64 {
        sum_counters(&self.inner.http_requests_total)
    }

    /// Total 4xx and 5xx responses recorded, across all labels.
    pub fn errors(&self) -> u64 {
        sum_counters(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
        if status.starts_with('4') || status.starts_with('5') {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status])
                .inc();
        }
    }

    /// Refresh the inventory gauges from the current state.
    pub fn observe_state(&self, state: &AppState) {
        let low = state
            .articles
            .count(|a| a.audit.is_usable() && a.is_low_stock());
        self.inner.articles_low_stock.set(low as f64);

        self.inner.material_requests.reset();
        for request in state.requests.filter(|r| r.audit.is_visible()) {
            let code = state
                .request_statuses
                .get(&request.status_id)
                .map_or_else(|| "UNKNOWN".to_string(), |s| s.code);
            self.inner
                .material_requests
                .with_label_values(&[&code])
                .inc();
        }

        let enrolled = state
            .staff
            .count(|s| !s.deleted && s.fingerprint.is_some());
        self.inner.staff_enrolled.set(enrolled as f64);
    }

    /// Gather every metric in the Prometheus text exposition format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics output is not UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn sum_counters(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace UUID path segments with `{id}` so labels stay bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if uuid::Uuid::parse_str(segment).is_ok() {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(
            &method,
            &path,
            response.status().as_u16(),
            start.elapsed().as_secs_f64(),
        );
    }
    response
}
