//! Prometheus request metrics.
//!
//! The recorder is built per application instead of being installed
//! globally, so every router (and every test server) owns its registry.
//!
//! Exposed series:
//! - `catalog_api_requests_total{status="success"|"error"}`
//! - `catalog_api_requests_summary{service="duration"|"size"}` with
//!   0.5/0.9/0.99 quantiles

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::HttpBody,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{
    Counter, Histogram, Key, KeyName, Label, Level, Metadata, Recorder, SharedString,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const REQUESTS_TOTAL: &str = "catalog_api_requests_total";
pub const REQUESTS_SUMMARY: &str = "catalog_api_requests_summary";

const QUANTILES: &[f64] = &[0.5, 0.9, 0.99];

pub struct Metrics {
    handle: PrometheusHandle,
    success: Counter,
    error: Counter,
    duration: Histogram,
    size: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_quantiles(QUANTILES)?
            .build_recorder();

        recorder.describe_counter(
            KeyName::from(REQUESTS_TOTAL),
            None,
            SharedString::from("How many API requests processed, partitioned by status"),
        );
        recorder.describe_histogram(
            KeyName::from(REQUESTS_SUMMARY),
            None,
            SharedString::from("Duration (seconds) and response size (bytes) of API requests"),
        );

        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));
        let counter = |status: &'static str| {
            let key = Key::from_parts(REQUESTS_TOTAL, vec![Label::new("status", status)]);
            recorder.register_counter(&key, &metadata)
        };
        let histogram = |service: &'static str| {
            let key = Key::from_parts(REQUESTS_SUMMARY, vec![Label::new("service", service)]);
            recorder.register_histogram(&key, &metadata)
        };

        Ok(Self {
            success: counter("success"),
            error: counter("error"),
            duration: histogram("duration"),
            size: histogram("size"),
            handle: recorder.handle(),
        })
    }

    /// Record one finished request.
    pub fn observe(&self, status: StatusCode, elapsed: Duration, content_length: Option<u64>) {
        self.duration.record(elapsed.as_secs_f64());
        if let Some(size) = content_length {
            self.size.record(size as f64);
        }
        if status.is_success() {
            self.success.increment(1);
        } else {
            self.error.increment(1);
        }
    }

    /// Prometheus text exposition of every series.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Middleware recording duration, size and outcome of every request.
pub async fn track_requests(metrics: Arc<Metrics>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed = start.elapsed();

    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.body().size_hint().exact());

    metrics.observe(response.status(), elapsed, content_length);
    response
}

/// `GET /metrics`
pub async fn render_metrics(State(metrics): State<Arc<Metrics>>) -> Response {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_partitions_by_status() {
        let metrics = Metrics::new().unwrap();
        metrics.observe(StatusCode::CREATED, Duration::from_millis(5), Some(42));
        metrics.observe(StatusCode::OK, Duration::from_millis(1), None);
        metrics.observe(StatusCode::NOT_FOUND, Duration::from_millis(2), Some(60));

        let text = metrics.render();
        assert!(text.contains(r#"catalog_api_requests_total{status="success"} 2"#), "{text}");
        assert!(text.contains(r#"catalog_api_requests_total{status="error"} 1"#), "{text}");
        assert!(text.contains(r#"catalog_api_requests_summary_count{service="duration"} 3"#), "{text}");
        assert!(text.contains(r#"catalog_api_requests_summary_count{service="size"} 2"#), "{text}");
    }

    #[test]
    fn test_registries_are_independent() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        first.observe(StatusCode::OK, Duration::ZERO, None);
        assert!(!second
            .render()
            .contains(r#"catalog_api_requests_total{status="success"} 1"#));
    }
}
