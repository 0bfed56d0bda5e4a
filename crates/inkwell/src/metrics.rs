//! Prometheus counters for requests and the comment anti-spam gate.
//!
//! | Metric | Type |
//! |--------|------|
//! | `inkwell_public_requests_total` | Counter |
//! | `inkwell_admin_requests_total` | Counter |
//! | `inkwell_forbidden_responses_total` | Counter |
//! | `inkwell_internal_errors_total` | Counter |
//! | `inkwell_panics_total` | Counter |
//! | `inkwell_comments_accepted_total` | Counter |
//! | `inkwell_captchas_shown_total` | Counter |
//! | `inkwell_comments_rejected_total` | Counter |
//! | `inkwell_request_duration_seconds` | Histogram |

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::time::Duration;
use thiserror::Error;

/// Errors from building or exporting metrics
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register metric: {0}")]
    RegistrationFailed(#[from] prometheus::Error),

    #[error("failed to encode metrics: {0}")]
    EncodingFailed(String),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Runtime counters, shared by every request
pub struct ServerMetrics {
    registry: Registry,
    pub public_requests: IntCounter,
    pub admin_requests: IntCounter,
    pub forbidden_responses: IntCounter,
    pub internal_errors: IntCounter,
    pub panics: IntCounter,
    pub comments_accepted: IntCounter,
    pub captchas_shown: IntCounter,
    pub comments_rejected: IntCounter,
    request_duration: Histogram,
}

impl ServerMetrics {
    /// Create the counters and register them with a fresh registry
    pub fn new() -> MetricsResult<Self> {
        let registry = Registry::new();
        let counter = |name: &str, help: &str| -> MetricsResult<IntCounter> {
            let counter = IntCounter::new(name, help)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        let public_requests = counter("inkwell_public_requests_total", "Requests to public pages")?;
        let admin_requests = counter("inkwell_admin_requests_total", "Requests under /admin")?;
        let forbidden_responses =
            counter("inkwell_forbidden_responses_total", "Admin requests without a login")?;
        let internal_errors = counter("inkwell_internal_errors_total", "Responses with a 5xx status")?;
        let panics = counter("inkwell_panics_total", "Handler panics turned into 500s")?;
        let comments_accepted = counter("inkwell_comments_accepted_total", "Comments published")?;
        let captchas_shown =
            counter("inkwell_captchas_shown_total", "Submissions answered with a CAPTCHA")?;
        let comments_rejected =
            counter("inkwell_comments_rejected_total", "Submissions with a wrong CAPTCHA answer")?;

        // 0.1 ms doubling up to ~3.3 s
        let request_duration = Histogram::with_opts(
            HistogramOpts::new("inkwell_request_duration_seconds", "Request handling latency")
                .buckets(prometheus::exponential_buckets(1e-4, 2.0, 16)?),
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            public_requests,
            admin_requests,
            forbidden_responses,
            internal_errors,
            panics,
            comments_accepted,
            captchas_shown,
            comments_rejected,
            request_duration,
        })
    }

    /// Record one request's latency
    pub fn observe_latency(&self, elapsed: Duration) {
        self.request_duration.observe(elapsed.as_secs_f64());
    }

    /// Render every metric in the Prometheus text exposition format
    pub fn encode_text(&self) -> MetricsResult<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::EncodingFailed(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::EncodingFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = ServerMetrics::new().unwrap();
        assert_eq!(metrics.public_requests.get(), 0);
        assert_eq!(metrics.comments_rejected.get(), 0);
    }

    #[test]
    fn test_registries_are_independent() {
        let first = ServerMetrics::new().unwrap();
        let second = ServerMetrics::new().unwrap();
        first.panics.inc();
        assert_eq!(first.panics.get(), 1);
        assert_eq!(second.panics.get(), 0);
    }

    #[test]
    fn test_encode_text() {
        let metrics = ServerMetrics::new().unwrap();
        metrics.panics.inc();
        metrics.observe_latency(Duration::from_micros(150));
        metrics.observe_latency(Duration::from_secs(60));

        let text = metrics.encode_text().unwrap();
        assert!(text.contains("# TYPE inkwell_panics_total counter"));
        assert!(text.contains("inkwell_panics_total 1"));
        assert!(text.contains("# TYPE inkwell_request_duration_seconds histogram"));
        assert!(text.contains("inkwell_request_duration_seconds_bucket{le=\"0.0001\"} 0"));
        assert!(text.contains("inkwell_request_duration_seconds_bucket{le=\"0.0002\"} 1"));
        assert!(text.contains("inkwell_request_duration_seconds_bucket{le=\"+Inf\"} 2"));
        assert!(text.contains("inkwell_request_duration_seconds_count 2"));
    }
}
