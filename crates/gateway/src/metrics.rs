use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static STORE_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static VERIFICATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static LOGIN_ATTEMPTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn http_requests_total() -> &'static IntCounterVec {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "lai_gateway_http_requests_total",
                    "Gateway HTTP request count.",
                ),
                &["route", "method", "status"],
            )
            .expect("create lai_gateway_http_requests_total"),
        )
    })
}

fn http_request_duration_seconds() -> &'static HistogramVec {
    HTTP_REQUEST_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "lai_gateway_http_request_duration_seconds",
                    "Gateway HTTP request duration in seconds.",
                )
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
                &["route", "method", "outcome"],
            )
            .expect("create lai_gateway_http_request_duration_seconds"),
        )
    })
}

fn store_operations_total() -> &'static IntCounterVec {
    STORE_OPERATIONS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "lai_gateway_store_operations_total",
                    "Report store operations by outcome.",
                ),
                &["operation", "outcome"],
            )
            .expect("create lai_gateway_store_operations_total"),
        )
    })
}

fn verifications_total() -> &'static IntCounterVec {
    VERIFICATIONS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "lai_gateway_verifications_total",
                    "Public certificate lookups by outcome.",
                ),
                &["outcome"],
            )
            .expect("create lai_gateway_verifications_total"),
        )
    })
}

fn login_attempts_total() -> &'static IntCounterVec {
    LOGIN_ATTEMPTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "lai_gateway_login_attempts_total",
                    "Operator login attempts by outcome.",
                ),
                &["outcome"],
            )
            .expect("create lai_gateway_login_attempts_total"),
        )
    })
}

pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    http_requests_total()
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    http_request_duration_seconds()
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

pub fn observe_store_operation(operation: &str, outcome: &str) {
    store_operations_total()
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn observe_verification(outcome: &str) {
    verifications_total().with_label_values(&[outcome]).inc();
}

pub fn observe_login(outcome: &str) {
    login_attempts_total().with_label_values(&[outcome]).inc();
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let _ = store_operations_total();
    let _ = verifications_total();

    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
