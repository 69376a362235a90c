//! Prometheus metrics for store operations and watches.
//!
//! All collectors live in a dedicated [`REGISTRY`]; [`gather_metrics`]
//! renders it in the text exposition format for whatever endpoint the
//! embedding service exposes.


use std::time::Instant;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::trace;

use crate::Error;
use crate::Result;

lazy_static! {
    pub static ref OPERATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("dstore_operations_total", "Store operations by outcome"),
        &["operation", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref OPERATION_DURATION_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("dstore_operation_duration_ms", "Store operation latency in ms")
            .buckets(exponential_buckets(0.5, 2.0, 14).expect("valid buckets")),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref REVISION_CONFLICTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("dstore_revision_conflicts_total", "Fenced writes rejected by the coordinator"),
        &["operation"]
    )
    .expect("metric can not be created");

    pub static ref WATCH_EVENTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("dstore_watch_events_total", "Watch events delivered by type"),
        &["event_type"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_WATCHERS: IntGauge =
        IntGauge::new("dstore_active_watchers", "Running watch listeners")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = build_registry();
}

fn build_registry() -> Registry {
    let registry = Registry::new();
    registry
        .register(Box::new(OPERATIONS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(OPERATION_DURATION_MS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(REVISION_CONFLICTS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(WATCH_EVENTS_TOTAL.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACTIVE_WATCHERS.clone()))
        .expect("collector can be registered");
    registry
}

/// Renders every store metric in the Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Metrics(prometheus::Error::Msg(e.to_string())))
}

pub(crate) fn outcome_label(err: &Error) -> &'static str {
    match err {
        Error::AlreadyExists { .. } => "already_exists",
        Error::NotFound { .. } => "not_found",
        Error::InvalidKey { .. } => "invalid_key",
        Error::Object(_) => "object_error",
        Error::RetriesExhausted { .. } => "retries_exhausted",
        Error::Timeout { .. } => "timeout",
        Error::Coordinator(_) => "coordinator_error",
        Error::Config(_) | Error::Metrics(_) => "internal_error",
    }
}

/// Records latency and outcome of one store operation.
///
/// A timer dropped before [`observe`](OperationTimer::observe) belongs to a
/// future that was cancelled and is counted with outcome `cancelled`.
pub(crate) struct OperationTimer {
    start: Instant,
    operation: &'static str,
    recorded: bool,
}

impl OperationTimer {
    pub(crate) fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
            recorded: false,
        }
    }

    pub(crate) fn observe<T>(
        mut self,
        result: &Result<T>,
    ) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => outcome_label(e),
        };
        self.record(outcome);
    }

    fn record(
        &mut self,
        outcome: &'static str,
    ) {
        self.recorded = true;
        let elapsed = self.start.elapsed();
        OPERATION_DURATION_MS
            .with_label_values(&[self.operation])
            .observe(elapsed.as_secs_f64() * 1000.0);
        OPERATIONS_TOTAL.with_label_values(&[self.operation, outcome]).inc();
        trace!(target: "timing", "[TIMING] {} ({}) took {} ms", self.operation, outcome, elapsed.as_millis());
    }
}

impl Drop for OperationTimer {
    fn drop(&mut self) {
        if !self.recorded {
            self.record("cancelled");
        }
    }
}

/// Holds a gauge incremented for as long as the guard lives
pub(crate) struct GaugeGuard {
    gauge: IntGauge,
}

impl GaugeGuard {
    pub(crate) fn new(gauge: &IntGauge) -> Self {
        gauge.inc();
        Self { gauge: gauge.clone() }
    }
}

impl Drop for GaugeGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
