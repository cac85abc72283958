use std::sync::LazyLock;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// A single point-in-time observation handed to a [`MetricSink`]. Mirrors
/// the fields the original source's `MetricData` recorded
/// (`policy_id`, `resource_id`, `action`, `status`, `duration`).
///
/// `action` is one of `violation_detected` / `violation_warning` /
/// `remediation` / `immediate_remediation`; `status` is one of `pending` /
/// `warning` / `success` / `failed` (spec §6).
#[derive(Debug, Clone)]
pub struct Metric {
    pub policy_id: String,
    pub resource_id: String,
    pub action: &'static str,
    pub status: &'static str,
    pub duration_seconds: Option<f64>,
}

pub trait MetricSink: Send + Sync {
    fn record(&self, metric: &Metric);
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static EVALUATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "policy_evaluations_total",
            "Total policy evaluation cycles",
        ),
        &["policy_id"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

static EVALUATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "policy_evaluation_errors_total",
            "Total policy evaluation errors",
        ),
        &["policy_id"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

static REMEDIATION_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        Opts::new(
            "policy_remediation_total",
            "Remediation attempts by action and status",
        ),
        &["policy_id", "action", "status"],
    )
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

static REMEDIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let h = Histogram::with_opts(HistogramOpts::new(
        "policy_remediation_duration_seconds",
        "Duration of remediation apply calls in seconds",
    ))
    .expect("metric definition is valid");
    REGISTRY
        .register(Box::new(h.clone()))
        .expect("metric not yet registered");
    h
});

/// Force all metric statics to register so they show up on `/metrics`
/// before the first relevant event occurs, matching the teacher's
/// `LazyLock::force` calls at startup.
pub fn force_init() {
    LazyLock::force(&EVALUATIONS_TOTAL);
    LazyLock::force(&EVALUATION_ERRORS_TOTAL);
    LazyLock::force(&REMEDIATION_TOTAL);
    LazyLock::force(&REMEDIATION_DURATION);
}

/// Record one scheduler tick's outcome for `policy_id` (spec §4.6 / §7:
/// a resource-list failure is logged and counted, never surfaced as a
/// `Metric` through the per-remediation [`MetricSink`] since it isn't one
/// of that sink's four action kinds).
pub fn record_evaluation_tick(policy_id: &str, succeeded: bool) {
    EVALUATIONS_TOTAL.with_label_values(&[policy_id]).inc();
    if !succeeded {
        EVALUATION_ERRORS_TOTAL.with_label_values(&[policy_id]).inc();
    }
}

/// Render the current registry in Prometheus text exposition format.
pub fn gather_text() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Default sink: records onto the process-wide Prometheus registry.
pub struct PrometheusMetricSink;

impl MetricSink for PrometheusMetricSink {
    fn record(&self, metric: &Metric) {
        REMEDIATION_TOTAL
            .with_label_values(&[&metric.policy_id, metric.action, metric.status])
            .inc();
        if let Some(duration) = metric.duration_seconds {
            REMEDIATION_DURATION.observe(duration);
        }
    }
}
