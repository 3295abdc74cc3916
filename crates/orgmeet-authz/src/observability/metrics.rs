//! Prometheus metrics for orgmeet-authz

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;
use crate::store::StoreStats;
use crate::types::{Collection, Operation};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

// Service metrics
const METRIC_UPTIME: &str = "orgmeet_authz_uptime_seconds";
const METRIC_INFO: &str = "orgmeet_authz_info";
const METRIC_REQUESTS: &str = "orgmeet_authz_http_requests_total";

// Decision metrics
const METRIC_DECISIONS: &str = "orgmeet_authz_decisions_total";
const METRIC_DECISION_DURATION: &str = "orgmeet_authz_decision_duration_seconds";
const METRIC_DECISION_ERRORS: &str = "orgmeet_authz_decision_errors_total";

// Store metrics
const METRIC_STORE_ENTITIES: &str = "orgmeet_authz_store_entities";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Service uptime in seconds");
    describe_gauge!(METRIC_INFO, "Service information (always 1)");
    describe_counter!(METRIC_REQUESTS, "Total HTTP requests by route and status");

    describe_counter!(
        METRIC_DECISIONS,
        "Authorization decisions by collection, operation and outcome"
    );
    describe_histogram!(METRIC_DECISION_DURATION, "Decision latency in seconds");
    describe_counter!(
        METRIC_DECISION_ERRORS,
        "Checks that failed on store errors"
    );

    describe_gauge!(METRIC_STORE_ENTITIES, "Store entity counts by kind");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

/// Record an HTTP request.
pub fn record_request(route: &str, status: u16) {
    counter!(
        METRIC_REQUESTS,
        "route" => route.to_owned(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record a completed decision; `outcome` is `allow` or a denial code.
pub fn record_decision(
    collection: Collection,
    operation: Operation,
    outcome: &'static str,
    duration: Duration,
) {
    counter!(
        METRIC_DECISIONS,
        "collection" => collection.as_str(),
        "operation" => operation.as_str(),
        "outcome" => outcome,
    )
    .increment(1);

    histogram!(METRIC_DECISION_DURATION, "operation" => operation.as_str())
        .record(duration.as_secs_f64());
}

/// Record a check that could not be decided.
pub fn record_decision_error(collection: Collection, operation: Operation) {
    counter!(
        METRIC_DECISION_ERRORS,
        "collection" => collection.as_str(),
        "operation" => operation.as_str(),
    )
    .increment(1);
}

/// Update store size gauges.
#[allow(clippy::cast_precision_loss)]
pub fn set_store_stats(stats: &StoreStats) {
    gauge!(METRIC_STORE_ENTITIES, "kind" => "users").set(stats.users as f64);
    gauge!(METRIC_STORE_ENTITIES, "kind" => "organizations").set(stats.organizations as f64);
    gauge!(METRIC_STORE_ENTITIES, "kind" => "memberships").set(stats.memberships as f64);
    gauge!(METRIC_STORE_ENTITIES, "kind" => "active_memberships")
        .set(stats.active_memberships as f64);
    gauge!(METRIC_STORE_ENTITIES, "kind" => "records").set(stats.records as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics_without_init() {
        let output = render_metrics();
        assert!(output.is_empty());
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_decision(
            Collection::Meetings,
            Operation::View,
            "allow",
            Duration::from_micros(40),
        );
        record_decision_error(Collection::Votes, Operation::Create);
        record_request("/v1/check", 200);
        set_store_stats(&StoreStats::default());
    }
}
