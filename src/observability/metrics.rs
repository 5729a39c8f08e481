//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_rate_limited_total{limiter}`: rejections by limiter
//! - `guard_token_rejected_total{reason}`: failed access token validations
//! - `guard_account_lockouts_total`: failed logins that set a lock
//! - `guard_store_fallback_total{op}`: shared store calls that degraded

use std::net::SocketAddr;
use std::sync::Once;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;

static DESCRIBE: Once = Once::new();

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint started");
        }
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

fn describe() {
    DESCRIBE.call_once(|| {
        describe_counter!("guard_rate_limited_total", "Requests rejected by a rate limiter");
        describe_counter!("guard_token_rejected_total", "Access tokens that failed validation");
        describe_counter!("guard_account_lockouts_total", "Failed logins that locked an account");
        describe_counter!(
            "guard_store_fallback_total",
            "Shared store calls that fell back to in-process state"
        );
    });
}

pub fn record_rate_limited(limiter: &'static str) {
    counter!("guard_rate_limited_total", "limiter" => limiter).increment(1);
}

pub fn record_token_rejected(reason: &'static str) {
    counter!("guard_token_rejected_total", "reason" => reason).increment(1);
}

pub fn record_account_lockout() {
    counter!("guard_account_lockouts_total").increment(1);
}

pub fn record_store_fallback(op: &'static str) {
    counter!("guard_store_fallback_total", "op" => op).increment(1);
}
