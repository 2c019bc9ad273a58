//! Prometheus counters for ingress and delivery outcomes.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, register_histogram_vec,
    register_int_counter_vec,
};

use crate::models::status::Channel;

const METRIC_PREFIX: &str = "notification_relay";

lazy_static! {
    /// Ingress submissions by outcome (accepted, rejected, error)
    pub static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_requests_total", METRIC_PREFIX),
        "Notification requests received by the gateway",
        &["outcome"]
    )
    .unwrap();

    /// Worker outcomes per channel
    pub static ref DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Delivery task outcomes",
        &["channel", "outcome"]
    )
    .unwrap();

    pub static ref STATUS_FALLBACK_MATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_status_fallback_matches_total", METRIC_PREFIX),
        "Status updates resolved by content match because the task carried no id",
        &["channel"]
    )
    .unwrap();

    pub static ref SEND_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        format!("{}_send_duration_seconds", METRIC_PREFIX),
        "Latency of the external send call",
        &["channel"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();
}

pub fn record_request(outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_delivery(channel: Channel, outcome: &str) {
    DELIVERIES_TOTAL
        .with_label_values(&[channel.as_str(), outcome])
        .inc();
}

pub fn record_fallback_match(channel: Channel) {
    STATUS_FALLBACK_MATCHES_TOTAL
        .with_label_values(&[channel.as_str()])
        .inc();
}

pub fn observe_send_duration(channel: Channel, seconds: f64) {
    SEND_DURATION_SECONDS
        .with_label_values(&[channel.as_str()])
        .observe(seconds);
}

/// Encode every registered metric in the text exposition format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_recorded_delivery_outcomes() {
        record_delivery(Channel::Email, "sent");
        record_fallback_match(Channel::Email);

        let output = encode_metrics().unwrap();

        assert!(output.contains(r#"notification_relay_deliveries_total{channel="email",outcome="sent"}"#));
        assert!(output.contains(r#"notification_relay_status_fallback_matches_total{channel="email"}"#));
    }
}
