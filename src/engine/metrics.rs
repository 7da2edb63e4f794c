//! Operational metrics for the away-session engine
//!
//! Counters emitted through the `metrics` facade:
//!
//! - `awaybot_messages_recorded_total`: messages counted into the ledger
//! - `awaybot_auto_replies_sent_total`: auto-replies actually dispatched
//! - `awaybot_auto_replies_failed_total`: replies abandoned after the retry budget
//! - `awaybot_sessions_started_total` / `awaybot_sessions_ended_total`
//! - `awaybot_summaries_sent_total`: summaries delivered to the management room

/// Initializes the metrics exporter for Prometheus
///
/// When the `prometheus` feature is enabled, this function sets up the
/// Prometheus metrics exporter to expose metrics on the standard
/// Prometheus endpoint. When disabled, it's a no-op.
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
}
