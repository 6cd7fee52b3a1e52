// prometheus exporter setup

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub const ROWS_SENT_TOTAL: &str = "replicator_rows_sent_total";
pub const OUTLIER_ROWS_TOTAL: &str = "replicator_outlier_rows_total";
pub const PUBLISH_FAILURES_TOTAL: &str = "replicator_publish_failures_total";
pub const PRODUCER_CLOSE_SECONDS: &str = "replicator_producer_close_seconds";

pub fn setup_metrics_recorder() -> PrometheusHandle {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(PRODUCER_CLOSE_SECONDS.to_string()),
            EXPONENTIAL_SECONDS,
        )
        .unwrap()
        .install_recorder()
        .unwrap()
}
