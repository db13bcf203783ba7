//! Metrics for upload monitoring.
//!
//! Recorded through the `metrics` facade; the embedding application decides whether and how
//! to export them. Metrics are organized into three categories:
//! - **Gauges**: icon uploads currently executing
//! - **Counters**: metadata batches and icon uploads by status
//! - **Histograms**: icon upload duration

use std::time::Duration;

use metrics::{counter, gauge, histogram};

pub const METADATA_BATCHES_TOTAL: &str = "volley_metadata_batches_total";
pub const ICON_UPLOADS_TOTAL: &str = "volley_icon_uploads_total";
pub const ICON_UPLOADS_IN_FLIGHT: &str = "volley_icon_uploads_in_flight";
pub const ICON_UPLOAD_DURATION_SECONDS: &str = "volley_icon_upload_duration_seconds";

/// Count one metadata batch by status (`success` or `failure`).
pub fn record_metadata_batch(status: &'static str) {
    counter!(METADATA_BATCHES_TOTAL, "status" => status).increment(1);
}

/// Count one finished icon upload and its duration.
pub fn record_icon_upload(status: &'static str, elapsed: Duration) {
    counter!(ICON_UPLOADS_TOTAL, "status" => status).increment(1);
    histogram!(ICON_UPLOAD_DURATION_SECONDS, "status" => status).record(elapsed.as_secs_f64());
}

pub fn icon_upload_started() {
    gauge!(ICON_UPLOADS_IN_FLIGHT).increment(1.0);
}

pub fn icon_upload_finished() {
    gauge!(ICON_UPLOADS_IN_FLIGHT).decrement(1.0);
}
