//! Prometheus text scraping
//!
//! Jobs expose a Prometheus metrics endpoint; the monitor only needs one
//! gauge out of it, so this is a minimal line parser rather than a full
//! exposition-format decoder.

/// Gauge recording the epoch seconds of the job's last handled call
pub const LAST_CALL_METRIC: &str = "job_last_call_timestamp";

/// Reads the last-call timestamp gauge from a metrics payload
///
/// An absent metric is `None`, not an error: freshly deployed jobs have
/// not been called yet.
pub fn read_last_call_timestamp(body: &str) -> Option<i64> {
    read_gauge(body, LAST_CALL_METRIC).map(|value| value as i64)
}

/// Reads a single gauge value by metric name
///
/// Labels are ignored; the first sample of the metric wins.
pub fn read_gauge(body: &str, metric: &str) -> Option<f64> {
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let base_name = name.split('{').next().unwrap_or(name);
        if base_name == metric {
            return value.parse().ok();
        }
    }
    None
}
