use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: method, route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "courtside_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: method, route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "courtside_http_request_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: reservations successfully booked.
pub const RESERVATIONS_CREATED_TOTAL: &str = "courtside_reservations_created_total";

/// Counter: reservation writes rejected for overlapping an existing booking.
/// Labels: operation (create, update).
pub const RESERVATION_CONFLICTS_TOTAL: &str = "courtside_reservation_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "courtside_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "courtside_wal_flush_batch_size";

/// Counter: WAL compactions completed.
pub const WAL_COMPACTIONS_TOTAL: &str = "courtside_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Normalize a status code to its class (`2xx`, `4xx`, ...) for low-cardinality labels.
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes() {
        assert_eq!(status_class(201), "2xx");
        assert_eq!(status_class(404), "4xx");
        assert_eq!(status_class(409), "4xx");
        assert_eq!(status_class(500), "5xx");
    }

    #[test]
    fn init_without_port_is_noop() {
        assert!(init(None).is_ok());
    }
}
