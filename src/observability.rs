use std::net::SocketAddr;

use crate::sql::Command;

// ── Admission metrics ───────────────────────────────────────────

/// Counter: finished admission attempts. Labels: kind (single, batch,
/// status), outcome (accepted, rejected, aborted).
pub const ADMISSIONS_TOTAL: &str = "vacancy_admissions_total";

/// Histogram: admission latency in seconds, lock wait included. Labels: kind.
pub const ADMISSION_DURATION_SECONDS: &str = "vacancy_admission_duration_seconds";

/// Histogram: time spent waiting for a per-resource critical section.
pub const ADMISSION_LOCK_WAIT_SECONDS: &str = "vacancy_admission_lock_wait_seconds";

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "vacancy_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "vacancy_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "vacancy_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "vacancy_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "vacancy_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "vacancy_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "vacancy_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertResource { .. } => "insert_resource",
        Command::InsertReservation { .. } => "insert_reservation",
        Command::BatchInsertReservations { .. } => "batch_insert_reservations",
        Command::ChangeStatus { .. } => "change_status",
        Command::CancelReservation { .. } => "cancel_reservation",
        Command::SelectResources => "select_resources",
        Command::SelectReservations { .. } => "select_reservations",
        Command::SelectOccupiedDates { .. } => "select_occupied_dates",
        Command::SelectAvailability { .. } => "select_availability",
    }
}
