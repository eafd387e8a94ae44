use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: recompute calls. Labels: status.
pub const RECOMPUTES_TOTAL: &str = "daybook_recomputes_total";

/// Histogram: recompute latency in seconds.
pub const RECOMPUTE_DURATION_SECONDS: &str = "daybook_recompute_duration_seconds";

/// Counter: cache reads served.
pub const CACHE_READS_TOTAL: &str = "daybook_cache_reads_total";

// ── Failure/flow metrics ────────────────────────────────────────

/// Counter: order-ledger query failures (cache left untouched).
pub const LEDGER_FAILURES_TOTAL: &str = "daybook_ledger_failures_total";

/// Counter: ledger events consumed by the recompute listener.
pub const LISTENER_EVENTS_TOTAL: &str = "daybook_listener_events_total";

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

/// Install the fmt tracing subscriber. Safe to call more than once — later
/// calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().try_init();
}
