use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: requests sent to the booking API. Labels: method, outcome.
pub const SOURCE_REQUESTS_TOTAL: &str = "courtside_source_requests_total";

/// Counter: day views computed by the planner.
pub const DAY_VIEWS_TOTAL: &str = "courtside_day_views_total";

/// Histogram: fetch + slot computation latency of a day view, in seconds.
pub const DAY_VIEW_DURATION_SECONDS: &str = "courtside_day_view_duration_seconds";

/// Counter: selections discarded because a newer one started.
pub const SUPERSEDED_TOTAL: &str = "courtside_superseded_total";

// ── Slot grid ───────────────────────────────────────────────────

/// Counter: slots emitted. Labels: status.
pub const SLOTS_TOTAL: &str = "courtside_slots_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
