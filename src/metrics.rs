use tracing::trace;

// Lightweight, trace-based metric helpers; the Prometheus recorder installed
// in main picks up whatever the exporter macros would emit, and these keep a
// stable signal even with the macros disabled.

pub fn inc_requests(route: &'static str) {
    trace!(
        target = "mercury.metrics",
        route = route,
        "requests_total_inc"
    );
}

pub fn step_latency(step: u8, elapsed_ms: u128) {
    trace!(
        target = "mercury.metrics",
        step = step,
        elapsed_ms = elapsed_ms as u64,
        "wizard_step_latency"
    );
}
