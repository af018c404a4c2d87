use std::sync::OnceLock;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload. Safe to call more than once; the
/// recorder is installed on the first call only.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let handle = match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => handle,
                Err(e) => {
                    // Another recorder owns the process; keep a detached one for /metrics.
                    tracing::warn!(error = %e, "Prometheus recorder already installed");
                    PrometheusBuilder::new().build_recorder().handle()
                }
            };

            // Pre-register counters so they appear even before the first increment.
            counter!("copy_joins_total").absolute(0);
            counter!("copy_cancel_requests_total").absolute(0);
            counter!("copy_resolutions_total", "decision" => "accept").absolute(0);
            counter!("copy_resolutions_total", "decision" => "reject").absolute(0);
            counter!("copy_unlinks_total").absolute(0);
            counter!("trades_recorded_total", "kind" => "trader").absolute(0);
            counter!("trades_recorded_total", "kind" => "direct").absolute(0);
            counter!("settlements_total").absolute(0);
            counter!("settlement_entries_total").absolute(0);
            counter!("notifications_failed_total").absolute(0);

            // Histogram is lazily created on first record; force creation.
            histogram!("settlement_fanout_size").record(0.0);

            handle
        })
        .clone()
}
