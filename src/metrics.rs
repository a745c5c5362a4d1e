//! Prometheus metrics for sync runs.
//!
//! A run is a short-lived batch job, so instead of serving a scrape endpoint
//! the recorder is rendered in-process and pushed to a Pushgateway when one is
//! configured.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Metrics handle already set");
            }
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    });
}

pub fn get_handle() -> Option<&'static PrometheusHandle> {
    HANDLE.get()
}

/// Pushgateway URL for this job and instance
pub fn push_url(pushgateway_url: &str, instance: &str) -> String {
    format!(
        "{}/metrics/job/names_sync/instance/{}",
        pushgateway_url.trim_end_matches('/'),
        instance
    )
}

/// Push the current snapshot. Failures are logged, never propagated.
pub async fn push_to_gateway(client: &reqwest::Client, pushgateway_url: &str, instance: &str) {
    let Some(handle) = get_handle() else {
        warn!("Metrics recorder not installed, nothing to push");
        return;
    };
    let body = handle.render();
    let url = push_url(pushgateway_url, instance);

    match client
        .post(&url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
    {
        Ok(r) if r.status().is_success() => {
            info!("Pushed metrics to Pushgateway for instance={}", instance);
        }
        Ok(r) => {
            warn!(
                "Pushgateway push responded with status {} for instance={}",
                r.status().as_u16(),
                instance
            );
        }
        Err(e) => {
            warn!("Failed to push metrics to Pushgateway for instance={}: {}", instance, e);
        }
    }
}
