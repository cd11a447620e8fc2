use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::models::Label;
use crate::sources::SourceKind;

/// Install the Prometheus recorder and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register counters so they appear even before the first increment.
    counter!("resumes_verified_total").absolute(0);
    counter!("partial_verifications_total").absolute(0);
    counter!("anchors_failed_total").absolute(0);
    for kind in SourceKind::ALL {
        counter!("source_attempts_total", "source" => kind.as_str()).absolute(0);
    }
    for label in Label::ALL {
        counter!("claims_classified_total", "label" => label.as_str()).absolute(0);
    }

    // Histogram is lazily created on first record; force creation.
    histogram!("pipeline_latency_seconds").record(0.0);

    Ok(handle)
}
