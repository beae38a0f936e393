//! Metric names, one-time descriptions and the Prometheus recorder.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ENRICH_ARTICLES_TOTAL: &str = "enrich_articles_total";
pub const ENRICH_FAILURES_TOTAL: &str = "enrich_failures_total";
pub const ENRICH_ARTICLE_MS: &str = "enrich_article_ms";
pub const CLUSTER_RUNS_TOTAL: &str = "cluster_runs_total";
pub const JUDGMENT_FALLBACK_TOTAL: &str = "judgment_fallback_total";
pub const RULES_MATCHED_TOTAL: &str = "rules_matched_total";
pub const RECOMMENDATIONS_TOTAL: &str = "recommendations_total";

/// Registers descriptions with whatever recorder is installed. Runs once per process.
pub fn describe() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(register_descriptions);
}

fn register_descriptions() {
    describe_counter!(ENRICH_ARTICLES_TOTAL, "Articles enriched with features.");
    describe_counter!(
        ENRICH_FAILURES_TOTAL,
        "Articles whose enrichment failed during a batch."
    );
    describe_histogram!(ENRICH_ARTICLE_MS, "Feature extraction time per article in milliseconds.");
    describe_counter!(CLUSTER_RUNS_TOTAL, "Clustering runs per user.");
    describe_counter!(
        JUDGMENT_FALLBACK_TOTAL,
        "Judgment calls that fell back to heuristics, by component."
    );
    describe_counter!(RULES_MATCHED_TOTAL, "Rules whose conditions matched an article.");
    describe_counter!(RECOMMENDATIONS_TOTAL, "Recommendations returned to callers.");
}

/// Installs the global Prometheus recorder. Fails if another recorder is already set.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
    // the once-guard may already have fired against the no-op recorder
    register_descriptions();
    Ok(handle)
}
