// tests/metrics.rs
// Installs the global Prometheus recorder, so it only builds with the feature:
// cargo test --features strict-metrics --test metrics
#![cfg(feature = "strict-metrics")]

use news_enricher::ai_adapter::StaticClient;
use news_enricher::analyze::FeatureExtractor;
use news_enricher::error::JudgmentError;
use news_enricher::metrics::install_prometheus;
use news_enricher::{ClusterEngine, MemoryStore, Pipeline, PreferenceUpdate, RawArticle};
use std::sync::Arc;

#[tokio::test]
async fn exposition_contains_pipeline_series() {
    // one recorder per process; this is the only test in the binary
    let handle = install_prometheus().expect("install recorder");

    let p = Pipeline::with_parts(
        MemoryStore::new(),
        FeatureExtractor::default(),
        ClusterEngine::default(),
        Arc::new(StaticClient::failing(JudgmentError::Timeout)),
        0.0,
    );
    p.ingest(
        1,
        RawArticle {
            title: "Breaking: chip exports surge".into(),
            link: "https://n/1".into(),
            description: Some("Exports rose for a third month.".into()),
            content: None,
            author: None,
            published: None,
        },
    )
    .unwrap();
    p.update_preferences(1, PreferenceUpdate::default()).unwrap();
    p.cluster(1).unwrap();
    let recs = p.recommend(1, 10).await.unwrap();
    assert_eq!(recs.len(), 1);

    let text = handle.render();
    for needle in [
        "enrich_articles_total",
        "enrich_article_ms",
        "cluster_runs_total",
        "judgment_fallback_total",
        "recommendations_total",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
    assert!(text.contains(r#"component="recommend""#), "{text}");
}
