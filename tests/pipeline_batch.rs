// tests/pipeline_batch.rs
use news_enricher::ai_adapter::DisabledClient;
use news_enricher::analyze::{Embedder, FeatureExtractor, HashingEmbedder};
use news_enricher::error::EmbeddingError;
use news_enricher::listing::{ListQuery, SortBy};
use news_enricher::{
    ArticleStore, ClusterEngine, ClusterLabel, MemoryStore, Pipeline, PreferenceUpdate, RawArticle,
};
use std::sync::Arc;

fn pipeline(store: MemoryStore) -> Pipeline<MemoryStore> {
    Pipeline::with_parts(
        store,
        FeatureExtractor::default(),
        ClusterEngine::new(2),
        Arc::new(DisabledClient),
        0.5,
    )
}

fn raw(title: &str, link: &str, description: &str) -> RawArticle {
    RawArticle {
        title: title.into(),
        link: link.into(),
        description: Some(description.into()),
        content: None,
        author: None,
        published: None,
    }
}

#[test]
fn batch_processes_only_unenriched_articles() {
    let p = pipeline(MemoryStore::new());
    p.ingest(1, raw("One", "https://n/1", "First story.")).unwrap();
    for i in 2..=4 {
        p.store()
            .insert_article(1, raw("Pending", &format!("https://n/{i}"), "Waiting."))
            .unwrap();
    }
    p.store()
        .insert_article(2, raw("Other user", "https://n/x", "Not ours."))
        .unwrap();

    let report = p.process_all(1).unwrap();
    assert_eq!((report.processed, report.total, report.failed), (3, 3, 0));
    assert_eq!(report.message, "Successfully processed 3 out of 3 articles");

    let again = p.process_all(1).unwrap();
    assert_eq!((again.processed, again.total), (0, 0));
    assert!(!p.store().articles_for_user(2).unwrap()[0].is_enriched());
}

/// Fails on any text mentioning "garbled", like a model choking on one input.
struct GarbledInputEmbedder(HashingEmbedder);

impl Embedder for GarbledInputEmbedder {
    fn model_id(&self) -> &str {
        self.0.model_id()
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.contains("garbled") {
            return Err(EmbeddingError::Inference("tokenizer rejected input".into()));
        }
        self.0.embed(text)
    }
}

#[test]
fn embedding_failures_are_counted_and_the_batch_continues() {
    let p = Pipeline::with_parts(
        MemoryStore::new(),
        FeatureExtractor::new(Box::new(GarbledInputEmbedder(HashingEmbedder::new(64)))),
        ClusterEngine::new(2),
        Arc::new(DisabledClient),
        0.5,
    );
    for (i, body) in ["Fine story.", "garbled bytes", "Another fine story."].iter().enumerate() {
        p.store()
            .insert_article(1, raw("Item", &format!("https://n/{i}"), body))
            .unwrap();
    }

    let report = p.process_all(1).unwrap();
    assert_eq!((report.processed, report.total, report.failed), (2, 3, 1));
    assert_eq!(report.message, "Successfully processed 2 out of 3 articles");

    let enriched = p
        .store()
        .articles_for_user(1)
        .unwrap()
        .into_iter()
        .filter(|a| a.is_enriched())
        .count();
    assert_eq!(enriched, 2);
}

#[test]
fn clustering_groups_near_duplicates_and_marks_noise() {
    let p = pipeline(MemoryStore::new());
    let text = "The central bank raised interest rates to fight inflation.";
    let a = p.ingest(1, raw("Rates rise", "https://n/1", text)).unwrap().article;
    let b = p.ingest(1, raw("Rates rise", "https://n/2", text)).unwrap().article;
    let c = p
        .ingest(1, raw("Cup final", "https://n/3", "Fans celebrated the football final."))
        .unwrap()
        .article;

    let run = p.cluster(1).unwrap();
    assert_eq!(run.clusters, 1);

    let stored = p.store().articles_for_user(1).unwrap();
    let label = |id| stored.iter().find(|x| x.id == id).unwrap().cluster;
    assert!(matches!(label(a.id), ClusterLabel::Cluster(_)));
    assert_eq!(label(a.id), label(b.id));
    assert_eq!(label(c.id), ClusterLabel::Noise);
}

#[test]
fn snapshot_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("news.json");

    let p = pipeline(MemoryStore::new());
    let a = p.ingest(1, raw("Kept", "https://n/1", "Stored story.")).unwrap().article;
    p.toggle_bookmark(1, a.id).unwrap();
    p.update_preferences(
        1,
        PreferenceUpdate {
            preferred_topics: Some(vec!["science".into()]),
            ..PreferenceUpdate::default()
        },
    )
    .unwrap();
    p.store().save(&path).unwrap();

    let reloaded = pipeline(MemoryStore::load(&path).unwrap());
    let back = reloaded.store().article(1, a.id).unwrap();
    assert!(back.is_bookmarked);
    assert!(reloaded.is_fresh(&back));
    assert_eq!(reloaded.preferences(1).unwrap().preferred_topics, vec!["science"]);

    // ids keep counting after a reload
    let next = reloaded.ingest(1, raw("New", "https://n/2", "Later story.")).unwrap();
    assert!(next.article.id > a.id);
}

#[test]
fn interactions_and_listing() {
    let p = pipeline(MemoryStore::new());
    let a = p.ingest(1, raw("Crypto slump deepens", "https://n/1", "Prices fell sharply.")).unwrap().article;
    let b = p.ingest(1, raw("Garden tips", "https://n/2", "A lovely guide to spring planting.")).unwrap().article;

    assert!(p.mark_read(1, a.id).unwrap().is_read);
    assert!(p.rate(1, b.id, 6.0).is_err());
    assert_eq!(p.rate(1, b.id, 4.5).unwrap().rating, Some(4.5));

    let unread = p
        .list_articles(
            1,
            &ListQuery {
                unread_only: true,
                ..ListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(unread.iter().map(|x| x.id).collect::<Vec<_>>(), vec![b.id]);

    p.update_preferences(
        1,
        PreferenceUpdate {
            excluded_words: Some(vec!["garden".into()]),
            ..PreferenceUpdate::default()
        },
    )
    .unwrap();
    let by_sentiment = p
        .list_articles(
            1,
            &ListQuery {
                sort_by: SortBy::Sentiment,
                ..ListQuery::default()
            },
        )
        .unwrap();
    assert_eq!(by_sentiment.iter().map(|x| x.id).collect::<Vec<_>>(), vec![a.id]);

    let report = p.analytics(1).unwrap();
    assert_eq!(report.sentiment.total, 2);
}
