//! Orchestrator: runs the pure components over store snapshots and commits
//! their results back through [`ArticleStore`].

use chrono::Utc;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use crate::analytics::{self, AnalyticsReport};
use crate::analyze::ai_adapter::{build_judgment_client, DynJudgmentClient};
use crate::analyze::rules::{Rule, RuleEngine, RuleId, RuleOutcome};
use crate::analyze::FeatureExtractor;
use crate::article::{Article, ArticleId, ArticleState, UserId};
use crate::cluster::{ClusterEngine, ClusterRun};
use crate::config::Settings;
use crate::error::{ConfigError, InsightError, PipelineError};
use crate::ingest::RawArticle;
use crate::insights::{Insight, InsightGenerator};
use crate::listing::{self, ListQuery};
use crate::logging::{TARGET_ENRICH, TARGET_RULES};
use crate::metrics::{describe, ENRICH_ARTICLES_TOTAL, ENRICH_ARTICLE_MS, ENRICH_FAILURES_TOTAL};
use crate::preferences::{PreferenceUpdate, UserPreference};
use crate::recommend::{Recommendation, Recommender};
use crate::similarity::find_similar;
use crate::store::ArticleStore;

/// Outcome of a batch enrichment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    /// Articles that needed processing.
    pub total: usize,
    pub failed: usize,
    pub message: String,
}

/// A freshly ingested, enriched article and what the user's rules did to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingested {
    pub article: Article,
    pub rules: RuleOutcome,
}

pub struct Pipeline<S> {
    store: S,
    extractor: FeatureExtractor,
    clusterer: ClusterEngine,
    recommender: Recommender,
    insights: InsightGenerator,
    default_threshold: f32,
}

impl<S: ArticleStore> Pipeline<S> {
    /// Wires every component from validated settings.
    pub fn new(settings: &Settings, store: S) -> Result<Self, ConfigError> {
        let client = build_judgment_client(&settings.ai)?;
        Ok(Self::with_parts(
            store,
            FeatureExtractor::from_settings(settings)?,
            ClusterEngine::new(settings.clustering_min_samples),
            client,
            settings.default_relevance_threshold,
        ))
    }

    pub fn with_parts(
        store: S,
        extractor: FeatureExtractor,
        clusterer: ClusterEngine,
        client: DynJudgmentClient,
        default_threshold: f32,
    ) -> Self {
        Self {
            store,
            extractor,
            clusterer,
            recommender: Recommender::with_client(client.clone()),
            insights: InsightGenerator::new(client),
            default_threshold,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Normalizes and stores a raw record, enriches it, then runs the
    /// user's rules and commits their result once.
    pub fn ingest(&self, user: UserId, raw: RawArticle) -> Result<Ingested, PipelineError> {
        let raw = raw.normalized()?;
        let stored = self.store.insert_article(user, raw)?;
        self.process_article(user, stored.id)?;
        let rules = self.apply_rules(user, stored.id)?;
        let article = self.store.article(user, stored.id)?;
        Ok(Ingested { article, rules })
    }

    /// (Re)computes every enrichment field of one article.
    pub fn process_article(&self, user: UserId, id: ArticleId) -> Result<Article, PipelineError> {
        let article = self.store.article(user, id)?;
        self.enrich(user, &article)?;
        Ok(self.store.article(user, id)?)
    }

    fn enrich(&self, user: UserId, article: &Article) -> Result<(), PipelineError> {
        describe();
        let started = Instant::now();
        let features = self.extractor.extract(&article.analysis_text())?;
        let fingerprint = features.fingerprint.clone();
        let topics = features.topics.len();
        self.store.save_features(user, article.id, features)?;

        histogram!(ENRICH_ARTICLE_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        counter!(ENRICH_ARTICLES_TOTAL).increment(1);
        info!(
            target: TARGET_ENRICH,
            user_id = user,
            article_id = article.id,
            fp = %fingerprint,
            topics,
            "article enriched"
        );
        Ok(())
    }

    /// `true` when the stored features were computed from the current text
    /// with the current model.
    pub fn is_fresh(&self, article: &Article) -> bool {
        article
            .enrichment
            .as_ref()
            .is_some_and(|e| e.fingerprint == self.extractor.fingerprint(&article.analysis_text()))
    }

    /// Enriches every article whose features are missing or stale. Per-article
    /// failures are counted and the batch continues.
    pub fn process_all(&self, user: UserId) -> Result<BatchReport, PipelineError> {
        describe();
        let pending: Vec<Article> = self
            .store
            .articles_for_user(user)?
            .into_iter()
            .filter(|a| !self.is_fresh(a))
            .collect();

        let mut processed = 0;
        let mut failed = 0;
        for article in &pending {
            match self.enrich(user, article) {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    counter!(ENRICH_FAILURES_TOTAL).increment(1);
                    warn!(target: TARGET_ENRICH, user_id = user, article_id = article.id, error = %e, "enrichment failed");
                }
            }
        }

        let total = pending.len();
        info!(target: TARGET_ENRICH, user_id = user, processed, failed, total, "batch enrichment finished");
        Ok(BatchReport {
            processed,
            total,
            failed,
            message: format!("Successfully processed {processed} out of {total} articles"),
        })
    }

    /// Full clustering run over the user's articles; assignments are committed.
    pub fn cluster(&self, user: UserId) -> Result<ClusterRun, PipelineError> {
        let articles = self.store.articles_for_user(user)?;
        let run = self.clusterer.cluster_articles(&articles)?;
        self.store.save_clusters(user, &run.assignments)?;
        Ok(run)
    }

    pub fn similar(
        &self,
        user: UserId,
        id: ArticleId,
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<(Article, f32)>, PipelineError> {
        let target = self.store.article(user, id)?;
        let pool = self.store.articles_for_user(user)?;
        Ok(find_similar(&target, &pool, threshold, limit)
            .into_iter()
            .map(|(a, s)| (a.clone(), s))
            .collect())
    }

    fn rule_engine(&self, user: UserId) -> Result<RuleEngine, PipelineError> {
        Ok(RuleEngine::new(&self.store.rules_for_user(user)?)?)
    }

    /// Runs the user's rules on one article and commits the resulting state.
    pub fn apply_rules(&self, user: UserId, id: ArticleId) -> Result<RuleOutcome, PipelineError> {
        let engine = self.rule_engine(user)?;
        let article = self.store.article(user, id)?;
        self.commit_rules(user, &engine, &article)
    }

    /// Runs the rules over every article of the user. Returns the outcomes
    /// with at least one matched rule.
    pub fn apply_rules_all(&self, user: UserId) -> Result<Vec<RuleOutcome>, PipelineError> {
        let engine = self.rule_engine(user)?;
        let mut out = Vec::new();
        for article in self.store.articles_for_user(user)? {
            let outcome = self.commit_rules(user, &engine, &article)?;
            if !outcome.matches.is_empty() {
                out.push(outcome);
            }
        }
        info!(target: TARGET_RULES, user_id = user, rules = engine.len(), matched = out.len(), "rules applied");
        Ok(out)
    }

    fn commit_rules(
        &self,
        user: UserId,
        engine: &RuleEngine,
        article: &Article,
    ) -> Result<RuleOutcome, PipelineError> {
        let outcome = engine.apply(article);
        if outcome.changed(article) {
            self.store.save_state(user, article.id, &outcome.state)?;
        }
        Ok(outcome)
    }

    pub async fn recommend(
        &self,
        user: UserId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, PipelineError> {
        let prefs = self.store.preferences(user)?;
        let articles = self.store.articles_for_user(user)?;
        Ok(self.recommender.recommend(prefs.as_ref(), &articles, limit).await)
    }

    /// `InsightError::FeatureDisabled` comes before any lookup.
    pub async fn insights(&self, user: UserId, id: ArticleId) -> Result<Insight, PipelineError> {
        if !self.insights.is_enabled() {
            return Err(InsightError::FeatureDisabled.into());
        }
        let article = self.store.article(user, id)?;
        Ok(self.insights.generate(&article).await?)
    }

    pub fn mark_read(&self, user: UserId, id: ArticleId) -> Result<Article, PipelineError> {
        self.update_state(user, id, |s| s.is_read = true)
    }

    pub fn toggle_bookmark(&self, user: UserId, id: ArticleId) -> Result<Article, PipelineError> {
        self.update_state(user, id, |s| s.is_bookmarked = !s.is_bookmarked)
    }

    fn update_state(
        &self,
        user: UserId,
        id: ArticleId,
        edit: impl FnOnce(&mut ArticleState),
    ) -> Result<Article, PipelineError> {
        let article = self.store.article(user, id)?;
        let mut state = ArticleState::from(&article);
        edit(&mut state);
        self.store.save_state(user, id, &state)?;
        Ok(self.store.article(user, id)?)
    }

    /// Ratings outside [0, 5] are rejected before anything is written.
    pub fn rate(&self, user: UserId, id: ArticleId, rating: f32) -> Result<Article, PipelineError> {
        let mut article = self.store.article(user, id)?;
        article.set_rating(rating)?;
        self.store.save_rating(user, id, rating)?;
        Ok(article)
    }

    /// The user's preferences, created with defaults on first access.
    pub fn preferences(&self, user: UserId) -> Result<UserPreference, PipelineError> {
        if let Some(p) = self.store.preferences(user)? {
            return Ok(p);
        }
        let p = UserPreference::with_defaults(user, self.default_threshold);
        self.store.save_preferences(p.clone())?;
        Ok(p)
    }

    pub fn update_preferences(
        &self,
        user: UserId,
        update: PreferenceUpdate,
    ) -> Result<UserPreference, PipelineError> {
        let mut p = self.preferences(user)?;
        p.merge(update)?;
        self.store.save_preferences(p.clone())?;
        Ok(p)
    }

    /// Validates (compiles) the rule before storing it.
    pub fn put_rule(&self, rule: Rule) -> Result<Rule, PipelineError> {
        rule.compile()?;
        Ok(self.store.put_rule(rule)?)
    }

    pub fn delete_rule(&self, user: UserId, id: RuleId) -> Result<bool, PipelineError> {
        Ok(self.store.delete_rule(user, id)?)
    }

    pub fn rules(&self, user: UserId) -> Result<Vec<Rule>, PipelineError> {
        Ok(self.store.rules_for_user(user)?)
    }

    /// Filtered listing; the user's excluded words hide matching articles.
    pub fn list_articles(&self, user: UserId, query: &ListQuery) -> Result<Vec<Article>, PipelineError> {
        let prefs = self.store.preferences(user)?;
        let articles = self.store.articles_for_user(user)?;
        Ok(listing::list_articles(articles, query, prefs.as_ref()))
    }

    pub fn analytics(&self, user: UserId) -> Result<AnalyticsReport, PipelineError> {
        let articles = self.store.articles_for_user(user)?;
        Ok(analytics::report(&articles, Utc::now()))
    }
}
