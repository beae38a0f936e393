//! Ranking unread articles for a user.
//!
//! Two strategies sit behind [`RelevanceScorer`]: the model-backed
//! [`LlmRelevanceScorer`] and the deterministic [`HeuristicScorer`].
//! [`Recommender`] tries the primary one per article and falls through to the
//! heuristic on any failure, so a dead provider never empties the list.

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::analyze::ai_adapter::{extract_json, sanitize_reason, DynJudgmentClient};
use crate::analyze::scoring::{HeuristicScorer, FALLBACK_REASON};
use crate::article::{Article, ArticleId};
use crate::error::{JudgmentError, ScoringError};
use crate::logging::{TARGET_JUDGMENT, TARGET_RECOMMEND};
use crate::metrics::{describe, JUDGMENT_FALLBACK_TOTAL, RECOMMENDATIONS_TOTAL};
use crate::preferences::UserPreference;
use crate::prompts::relevance_prompt;

/// Unread candidates looked at per request.
pub const MAX_CANDIDATES: usize = 100;
/// Highest-rated read articles used as history.
pub const HISTORY_LIMIT: usize = 10;
pub const DEFAULT_RECOMMEND_LIMIT: usize = 20;

const RELEVANCE_MAX_TOKENS: u32 = 200;
const REASON_MAX_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq)]
pub struct Relevance {
    pub score: f32,
    pub reason: String,
}

/// What a scorer may look at besides the candidate itself.
#[derive(Debug, Clone, Copy)]
pub struct ScoringContext<'a> {
    pub preferences: &'a UserPreference,
    /// Read, rated articles, best rated first.
    pub history: &'a [Article],
}

impl<'a> ScoringContext<'a> {
    pub fn new(preferences: &'a UserPreference, history: &'a [Article]) -> Self {
        Self {
            preferences,
            history,
        }
    }
}

#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn score(
        &self,
        ctx: &ScoringContext<'_>,
        article: &Article,
    ) -> Result<Relevance, ScoringError>;
}

/// Asks the judgment capability for `{"score", "reason"}`.
pub struct LlmRelevanceScorer {
    client: DynJudgmentClient,
}

impl LlmRelevanceScorer {
    pub fn new(client: DynJudgmentClient) -> Self {
        Self { client }
    }
}

#[derive(Deserialize)]
struct RelevanceReply {
    score: Option<f64>,
    #[serde(default)]
    reason: Option<String>,
}

/// Parses a model reply. A missing or non-finite score is malformed.
pub fn parse_relevance(raw: &str) -> Result<Relevance, JudgmentError> {
    let json = extract_json(raw).ok_or_else(|| JudgmentError::Malformed("no JSON object".into()))?;
    let reply: RelevanceReply =
        serde_json::from_str(json).map_err(|e| JudgmentError::Malformed(e.to_string()))?;
    let score = reply
        .score
        .filter(|s| s.is_finite())
        .ok_or_else(|| JudgmentError::Malformed("missing score".into()))?;
    let reason = reply
        .reason
        .map(|r| sanitize_reason(&r, REASON_MAX_CHARS))
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "Judged relevant by the language model".to_string());
    Ok(Relevance {
        score: score.clamp(0.0, 1.0) as f32,
        reason,
    })
}

#[async_trait]
impl RelevanceScorer for LlmRelevanceScorer {
    fn name(&self) -> &'static str {
        self.client.provider_name()
    }

    async fn score(
        &self,
        ctx: &ScoringContext<'_>,
        article: &Article,
    ) -> Result<Relevance, ScoringError> {
        if !self.client.is_enabled() {
            return Err(JudgmentError::Disabled.into());
        }
        let prompt = relevance_prompt(ctx.preferences, ctx.history, article);
        let raw = self.client.complete(&prompt, RELEVANCE_MAX_TOKENS).await?;
        Ok(parse_relevance(&raw)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub article_id: ArticleId,
    pub score: f32,
    pub reason: String,
}

/// Primary strategy with heuristic fallback.
pub struct Recommender {
    primary: Arc<dyn RelevanceScorer>,
    fallback: HeuristicScorer,
}

impl Recommender {
    pub fn new(primary: Arc<dyn RelevanceScorer>, fallback: HeuristicScorer) -> Self {
        Self { primary, fallback }
    }

    /// LLM strategy over `client`, default heuristic fallback.
    pub fn with_client(client: DynJudgmentClient) -> Self {
        Self::new(
            Arc::new(LlmRelevanceScorer::new(client)),
            HeuristicScorer::default(),
        )
    }

    /// Scores one candidate; never fails.
    pub async fn score_one(&self, ctx: &ScoringContext<'_>, article: &Article) -> Relevance {
        match self.primary.score(ctx, article).await {
            Ok(r) => r,
            Err(ScoringError::Judgment(e)) => {
                if e.is_disabled() {
                    debug!(target: TARGET_JUDGMENT, article_id = article.id, "judgment disabled, heuristic relevance");
                } else {
                    describe();
                    counter!(JUDGMENT_FALLBACK_TOTAL, "component" => "recommend").increment(1);
                    warn!(
                        target: TARGET_JUDGMENT,
                        scorer = self.primary.name(),
                        article_id = article.id,
                        error = %e,
                        "relevance judgment failed, using heuristic"
                    );
                }
                Relevance {
                    score: self.fallback.score_article(ctx, article),
                    reason: FALLBACK_REASON.to_string(),
                }
            }
        }
    }

    /// Ranked recommendations for the owner of `prefs` out of `articles`
    /// (one user's articles in store order). Empty when there are no
    /// preferences, recommendations are off, or nothing qualifies.
    pub async fn recommend(
        &self,
        prefs: Option<&UserPreference>,
        articles: &[Article],
        limit: usize,
    ) -> Vec<Recommendation> {
        let Some(prefs) = prefs.filter(|p| p.recommendations_enabled) else {
            return Vec::new();
        };

        let candidates: Vec<&Article> = articles
            .iter()
            .filter(|a| a.user_id == prefs.user_id && !a.is_read && a.embedding().is_some())
            .take(MAX_CANDIDATES)
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let history = reading_history(prefs, articles);
        let ctx = ScoringContext::new(prefs, &history);

        let mut out = Vec::new();
        for article in &candidates {
            let r = self.score_one(&ctx, article).await;
            if r.score >= prefs.relevance_threshold {
                out.push(Recommendation {
                    article_id: article.id,
                    score: r.score,
                    reason: r.reason,
                });
            }
        }
        out.sort_by(|a, b| b.score.total_cmp(&a.score));
        out.truncate(limit);

        describe();
        counter!(RECOMMENDATIONS_TOTAL).increment(out.len() as u64);
        info!(
            target: TARGET_RECOMMEND,
            user_id = prefs.user_id,
            candidates = candidates.len(),
            history = history.len(),
            returned = out.len(),
            "recommendations ranked"
        );
        out
    }
}

/// Read and rated articles of the user, best rated first, at most [`HISTORY_LIMIT`].
pub fn reading_history(prefs: &UserPreference, articles: &[Article]) -> Vec<Article> {
    let mut rated: Vec<&Article> = articles
        .iter()
        .filter(|a| a.user_id == prefs.user_id && a.is_read && a.rating.is_some())
        .collect();
    rated.sort_by(|a, b| {
        b.rating
            .unwrap_or_default()
            .total_cmp(&a.rating.unwrap_or_default())
    });
    rated.into_iter().take(HISTORY_LIMIT).cloned().collect()
}
