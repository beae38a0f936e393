//! Heuristic relevance scoring: the deterministic fallback strategy.
//!
//! score = 0.5
//!       + `topic_boost` per preferred topic the article carries
//!       - `excluded_penalty` if it carries any excluded topic
//!       then averaged with the mean cosine similarity to the reading history
//!       ± `sentiment_nudge` for clearly positive / strongly negative articles,
//!       clamped to [0,1].

use async_trait::async_trait;

use crate::article::Article;
use crate::error::ScoringError;
use crate::recommend::{Relevance, RelevanceScorer, ScoringContext};
use crate::similarity::cosine_similarity;

pub const FALLBACK_REASON: &str = "Based on content similarity and topics";

/// Tunables of the heuristic. Defaults match the production behaviour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoreWeights {
    pub base: f32,
    pub topic_boost: f32,
    pub excluded_penalty: f32,
    pub sentiment_nudge: f32,
    pub positive_above: f64,
    pub negative_below: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            base: 0.5,
            topic_boost: 0.2,
            excluded_penalty: 0.3,
            sentiment_nudge: 0.05,
            positive_above: 0.3,
            negative_below: -0.5,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicScorer {
    weights: ScoreWeights,
}

impl HeuristicScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Pure score in [0,1].
    pub fn score_article(&self, ctx: &ScoringContext<'_>, article: &Article) -> f32 {
        let w = &self.weights;
        let mut score = w.base;

        let topics: Vec<String> = article.topics().iter().map(|t| t.trim().to_lowercase()).collect();
        if !topics.is_empty() {
            let preferred = ctx.preferences.preferred_set();
            let overlap = topics.iter().filter(|t| preferred.contains(*t)).count();
            // no cap on the boost; the final clamp bounds it
            score += w.topic_boost * overlap as f32;

            let excluded = ctx.preferences.excluded_set();
            if topics.iter().any(|t| excluded.contains(t)) {
                score -= w.excluded_penalty;
            }
        }

        if let Some(emb) = article.embedding() {
            let sims: Vec<f32> = ctx
                .history
                .iter()
                .filter_map(|h| h.embedding())
                .filter_map(|h| cosine_similarity(emb, h))
                .collect();
            if !sims.is_empty() {
                let mean = sims.iter().sum::<f32>() / sims.len() as f32;
                score = (score + mean) / 2.0;
            }
        }

        if let Some(s) = article.sentiment() {
            if s > w.positive_above {
                score += w.sentiment_nudge;
            } else if s < w.negative_below {
                score -= w.sentiment_nudge;
            }
        }

        score.clamp(0.0, 1.0)
    }
}

#[async_trait]
impl RelevanceScorer for HeuristicScorer {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn score(
        &self,
        ctx: &ScoringContext<'_>,
        article: &Article,
    ) -> Result<Relevance, ScoringError> {
        Ok(Relevance {
            score: self.score_article(ctx, article),
            reason: FALLBACK_REASON.to_string(),
        })
    }
}
