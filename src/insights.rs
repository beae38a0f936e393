//! Structured per-article insights.
//!
//! When the judgment capability is configured the model is asked for a JSON
//! record; anything it leaves out, garbles or fails to deliver is filled from
//! local heuristics. When the capability is not configured the caller gets
//! [`InsightError::FeatureDisabled`] and nothing is computed.

use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::analyze::ai_adapter::{extract_json, sanitize_reason, DynJudgmentClient};
use crate::article::{Article, ArticleId};
use crate::error::{InsightError, JudgmentError};
use crate::logging::TARGET_JUDGMENT;
use crate::metrics::{describe, JUDGMENT_FALLBACK_TOTAL};
use crate::prompts::insight_prompt;

const INSIGHT_MAX_TOKENS: u32 = 400;
const MAX_KEY_POINTS: usize = 5;
const MAX_ACTIONS: usize = 3;
const SUMMARY_SENTENCES: usize = 3;
const HEURISTIC_KEY_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReliabilityLabel {
    #[serde(rename = "Highly Reliable")]
    HighlyReliable,
    #[serde(rename = "Reliable")]
    Reliable,
    #[serde(rename = "Mixed Signals")]
    MixedSignals,
    #[serde(rename = "Unverified")]
    Unverified,
    #[serde(rename = "Questionable")]
    Questionable,
}

impl ReliabilityLabel {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.85 {
            Self::HighlyReliable
        } else if score >= 0.7 {
            Self::Reliable
        } else if score >= 0.5 {
            Self::MixedSignals
        } else if score >= 0.3 {
            Self::Unverified
        } else {
            Self::Questionable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighlyReliable => "Highly Reliable",
            Self::Reliable => "Reliable",
            Self::MixedSignals => "Mixed Signals",
            Self::Unverified => "Unverified",
            Self::Questionable => "Questionable",
        }
    }

    /// Case-insensitive match against the five display names.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        [
            Self::HighlyReliable,
            Self::Reliable,
            Self::MixedSignals,
            Self::Unverified,
            Self::Questionable,
        ]
        .into_iter()
        .find(|l| l.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ReliabilityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightOrigin {
    Model,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub article_id: ArticleId,
    pub summary: String,
    pub key_points: Vec<String>,
    pub reliability_score: f32,
    pub reliability_label: ReliabilityLabel,
    pub reliability_reason: String,
    pub tone: String,
    pub suggested_actions: Vec<String>,
    pub origin: InsightOrigin,
}

pub struct InsightGenerator {
    client: DynJudgmentClient,
}

impl InsightGenerator {
    pub fn new(client: DynJudgmentClient) -> Self {
        Self { client }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_enabled()
    }

    pub async fn generate(&self, article: &Article) -> Result<Insight, InsightError> {
        if !self.client.is_enabled() {
            return Err(InsightError::FeatureDisabled);
        }
        let raw = match self
            .client
            .complete(&insight_prompt(article), INSIGHT_MAX_TOKENS)
            .await
        {
            Ok(raw) => raw,
            Err(e) => return Ok(self.degraded(article, &e)),
        };
        match parse_reply(&raw) {
            Ok(reply) => {
                debug!(target: TARGET_JUDGMENT, article_id = article.id, "insight generated by model");
                Ok(merge(article, &reply))
            }
            Err(e) => Ok(self.degraded(article, &e)),
        }
    }

    fn degraded(&self, article: &Article, e: &JudgmentError) -> Insight {
        describe();
        counter!(JUDGMENT_FALLBACK_TOTAL, "component" => "insights").increment(1);
        warn!(
            target: TARGET_JUDGMENT,
            provider = self.client.provider_name(),
            article_id = article.id,
            error = %e,
            "insight judgment failed, using heuristics"
        );
        heuristic_insight(article, true)
    }
}

fn parse_reply(raw: &str) -> Result<Value, JudgmentError> {
    let json = extract_json(raw).ok_or(JudgmentError::EmptyResponse)?;
    let v: Value = serde_json::from_str(json).map_err(|e| JudgmentError::Malformed(e.to_string()))?;
    if v.is_object() {
        Ok(v)
    } else {
        Err(JudgmentError::Malformed("not an object".into()))
    }
}

/// Fully local insight. `degraded` marks that a model call was attempted and failed.
pub fn heuristic_insight(article: &Article, degraded: bool) -> Insight {
    let score = estimate_reliability(article);
    Insight {
        article_id: article.id,
        summary: build_summary(article),
        key_points: build_key_points(article),
        reliability_score: score,
        reliability_label: ReliabilityLabel::from_score(score),
        reliability_reason: default_reliability_reason(article, degraded),
        tone: estimate_tone(article).to_string(),
        suggested_actions: suggest_actions(article),
        origin: InsightOrigin::Heuristic,
    }
}

/// Model fields win when present and usable; the rest comes from heuristics.
fn merge(article: &Article, reply: &Value) -> Insight {
    let text = |key: &str| {
        reply
            .get(key)
            .and_then(Value::as_str)
            .map(|s| sanitize_reason(s, 2000))
            .filter(|s| !s.is_empty())
    };
    let list = |key: &str| {
        reply
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| sanitize_reason(s, 500))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|v| !v.is_empty())
    };

    let score = reply
        .get("reliability_score")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter(|s| s.is_finite())
        .map(|s| s.clamp(0.0, 1.0) as f32)
        .unwrap_or_else(|| estimate_reliability(article));
    let label = text("reliability_label")
        .and_then(|l| ReliabilityLabel::parse(&l))
        .unwrap_or_else(|| ReliabilityLabel::from_score(score));

    let mut key_points = list("key_points").unwrap_or_else(|| build_key_points(article));
    key_points.truncate(MAX_KEY_POINTS);
    let mut actions = list("suggested_actions").unwrap_or_else(|| suggest_actions(article));
    actions.truncate(MAX_ACTIONS);

    Insight {
        article_id: article.id,
        summary: text("summary").unwrap_or_else(|| build_summary(article)),
        key_points,
        reliability_score: score,
        reliability_label: label,
        reliability_reason: text("reliability_reason")
            .unwrap_or_else(|| default_reliability_reason(article, false)),
        tone: text("tone").unwrap_or_else(|| estimate_tone(article).to_string()),
        suggested_actions: actions,
        origin: InsightOrigin::Model,
    }
}

fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn first_text<'a>(candidates: &[Option<&'a str>]) -> Option<&'a str> {
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.trim().is_empty())
}

pub fn build_summary(article: &Article) -> String {
    let Some(text) = first_text(&[
        article.description.as_deref(),
        article.content.as_deref(),
        Some(article.title.as_str()),
    ]) else {
        return "Summary unavailable.".to_string();
    };
    let picked: Vec<&str> = sentences(text).into_iter().take(SUMMARY_SENTENCES).collect();
    if picked.is_empty() {
        "Summary unavailable.".to_string()
    } else {
        format!("{}.", picked.join(". "))
    }
}

pub fn build_key_points(article: &Article) -> Vec<String> {
    first_text(&[article.description.as_deref(), article.content.as_deref()])
        .map(|t| {
            sentences(t)
                .into_iter()
                .take(HEURISTIC_KEY_POINTS)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// 0.6 base, +0.1 for accessible readability, +0.1 for a calm tone,
/// -0.1 for a strongly charged one.
pub fn estimate_reliability(article: &Article) -> f32 {
    let mut score: f32 = 0.6;
    if article.readability_label().is_some_and(|l| l.is_accessible()) {
        score += 0.1;
    }
    if let Some(s) = article.sentiment() {
        if s.abs() <= 0.2 {
            score += 0.1;
        } else if s.abs() > 0.5 {
            score -= 0.1;
        }
    }
    score.clamp(0.0, 1.0)
}

pub fn estimate_tone(article: &Article) -> &'static str {
    match article.sentiment() {
        None => "Neutral/Informational",
        Some(s) if s > 0.35 => "Positive/Upbeat",
        Some(s) if s < -0.35 => "Critical/Concerned",
        Some(_) => "Neutral analysis",
    }
}

fn default_reliability_reason(article: &Article, degraded: bool) -> String {
    let mut parts = Vec::new();
    if let Some(a) = article.author.as_deref().filter(|a| !a.trim().is_empty()) {
        parts.push(format!("Authored by {a}"));
    }
    if let Some(l) = article.readability_label() {
        parts.push(format!("Readability: {l}"));
    }
    if degraded {
        parts.push("Generated via offline heuristics".to_string());
    }
    if parts.is_empty() {
        "Heuristic assessment based on metadata".to_string()
    } else {
        parts.join("; ")
    }
}

pub fn suggest_actions(article: &Article) -> Vec<String> {
    let mut out = Vec::new();
    if article.cluster.cluster_id().is_some() {
        out.push("Compare with other articles in this cluster".to_string());
    }
    if article.sentiment().is_some_and(|s| s.abs() > 0.5) {
        out.push("Check additional sources to balance sentiment".to_string());
    }
    if article.readability_label().is_some_and(|l| l.is_difficult()) {
        out.push("Consider a quick summary before deep reading".to_string());
    }
    out
}
