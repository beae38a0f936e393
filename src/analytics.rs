//! Aggregates over one user's articles: topics, sentiment, clusters.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::article::{Article, ArticleId};

const CLUSTER_SAMPLE_IDS: usize = 10;
const TREND_TOPICS_PER_ARTICLE: usize = 5;
const TREND_LIMIT: usize = 20;
const TREND_RECENT_DAYS: i64 = 3;

/// Topic → number of articles carrying it, most frequent first, ties by name.
pub fn topic_counts(articles: &[Article]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for a in articles {
        for t in a.topics() {
            *counts.entry(t.as_str()).or_default() += 1;
        }
    }
    let mut out: Vec<(String, usize)> = counts.into_iter().map(|(t, c)| (t.to_string(), c)).collect();
    out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySentiment {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: usize,
    pub slightly_positive: usize,
    pub neutral: usize,
    pub slightly_negative: usize,
    pub negative: usize,
    /// Articles with a sentiment score.
    pub total: usize,
    /// Keyed by published date, `YYYY-MM-DD`.
    pub daily_trends: BTreeMap<String, DailySentiment>,
}

pub fn sentiment_distribution(articles: &[Article]) -> SentimentDistribution {
    let mut d = SentimentDistribution::default();
    for a in articles {
        let Some(s) = a.sentiment() else { continue };
        d.total += 1;
        if s >= 0.5 {
            d.positive += 1;
        } else if s >= 0.05 {
            d.slightly_positive += 1;
        } else if s <= -0.5 {
            d.negative += 1;
        } else if s <= -0.05 {
            d.slightly_negative += 1;
        } else {
            d.neutral += 1;
        }

        if let Some(p) = a.published {
            let day = d.daily_trends.entry(p.format("%Y-%m-%d").to_string()).or_default();
            if s >= 0.05 {
                day.positive += 1;
            } else if s <= -0.05 {
                day.negative += 1;
            } else {
                day.neutral += 1;
            }
        }
    }
    d
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: u32,
    pub article_count: usize,
    /// First few members in store order.
    pub article_ids: Vec<ArticleId>,
}

/// Clusters largest first; ties by id. Noise and unclustered articles are left out.
pub fn cluster_summary(articles: &[Article]) -> Vec<ClusterSummary> {
    let mut groups: BTreeMap<u32, Vec<ArticleId>> = BTreeMap::new();
    for a in articles {
        if let Some(id) = a.cluster.cluster_id() {
            groups.entry(id).or_default().push(a.id);
        }
    }
    let mut out: Vec<ClusterSummary> = groups
        .into_iter()
        .map(|(cluster_id, mut ids)| {
            let article_count = ids.len();
            ids.truncate(CLUSTER_SAMPLE_IDS);
            ClusterSummary {
                cluster_id,
                article_count,
                article_ids: ids,
            }
        })
        .collect();
    // stable: equal counts stay in id order
    out.sort_by(|a, b| b.article_count.cmp(&a.article_count));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingTopic {
    pub topic: String,
    /// Mentions inside the window.
    pub count: usize,
    /// Mentions in the last three days of the window.
    pub growth: usize,
}

/// Topics of articles published within `days` before `now`, ranked by recent
/// growth. Only the leading topics of each article count.
pub fn topic_trends(articles: &[Article], now: DateTime<Utc>, days: i64) -> Vec<TrendingTopic> {
    let cutoff = now - Duration::days(days.max(0));
    let recent = (now - Duration::days(TREND_RECENT_DAYS)).date_naive();

    let mut order: Vec<&str> = Vec::new();
    let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
    for a in articles {
        let Some(p) = a.published.filter(|p| *p >= cutoff) else {
            continue;
        };
        for t in a.topics().iter().take(TREND_TOPICS_PER_ARTICLE) {
            let e = stats.entry(t.as_str()).or_insert_with(|| {
                order.push(t.as_str());
                (0, 0)
            });
            e.0 += 1;
            if p.date_naive() >= recent {
                e.1 += 1;
            }
        }
    }

    let mut out: Vec<TrendingTopic> = order
        .into_iter()
        .map(|t| {
            let (count, growth) = stats[t];
            TrendingTopic {
                topic: t.to_string(),
                count,
                growth,
            }
        })
        .collect();
    out.sort_by(|a, b| b.growth.cmp(&a.growth));
    out.truncate(TREND_LIMIT);
    out
}

/// Default window of [`topic_trends`] in days.
pub const TREND_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub topics: Vec<(String, usize)>,
    pub sentiment: SentimentDistribution,
    pub clusters: Vec<ClusterSummary>,
    pub trending: Vec<TrendingTopic>,
}

pub fn report(articles: &[Article], now: DateTime<Utc>) -> AnalyticsReport {
    AnalyticsReport {
        topics: topic_counts(articles),
        sentiment: sentiment_distribution(articles),
        clusters: cluster_summary(articles),
        trending: topic_trends(articles, now, TREND_WINDOW_DAYS),
    }
}
