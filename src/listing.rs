//! Filtered, sorted article listings.

use serde::{Deserialize, Serialize};

use crate::article::Article;
use crate::preferences::UserPreference;

pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Newest first; undated articles last.
    #[default]
    Date,
    /// Most positive first; unscored articles are dropped.
    Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub unread_only: bool,
    pub bookmarked_only: bool,
    pub topic: Option<String>,
    pub min_sentiment: Option<f64>,
    pub max_sentiment: Option<f64>,
    pub sort_by: SortBy,
    pub skip: usize,
    pub limit: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            unread_only: false,
            bookmarked_only: false,
            topic: None,
            min_sentiment: None,
            max_sentiment: None,
            sort_by: SortBy::Date,
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    fn keeps(&self, a: &Article) -> bool {
        if self.unread_only && a.is_read {
            return false;
        }
        if self.bookmarked_only && !a.is_bookmarked {
            return false;
        }
        if let Some(min) = self.min_sentiment {
            if !a.sentiment().is_some_and(|s| s >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_sentiment {
            if !a.sentiment().is_some_and(|s| s <= max) {
                return false;
            }
        }
        if let Some(topic) = self.topic.as_deref() {
            let topic = topic.trim();
            if !a.topics().iter().any(|t| t.eq_ignore_ascii_case(topic)) {
                return false;
            }
        }
        true
    }
}

/// Applies the query and the excluded-words filter of `prefs`, then pages.
/// A page is short only when the filtered listing runs out.
pub fn list_articles(
    articles: Vec<Article>,
    query: &ListQuery,
    prefs: Option<&UserPreference>,
) -> Vec<Article> {
    let mut kept: Vec<Article> = articles
        .into_iter()
        .filter(|a| query.keeps(a) && prefs.map_or(true, |p| p.allows(a)))
        .collect();
    match query.sort_by {
        SortBy::Date => kept.sort_by(|a, b| b.published.cmp(&a.published)),
        SortBy::Sentiment => {
            kept.retain(|a| a.sentiment().is_some());
            kept.sort_by(|a, b| {
                b.sentiment()
                    .unwrap_or_default()
                    .total_cmp(&a.sentiment().unwrap_or_default())
            });
        }
    }
    kept.into_iter().skip(query.skip).take(query.limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::fixtures;
    use chrono::{TimeZone, Utc};

    fn with_sentiment(id: i64, s: f64, topics: &[&str]) -> Article {
        let mut a = fixtures::enriched(id, &format!("a{id}"), vec![1.0], topics);
        if let Some(e) = a.enrichment.as_mut() {
            e.sentiment = s;
        }
        a
    }

    #[test]
    fn date_sort_puts_undated_last() {
        let mut old = fixtures::article(1, "old");
        old.published = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single();
        let mut new = fixtures::article(2, "new");
        new.published = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).single();
        let undated = fixtures::article(3, "undated");
        let ids: Vec<i64> = list_articles(vec![undated, old, new], &ListQuery::default(), None)
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }

    #[test]
    fn sentiment_range_and_topic_filters() {
        let arts = vec![
            with_sentiment(1, 0.9, &["AI"]),
            with_sentiment(2, 0.2, &["ai"]),
            with_sentiment(3, -0.4, &["ai"]),
            fixtures::article(4, "raw"),
        ];
        let q = ListQuery {
            topic: Some("ai".into()),
            min_sentiment: Some(0.0),
            sort_by: SortBy::Sentiment,
            ..ListQuery::default()
        };
        let ids: Vec<i64> = list_articles(arts, &q, None).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn excluded_words_and_flags() {
        let mut read = fixtures::article(1, "Crypto crash");
        read.is_read = true;
        let mut marked = fixtures::article(2, "Crypto rally");
        marked.is_bookmarked = true;
        let plain = fixtures::article(3, "Weather");
        let mut p = UserPreference::with_defaults(1, 0.5);
        p.excluded_words = vec!["crypto".into()];

        let q = ListQuery {
            unread_only: true,
            ..ListQuery::default()
        };
        let ids: Vec<i64> = list_articles(vec![read, marked.clone(), plain], &q, Some(&p))
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![3]);

        let q = ListQuery {
            bookmarked_only: true,
            ..ListQuery::default()
        };
        assert_eq!(list_articles(vec![marked], &q, None).len(), 1);
    }

    #[test]
    fn excluded_articles_do_not_shorten_pages() {
        let dated = |id: i64, title: &str, day: u32| {
            let mut a = fixtures::article(id, title);
            a.published = Utc.with_ymd_and_hms(2026, 3, day, 0, 0, 0).single();
            a
        };
        let arts = vec![
            dated(1, "Crypto exchange halts withdrawals", 4),
            dated(2, "Rail strike ends", 3),
            dated(3, "Museum reopens", 2),
            dated(4, "Harvest outlook improves", 1),
        ];
        let mut p = UserPreference::with_defaults(1, 0.5);
        p.excluded_words = vec!["crypto".into()];

        let page = |skip| {
            let q = ListQuery {
                skip,
                limit: 2,
                ..ListQuery::default()
            };
            list_articles(arts.clone(), &q, Some(&p))
                .iter()
                .map(|a| a.id)
                .collect::<Vec<i64>>()
        };
        assert_eq!(page(0), vec![2, 3]);
        assert_eq!(page(2), vec![4]);
    }
}
