//! Per-user reading preferences.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::article::{Article, UserId};
use crate::error::ValidationError;

pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: UserId,
    #[serde(default)]
    pub preferred_topics: Vec<String>,
    #[serde(default)]
    pub excluded_topics: Vec<String>,
    /// Articles whose title/description contain any of these are hidden from listings.
    #[serde(default)]
    pub excluded_words: Vec<String>,
    pub relevance_threshold: f32,
    pub recommendations_enabled: bool,
}

impl UserPreference {
    /// Defaults used when a user's record is created lazily.
    pub fn with_defaults(user_id: UserId, relevance_threshold: f32) -> Self {
        Self {
            user_id,
            preferred_topics: Vec::new(),
            excluded_topics: Vec::new(),
            excluded_words: Vec::new(),
            relevance_threshold,
            recommendations_enabled: true,
        }
    }

    /// Lower-cased preferred topics.
    pub fn preferred_set(&self) -> BTreeSet<String> {
        lower_set(&self.preferred_topics)
    }

    /// Lower-cased excluded topics.
    pub fn excluded_set(&self) -> BTreeSet<String> {
        lower_set(&self.excluded_topics)
    }

    /// `false` when the article's title or description mentions an excluded word.
    pub fn allows(&self, article: &Article) -> bool {
        if self.excluded_words.is_empty() {
            return true;
        }
        let text = format!(
            "{} {}",
            article.title,
            article.description.as_deref().unwrap_or_default()
        )
        .to_lowercase();
        !self
            .excluded_words
            .iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .any(|w| text.contains(&w))
    }

    /// Partial merge: fields left `None` in the update are unchanged.
    pub fn merge(&mut self, update: PreferenceUpdate) -> Result<(), ValidationError> {
        if let Some(t) = update.relevance_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(ValidationError::ThresholdOutOfRange(t));
            }
        }
        if let Some(v) = update.preferred_topics {
            self.preferred_topics = clean_list(v);
        }
        if let Some(v) = update.excluded_topics {
            self.excluded_topics = clean_list(v);
        }
        if let Some(v) = update.excluded_words {
            self.excluded_words = clean_list(v);
        }
        if let Some(t) = update.relevance_threshold {
            self.relevance_threshold = t;
        }
        if let Some(e) = update.recommendations_enabled {
            self.recommendations_enabled = e;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceUpdate {
    #[serde(default)]
    pub preferred_topics: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_topics: Option<Vec<String>>,
    #[serde(default)]
    pub excluded_words: Option<Vec<String>>,
    #[serde(default)]
    pub relevance_threshold: Option<f32>,
    #[serde(default)]
    pub recommendations_enabled: Option<bool>,
}

fn lower_set(items: &[String]) -> BTreeSet<String> {
    items
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Trim entries, drop empties and case-insensitive duplicates, keep first spelling.
fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let t = it.trim();
        if t.is_empty() {
            continue;
        }
        if seen.insert(t.to_lowercase()) {
            out.push(t.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::fixtures;

    #[test]
    fn merge_only_touches_given_fields() {
        let mut p = UserPreference::with_defaults(7, DEFAULT_RELEVANCE_THRESHOLD);
        p.excluded_words = vec!["crypto".into()];
        p.merge(PreferenceUpdate {
            preferred_topics: Some(vec![" AI ".into(), "ai".into(), "".into(), "Science".into()]),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(p.preferred_topics, vec!["AI".to_string(), "Science".to_string()]);
        assert_eq!(p.excluded_words, vec!["crypto".to_string()]);
        assert!(p.recommendations_enabled);
        assert_eq!(p.relevance_threshold, 0.5);
    }

    #[test]
    fn merge_rejects_bad_threshold_without_partial_write() {
        let mut p = UserPreference::with_defaults(7, 0.5);
        let err = p
            .merge(PreferenceUpdate {
                preferred_topics: Some(vec!["ai".into()]),
                relevance_threshold: Some(1.5),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err, ValidationError::ThresholdOutOfRange(1.5));
        assert!(p.preferred_topics.is_empty());
    }

    #[test]
    fn excluded_words_hide_articles_case_insensitively() {
        let mut p = UserPreference::with_defaults(1, 0.5);
        p.excluded_words = vec!["Bitcoin".into()];
        let mut a = fixtures::article(1, "Markets today");
        a.description = Some("bitcoin slides again".into());
        assert!(!p.allows(&a));
        assert!(p.allows(&fixtures::article(2, "Weather update")));
    }
}
