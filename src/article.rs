//! Article entity and its enrichment/interaction fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

pub type ArticleId = i64;
pub type UserId = i64;

/// Upper bound for the stored topic list produced by the extractor.
pub const MAX_TOPICS: usize = 15;

/// Readability bands, easiest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReadabilityLabel {
    #[serde(rename = "Very Easy")]
    VeryEasy,
    #[serde(rename = "Easy")]
    Easy,
    #[serde(rename = "Fairly Easy")]
    FairlyEasy,
    #[serde(rename = "Standard")]
    Standard,
    #[serde(rename = "Fairly Difficult")]
    FairlyDifficult,
    #[serde(rename = "Difficult")]
    Difficult,
    #[serde(rename = "Very Difficult")]
    VeryDifficult,
}

impl ReadabilityLabel {
    /// Maps a reading-ease score to its band. Boundaries belong to the easier band.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::VeryEasy
        } else if score >= 80.0 {
            Self::Easy
        } else if score >= 70.0 {
            Self::FairlyEasy
        } else if score >= 60.0 {
            Self::Standard
        } else if score >= 50.0 {
            Self::FairlyDifficult
        } else if score >= 30.0 {
            Self::Difficult
        } else {
            Self::VeryDifficult
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryEasy => "Very Easy",
            Self::Easy => "Easy",
            Self::FairlyEasy => "Fairly Easy",
            Self::Standard => "Standard",
            Self::FairlyDifficult => "Fairly Difficult",
            Self::Difficult => "Difficult",
            Self::VeryDifficult => "Very Difficult",
        }
    }

    /// Standard or easier.
    pub fn is_accessible(&self) -> bool {
        *self <= Self::Standard
    }

    pub fn is_difficult(&self) -> bool {
        matches!(self, Self::Difficult | Self::VeryDifficult)
    }
}

impl std::fmt::Display for ReadabilityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readability {
    pub score: f64,
    pub label: ReadabilityLabel,
}

/// Cluster assignment of an article.
///
/// `Unclustered` means no clustering run has looked at the article yet;
/// `Noise` means a run looked at it and assigned no cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "id")]
pub enum ClusterLabel {
    #[default]
    Unclustered,
    Noise,
    Cluster(u32),
}

impl ClusterLabel {
    pub fn cluster_id(&self) -> Option<u32> {
        match self {
            ClusterLabel::Cluster(id) => Some(*id),
            _ => None,
        }
    }
}

/// Everything the feature extractor computes in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleFeatures {
    pub embedding: Vec<f32>,
    pub topics: Vec<String>,
    pub sentiment: f64,
    pub readability: Option<Readability>,
    pub writing_style: Option<String>,
    /// Fingerprint of the text the features were computed from.
    pub fingerprint: String,
}

/// Stored enrichment. Topics live next to it because rules edit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub embedding: Vec<f32>,
    pub sentiment: f64,
    pub readability: Option<Readability>,
    pub writing_style: Option<String>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub user_id: UserId,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub published: Option<DateTime<Utc>>,

    #[serde(default)]
    pub enrichment: Option<Enrichment>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,

    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub cluster: ClusterLabel,
}

impl Article {
    /// Text fed to the feature extractor: title joined with the description,
    /// or with the content when there is no description.
    pub fn analysis_text(&self) -> String {
        let body = self
            .description
            .as_deref()
            .or(self.content.as_deref())
            .unwrap_or_default();
        format!("{}. {}", self.title, body)
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        self.enrichment
            .as_ref()
            .map(|e| e.embedding.as_slice())
            .filter(|e| !e.is_empty())
    }

    pub fn sentiment(&self) -> Option<f64> {
        self.enrichment.as_ref().map(|e| e.sentiment)
    }

    pub fn readability_label(&self) -> Option<ReadabilityLabel> {
        self.enrichment
            .as_ref()
            .and_then(|e| e.readability)
            .map(|r| r.label)
    }

    pub fn topics(&self) -> &[String] {
        self.topics.as_deref().unwrap_or_default()
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment.is_some()
    }

    /// Replaces all enrichment fields in one step.
    pub fn apply_features(&mut self, features: ArticleFeatures) {
        let ArticleFeatures {
            embedding,
            topics,
            sentiment,
            readability,
            writing_style,
            fingerprint,
        } = features;
        self.enrichment = Some(Enrichment {
            embedding,
            sentiment,
            readability,
            writing_style,
            fingerprint,
        });
        self.topics = Some(topics);
    }

    pub fn set_rating(&mut self, rating: f32) -> Result<(), ValidationError> {
        if !(0.0..=5.0).contains(&rating) {
            return Err(ValidationError::RatingOutOfRange(rating));
        }
        self.rating = Some(rating);
        Ok(())
    }
}

/// Interaction state a rule run can change. Committed by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleState {
    pub is_read: bool,
    pub is_bookmarked: bool,
    pub topics: Option<Vec<String>>,
}

impl From<&Article> for ArticleState {
    fn from(a: &Article) -> Self {
        Self {
            is_read: a.is_read,
            is_bookmarked: a.is_bookmarked,
            topics: a.topics.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn article(id: ArticleId, title: &str) -> Article {
        Article {
            id,
            user_id: 1,
            title: title.to_string(),
            link: format!("https://example.org/{id}"),
            description: None,
            content: None,
            author: None,
            published: None,
            enrichment: None,
            topics: None,
            is_read: false,
            is_bookmarked: false,
            rating: None,
            cluster: ClusterLabel::Unclustered,
        }
    }

    pub fn enriched(id: ArticleId, title: &str, embedding: Vec<f32>, topics: &[&str]) -> Article {
        let mut a = article(id, title);
        a.apply_features(ArticleFeatures {
            embedding,
            topics: topics.iter().map(|t| t.to_string()).collect(),
            sentiment: 0.0,
            readability: None,
            writing_style: None,
            fingerprint: String::new(),
        });
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readability_boundaries_prefer_easier_band() {
        assert_eq!(ReadabilityLabel::from_score(90.0), ReadabilityLabel::VeryEasy);
        assert_eq!(ReadabilityLabel::from_score(89.99), ReadabilityLabel::Easy);
        assert_eq!(ReadabilityLabel::from_score(80.0), ReadabilityLabel::Easy);
        assert_eq!(ReadabilityLabel::from_score(70.0), ReadabilityLabel::FairlyEasy);
        assert_eq!(ReadabilityLabel::from_score(60.0), ReadabilityLabel::Standard);
        assert_eq!(
            ReadabilityLabel::from_score(59.9),
            ReadabilityLabel::FairlyDifficult
        );
        assert_eq!(ReadabilityLabel::from_score(50.0), ReadabilityLabel::FairlyDifficult);
        assert_eq!(ReadabilityLabel::from_score(30.0), ReadabilityLabel::Difficult);
        assert_eq!(ReadabilityLabel::from_score(29.99), ReadabilityLabel::VeryDifficult);
        assert_eq!(ReadabilityLabel::from_score(-40.0), ReadabilityLabel::VeryDifficult);
    }

    #[test]
    fn label_serializes_as_display_text() {
        let s = serde_json::to_string(&ReadabilityLabel::FairlyDifficult).unwrap();
        assert_eq!(s, "\"Fairly Difficult\"");
    }

    #[test]
    fn rating_is_validated() {
        let mut a = fixtures::article(1, "t");
        assert!(a.set_rating(5.0).is_ok());
        assert_eq!(
            a.set_rating(5.5),
            Err(ValidationError::RatingOutOfRange(5.5))
        );
        assert_eq!(a.rating, Some(5.0));
    }

    #[test]
    fn empty_embedding_counts_as_missing() {
        let a = fixtures::enriched(1, "t", vec![], &[]);
        assert!(a.embedding().is_none());
        assert!(a.is_enriched());
    }
}
